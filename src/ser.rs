use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::de::BINARY_SENTINEL;
use crate::record::{Example, IntVector, Matrix};

/// Serializes exactly one payload. Position-symmetric with
/// [`Decode`](crate::Decode): what is framed here is exactly what a
/// decode consumes.
pub trait Encode {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()>;
}

/// Writes a space-terminated token (keys, type markers).
pub(crate) fn write_token<W: Write>(writer: &mut W, token: &str) -> io::Result<()> {
    writer.write_all(token.as_bytes())?;
    writer.write_all(b" ")
}

pub(crate) fn write_binary_sentinel<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&BINARY_SENTINEL)
}

pub(crate) fn write_basic_i32<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_u8(4)?;
    writer.write_i32::<LittleEndian>(value)
}

impl Encode for Matrix {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_token(writer, "FM")?;
        write_basic_i32(writer, self.rows() as i32)?;
        write_basic_i32(writer, self.cols() as i32)?;
        for value in self.data() {
            writer.write_f32::<LittleEndian>(*value)?;
        }
        Ok(())
    }
}

impl Encode for IntVector {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_basic_i32(writer, self.len() as i32)?;
        for value in self.as_slice() {
            write_basic_i32(writer, *value)?;
        }
        Ok(())
    }
}

impl Encode for Example {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_token(writer, "<Eg>")?;
        write_basic_i32(writer, self.inputs().len() as i32)?;
        for (name, matrix) in self.inputs() {
            write_token(writer, name)?;
            matrix.encode(writer)?;
        }
        write_token(writer, "</Eg>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::Decode;
    use std::io::Cursor;

    #[test]
    fn matrix_wire_layout() {
        let mat = Matrix::new(1, 2, vec![1.0, -2.0]);
        let mut buf = Vec::new();
        mat.encode(&mut buf).unwrap();

        let mut expected = b"FM \x04\x01\x00\x00\x00\x04\x02\x00\x00\x00".to_vec();
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        expected.extend_from_slice(&(-2.0f32).to_le_bytes());
        assert_eq!(buf, expected);
    }

    #[test]
    fn int_vector_round_trip() {
        let vec = IntVector::new(vec![3, 1, 4, 1, 5]);
        let mut buf = Vec::new();
        vec.encode(&mut buf).unwrap();
        assert_eq!(IntVector::decode(&mut Cursor::new(buf)).unwrap(), vec);
    }

    #[test]
    fn example_round_trip() {
        let eg = Example::new(vec![
            ("input".to_string(), Matrix::new(2, 3, vec![0.0; 6])),
            ("output".to_string(), Matrix::new(1, 4, vec![1.0; 4])),
        ]);
        let mut buf = Vec::new();
        eg.encode(&mut buf).unwrap();
        let back = Example::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, eg);
        assert_eq!(back.input("output").unwrap().shape(), (1, 4));
    }
}
