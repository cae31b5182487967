use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::record::{Example, IntVector, Matrix};

/// Marks the start of binary payload data after a key token.
pub(crate) const BINARY_SENTINEL: [u8; 2] = [0x00, b'B'];

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Could not read from stream")]
    Io(#[from] io::Error),

    #[error("Expected binary sentinel, found {0:02x?}")]
    BadSentinel([u8; 2]),

    #[error("Token is not valid UTF-8")]
    BadToken(#[source] std::string::FromUtf8Error),

    #[error("Unexpected token `{found}`, expected `{expected}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("Unsupported matrix type token `{0}`")]
    UnknownMatrixType(String),

    #[error("Unexpected basic-type size {found}, expected {expected}")]
    BadSize { expected: u8, found: u8 },

    #[error("Negative size {0} in payload header")]
    BadLength(i32),

    #[error("Matrix dimensions {rows}x{cols} exceed the decoder limit")]
    BadDimensions { rows: usize, cols: usize },
}

/// Upper bound on the element count of a decoded matrix. Dimensions come
/// from untrusted archive headers, so the product must be rejected
/// before it drives an allocation.
const MAX_MATRIX_ELEMENTS: usize = 1 << 30;

fn checked_elements(rows: usize, cols: usize) -> Result<usize, DecodeError> {
    match rows.checked_mul(cols) {
        Some(len) if len <= MAX_MATRIX_ELEMENTS => Ok(len),
        _ => Err(DecodeError::BadDimensions { rows, cols }),
    }
}

/// Decodes exactly one payload from the current stream position, leaving
/// the stream at the start of the next record (or end-of-stream).
pub trait Decode: Sized {
    fn decode<R: Read>(reader: &mut R) -> Result<Self, DecodeError>;
}

/// Reads the key token that opens a record. Returns `None` on a clean
/// end-of-stream, i.e. when not even the first byte of a key exists.
pub(crate) fn read_key<R: Read>(reader: &mut R) -> Result<Option<String>, DecodeError> {
    let mut first = [0u8; 1];
    match reader.read_exact(&mut first) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let mut bytes = vec![first[0]];
    loop {
        let byte = reader.read_u8()?;
        if byte == b' ' {
            break;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes).map(Some).map_err(DecodeError::BadToken)
}

/// Reads a space-terminated token from inside a payload.
pub(crate) fn read_token<R: Read>(reader: &mut R) -> Result<String, DecodeError> {
    let mut bytes = Vec::new();
    loop {
        let byte = reader.read_u8()?;
        if byte == b' ' {
            break;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes).map_err(DecodeError::BadToken)
}

pub(crate) fn expect_token<R: Read>(
    reader: &mut R,
    expected: &'static str,
) -> Result<(), DecodeError> {
    let found = read_token(reader)?;
    if found != expected {
        return Err(DecodeError::UnexpectedToken { expected, found });
    }
    Ok(())
}

/// Verifies the two-byte binary sentinel that separates a key from its
/// payload. Random-access loads seek straight to this sentinel.
pub(crate) fn expect_binary<R: Read>(reader: &mut R) -> Result<(), DecodeError> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    if buf != BINARY_SENTINEL {
        return Err(DecodeError::BadSentinel(buf));
    }
    Ok(())
}

/// Reads a size-prefixed `i32` basic type (one size byte, then the value
/// in little-endian).
pub(crate) fn read_basic_i32<R: Read>(reader: &mut R) -> Result<i32, DecodeError> {
    let size = reader.read_u8()?;
    if size != 4 {
        return Err(DecodeError::BadSize {
            expected: 4,
            found: size,
        });
    }
    Ok(reader.read_i32::<LittleEndian>()?)
}

fn read_length<R: Read>(reader: &mut R) -> Result<usize, DecodeError> {
    let value = read_basic_i32(reader)?;
    if value < 0 {
        return Err(DecodeError::BadLength(value));
    }
    Ok(value as usize)
}

impl Decode for Matrix {
    fn decode<R: Read>(reader: &mut R) -> Result<Matrix, DecodeError> {
        let ty = read_token(reader)?;
        let rows;
        let cols;
        let data = match ty.as_str() {
            "FM" => {
                rows = read_length(reader)?;
                cols = read_length(reader)?;
                let mut data = vec![0f32; checked_elements(rows, cols)?];
                reader.read_f32_into::<LittleEndian>(&mut data)?;
                data
            }
            // Double matrices are narrowed to the f32 payload type.
            "DM" => {
                rows = read_length(reader)?;
                cols = read_length(reader)?;
                let mut wide = vec![0f64; checked_elements(rows, cols)?];
                reader.read_f64_into::<LittleEndian>(&mut wide)?;
                wide.into_iter().map(|v| v as f32).collect()
            }
            _ => return Err(DecodeError::UnknownMatrixType(ty)),
        };
        Ok(Matrix::new(rows, cols, data))
    }
}

impl Decode for IntVector {
    fn decode<R: Read>(reader: &mut R) -> Result<IntVector, DecodeError> {
        let len = read_length(reader)?;
        // Header-declared lengths are untrusted; reserve modestly and
        // let a short stream fail with an EOF error instead.
        let mut values = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            values.push(read_basic_i32(reader)?);
        }
        Ok(IntVector::new(values))
    }
}

impl Decode for Example {
    fn decode<R: Read>(reader: &mut R) -> Result<Example, DecodeError> {
        expect_token(reader, "<Eg>")?;
        let len = read_length(reader)?;
        let mut inputs = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            let name = read_token(reader)?;
            let matrix = Matrix::decode(reader)?;
            inputs.push((name, matrix));
        }
        expect_token(reader, "</Eg>")?;
        Ok(Example::new(inputs))
    }
}
