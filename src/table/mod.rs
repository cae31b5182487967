pub mod reader;
pub mod writer;

/// Addresses a record in a random-access table, either by key or by
/// position in script order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    Key(&'a str),
    Pos(usize),
}

impl<'a> From<&'a str> for Selector<'a> {
    fn from(key: &'a str) -> Selector<'a> {
        Selector::Key(key)
    }
}

impl From<usize> for Selector<'static> {
    fn from(pos: usize) -> Selector<'static> {
        Selector::Pos(pos)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::{
        Example, IntVector, Matrix, MatrixArchiveReader, MatrixArchiveWriter, MatrixScriptReader,
        ReadError,
    };

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    fn test_matrix(seed: usize, rows: usize, cols: usize) -> Matrix {
        let data = (0..rows * cols)
            .map(|i| ((seed * 31 + i * 7) % 1000) as f32 * 0.013)
            .collect();
        Matrix::new(rows, cols, data)
    }

    fn write_test_archive(ark: &PathBuf, scp: &PathBuf, count: usize) -> Vec<(String, Matrix)> {
        let mut writer =
            MatrixArchiveWriter::create(ark.to_str().unwrap(), scp.to_str()).unwrap();
        let mut written = Vec::new();
        for i in 0..count {
            let key = format!("mat-{}", i);
            let mat = test_matrix(i, 100, 20);
            writer.write(&key, &mat).unwrap();
            written.push((key, mat));
        }
        writer.finish().unwrap();
        written
    }

    #[test]
    fn write_then_random_access() {
        let ark = scratch("ark-format-rt.ark");
        let scp = scratch("ark-format-rt.scp");
        let written = write_test_archive(&ark, &scp, 10);

        let reader = MatrixScriptReader::open(scp.to_str().unwrap()).unwrap();
        assert_eq!(reader.len(), 10);
        assert!(reader.contains("mat-0"));
        assert!(!reader.contains("mat-10"));

        let mat = reader.get("mat-5").unwrap();
        assert_eq!(mat.shape(), (100, 20));
        assert_eq!(&mat, &written[5].1);

        // Iteration follows script order and reloads each record.
        let keys: Vec<String> = reader
            .iter()
            .map(|r| r.map(|(key, _)| key.to_string()).unwrap())
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("mat-{}", i)).collect();
        assert_eq!(keys, expected);

        let _ = std::fs::remove_file(ark);
        let _ = std::fs::remove_file(scp);
    }

    #[test]
    fn positional_and_keyed_lookups_agree() {
        let ark = scratch("ark-format-pos.ark");
        let scp = scratch("ark-format-pos.scp");
        write_test_archive(&ark, &scp, 4);

        let reader = MatrixScriptReader::open(scp.to_str().unwrap()).unwrap();
        for i in 0..4 {
            assert_eq!(reader.get(i).unwrap(), reader.get(&*format!("mat-{}", i)).unwrap());
        }

        let err = reader.get(4).unwrap_err();
        assert!(matches!(err, ReadError::OutOfRange { pos: 4, len: 4 }));

        let err = reader.get("mat-x").unwrap_err();
        assert!(matches!(err, ReadError::MissingKey(key) if key == "mat-x"));

        // Lookup errors do not invalidate the reader.
        assert!(reader.get(0).is_ok());

        let _ = std::fs::remove_file(ark);
        let _ = std::fs::remove_file(scp);
    }

    #[test]
    fn sequential_read_matches_write_order() {
        let ark = scratch("ark-format-seq.ark");
        let scp = scratch("ark-format-seq.scp");
        let written = write_test_archive(&ark, &scp, 6);

        let reader = MatrixArchiveReader::new(ark.to_str().unwrap());
        let read: Vec<(String, Matrix)> =
            reader.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(read, written);

        // A file archive is restartable by reopening.
        assert_eq!(reader.iter().unwrap().count(), 6);

        let _ = std::fs::remove_file(ark);
        let _ = std::fs::remove_file(scp);
    }

    #[test]
    fn empty_archive_round_trip() {
        let ark = scratch("ark-format-empty.ark");
        let scp = scratch("ark-format-empty.scp");
        write_test_archive(&ark, &scp, 0);

        let reader = MatrixScriptReader::open(scp.to_str().unwrap()).unwrap();
        assert_eq!(reader.len(), 0);
        assert!(reader.is_empty());
        assert_eq!(reader.iter().count(), 0);

        let seq = MatrixArchiveReader::new(ark.to_str().unwrap());
        assert_eq!(seq.iter().unwrap().count(), 0);

        let _ = std::fs::remove_file(ark);
        let _ = std::fs::remove_file(scp);
    }

    #[test]
    fn alignment_round_trip() {
        let ark = scratch("ark-format-ali.ark");
        let scp = scratch("ark-format-ali.scp");

        let ali = IntVector::new(vec![0, 0, 1, 4, 4, 4, 2]);
        let mut writer =
            crate::AlignmentArchiveWriter::create(ark.to_str().unwrap(), scp.to_str()).unwrap();
        writer.write("utt-1", &ali).unwrap();
        writer.finish().unwrap();

        let reader = crate::AlignmentScriptReader::open(scp.to_str().unwrap()).unwrap();
        assert_eq!(reader.get("utt-1").unwrap(), ali);

        let seq = crate::AlignmentArchiveReader::new(ark.to_str().unwrap());
        let read: Vec<_> = seq.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(read, vec![("utt-1".to_string(), ali)]);

        let _ = std::fs::remove_file(ark);
        let _ = std::fs::remove_file(scp);
    }

    #[test]
    fn example_sequential_round_trip() {
        let ark = scratch("ark-format-egs.ark");

        let egs = vec![
            (
                "eg-0".to_string(),
                Example::new(vec![
                    ("input".to_string(), test_matrix(1, 8, 3)),
                    ("output".to_string(), test_matrix(2, 8, 1)),
                ]),
            ),
            (
                "eg-1".to_string(),
                Example::new(vec![("input".to_string(), test_matrix(3, 5, 3))]),
            ),
        ];

        let mut writer =
            crate::ExampleArchiveWriter::create(ark.to_str().unwrap(), None).unwrap();
        for (key, eg) in &egs {
            writer.write(key, eg).unwrap();
        }
        writer.finish().unwrap();

        let reader = crate::ExampleArchiveReader::new(ark.to_str().unwrap());
        let read: Vec<_> = reader.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(read, egs);

        let _ = std::fs::remove_file(ark);
    }

    #[test]
    fn stdout_archive_ignores_script_address() {
        let scp = scratch("ark-format-ignored.scp");
        let _ = std::fs::remove_file(&scp);

        let writer = MatrixArchiveWriter::create("-", scp.to_str()).unwrap();
        writer.finish().unwrap();

        // The script stream was never opened.
        assert!(!scp.exists());
    }

    #[cfg(unix)]
    #[test]
    fn sequential_read_through_a_pipe() {
        let ark = scratch("ark-format-pipe.ark");
        let scp = scratch("ark-format-pipe.scp");
        let written = write_test_archive(&ark, &scp, 3);

        let addr = format!("cat {} |", ark.display());
        let reader = MatrixArchiveReader::new(&addr);
        let read: Vec<_> = reader.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(read, written);

        let _ = std::fs::remove_file(ark);
        let _ = std::fs::remove_file(scp);
    }

    #[cfg(unix)]
    #[test]
    fn failing_pipe_surfaces_at_end_of_stream() {
        let reader = MatrixArchiveReader::new("exit 2 |");
        let results: Vec<_> = reader.iter().unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ReadError::PipeFailed(ref f)) if f.code == 2));
    }
}
