use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::source::{Address, InputSource, PipeFailure, SourceError};

/// Where a script line points: a whole file, or a byte offset inside a
/// shared archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAddress {
    Path(PathBuf),
    Offset(PathBuf, u64),
}

impl ScriptAddress {
    /// The backing file and the offset to seek to (zero for whole-file
    /// addresses).
    pub fn location(&self) -> (&Path, u64) {
        match self {
            ScriptAddress::Path(path) => (path, 0),
            ScriptAddress::Offset(path, offset) => (path, *offset),
        }
    }
}

/// How the address column of a script is interpreted. The default is the
/// identity form: the token is taken verbatim as a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressForm {
    /// The address token is a bare file path.
    #[default]
    Plain,
    /// The address token is `path:offset`, split on the last colon.
    Offset,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Could not open script")]
    Open(#[from] SourceError),

    #[error("Could not read script '{1}'")]
    Read(#[source] io::Error, String),

    #[error("Malformed line [{line}] in script: {content:?}")]
    Format { line: usize, content: String },

    #[error("Bad address `{addr}` on line [{line}]: expected path:offset")]
    BadAddress { line: usize, addr: String },

    #[error("Duplicate key '{key}' in script '{script}'")]
    DuplicateKey { key: String, script: String },

    #[error(transparent)]
    PipeFailed(#[from] PipeFailure),
}

/// An ordered, immutable key→address index parsed from a two-column
/// script file. Insertion order defines the default traversal order.
#[derive(Debug)]
pub struct Script {
    entries: Vec<(String, ScriptAddress)>,
    by_key: HashMap<String, usize>,
}

impl Script {
    /// Parses the script at `addr`, which may be a file, `"-"` for
    /// standard input, or a pipe address such as `"shuf all.scp |"`.
    /// The source is closed once parsing finishes.
    pub fn parse(addr: &str, form: AddressForm) -> Result<Script, ScriptError> {
        let source = InputSource::open(&Address::parse(addr))?;
        let mut reader = BufReader::new(source);
        let mut entries = Vec::new();
        let mut by_key = HashMap::new();

        for (idx, line) in reader.by_ref().lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| ScriptError::Read(e, addr.to_string()))?;
            let mut tokens = line.split_whitespace();
            let (key, raw_addr) = match (tokens.next(), tokens.next(), tokens.next()) {
                (None, ..) => continue,
                (Some(key), Some(addr), None) => (key, addr),
                _ => {
                    return Err(ScriptError::Format {
                        line: line_no,
                        content: line.clone(),
                    })
                }
            };

            let address = match form {
                AddressForm::Plain => ScriptAddress::Path(PathBuf::from(raw_addr)),
                AddressForm::Offset => {
                    let parsed = raw_addr
                        .rsplit_once(':')
                        .and_then(|(path, offset)| Some((path, offset.parse::<u64>().ok()?)));
                    match parsed {
                        Some((path, offset)) => {
                            ScriptAddress::Offset(PathBuf::from(path), offset)
                        }
                        None => {
                            return Err(ScriptError::BadAddress {
                                line: line_no,
                                addr: raw_addr.to_string(),
                            })
                        }
                    }
                }
            };

            if by_key.contains_key(key) {
                return Err(ScriptError::DuplicateKey {
                    key: key.to_string(),
                    script: addr.to_string(),
                });
            }
            by_key.insert(key.to_string(), entries.len());
            entries.push((key.to_string(), address));
        }

        // A listing truncated by a failed producer must not pass as a
        // complete index.
        if let Some(failure) = reader.into_inner().await_pipe_failure() {
            return Err(failure.into());
        }

        tracing::debug!(script = %addr, entries = entries.len(), "parsed script");
        Ok(Script { entries, by_key })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ScriptAddress> {
        self.by_key.get(key).map(|&i| &self.entries[i].1)
    }

    /// The entry at position `pos` in insertion order.
    pub fn entry(&self, pos: usize) -> Option<(&str, &ScriptAddress)> {
        self.entries
            .get(pos)
            .map(|(key, addr)| (key.as_str(), addr))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}
