use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::PathBuf;

use crate::de::{self, Decode, DecodeError};
use crate::script::{AddressForm, Script, ScriptAddress, ScriptError};
use crate::source::{Address, InputSource, PipeFailure, SourceError};
use crate::table::Selector;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not parse script")]
    Script(#[from] ScriptError),

    #[error("Could not open archive source")]
    Source(#[from] SourceError),

    #[error("Could not read archive '{}'", .1.display())]
    Archive(#[source] io::Error, PathBuf),

    #[error("Could not read record key")]
    Key(#[source] DecodeError),

    #[error("Could not decode record `{key}`")]
    Record {
        key: String,
        #[source]
        source: DecodeError,
    },

    #[error("Position {pos} out of range for table of {len} entries")]
    OutOfRange { pos: usize, len: usize },

    #[error("Missing key '{0}'")]
    MissingKey(String),

    #[error(transparent)]
    PipeFailed(#[from] PipeFailure),
}

/// Random-access reader over a `path:offset` script.
///
/// Every lookup re-opens the addressed archive and seeks to the recorded
/// offset; nothing is cached, so a table stays correct even if new
/// records are appended to its archives between lookups.
#[derive(Debug)]
pub struct ScriptReader<P> {
    script: Script,
    _payload: PhantomData<P>,
}

impl<P: Decode> ScriptReader<P> {
    /// Parses the script at `addr` (a file, `"-"`, or a pipe address)
    /// with the `path:offset` address form.
    pub fn open(addr: &str) -> Result<ScriptReader<P>, ReadError> {
        let script = Script::parse(addr, AddressForm::Offset)?;
        Ok(ScriptReader {
            script,
            _payload: PhantomData,
        })
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Membership test against the index. No I/O.
    pub fn contains(&self, key: &str) -> bool {
        self.script.contains(key)
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Loads one record by key or by position in script order. Lookup
    /// failures are scoped to this call; the reader remains usable.
    pub fn get<'a>(&self, selector: impl Into<Selector<'a>>) -> Result<P, ReadError> {
        match selector.into() {
            Selector::Pos(pos) => {
                let (key, addr) = self.script.entry(pos).ok_or(ReadError::OutOfRange {
                    pos,
                    len: self.script.len(),
                })?;
                self.load(key, addr)
            }
            Selector::Key(key) => {
                let addr = self
                    .script
                    .get(key)
                    .ok_or_else(|| ReadError::MissingKey(key.to_string()))?;
                self.load(key, addr)
            }
        }
    }

    /// A lazy, ordered, restartable traversal in script order. Each step
    /// performs a fresh random-access load.
    pub fn iter(&self) -> ScriptIter<'_, P> {
        ScriptIter {
            reader: self,
            pos: 0,
        }
    }

    fn load(&self, key: &str, addr: &ScriptAddress) -> Result<P, ReadError> {
        let (path, offset) = addr.location();
        let file =
            File::open(path).map_err(|e| ReadError::Archive(e, path.to_path_buf()))?;
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| ReadError::Archive(e, path.to_path_buf()))?;

        let decoded = de::expect_binary(&mut reader).and_then(|_| P::decode(&mut reader));
        decoded.map_err(|e| ReadError::Record {
            key: key.to_string(),
            source: e,
        })
    }
}

pub struct ScriptIter<'a, P> {
    reader: &'a ScriptReader<P>,
    pos: usize,
}

impl<'a, P: Decode> Iterator for ScriptIter<'a, P> {
    type Item = Result<(&'a str, P), ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, addr) = self.reader.script.entry(self.pos)?;
        self.pos += 1;
        Some(self.reader.load(key, addr).map(|payload| (key, payload)))
    }
}

/// Sequential reader over an archive stream: a file, standard input, or
/// the output of a pipe command.
#[derive(Debug)]
pub struct ArchiveReader<P> {
    address: Address,
    _payload: PhantomData<P>,
}

impl<P: Decode> ArchiveReader<P> {
    pub fn new(addr: &str) -> ArchiveReader<P> {
        ArchiveReader {
            address: Address::parse(addr),
            _payload: PhantomData,
        }
    }

    /// Opens the source and yields `(key, payload)` pairs in stream
    /// order until end-of-stream. Each call reopens the address, so for
    /// a pipe address this re-invokes the producing command. The source
    /// is released when the iterator is dropped, including when a decode
    /// error cuts the traversal short.
    pub fn iter(&self) -> Result<ArchiveIter<P>, ReadError> {
        let source = InputSource::open(&self.address)?;
        Ok(ArchiveIter {
            source,
            done: false,
            _payload: PhantomData,
        })
    }
}

pub struct ArchiveIter<P> {
    source: InputSource,
    done: bool,
    _payload: PhantomData<P>,
}

impl<P: Decode> Iterator for ArchiveIter<P> {
    type Item = Result<(String, P), ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Deterministic observation point for a failed pipe command,
        // checked between records and once more after the last one.
        if let Some(failure) = self.source.pipe_failure() {
            self.done = true;
            return Some(Err(failure.into()));
        }

        let key = match de::read_key(&mut self.source) {
            Ok(Some(key)) => key,
            Ok(None) => {
                self.done = true;
                return self.source.await_pipe_failure().map(|f| Err(f.into()));
            }
            Err(e) => {
                self.done = true;
                return Some(Err(ReadError::Key(e)));
            }
        };

        let decoded =
            de::expect_binary(&mut self.source).and_then(|_| P::decode(&mut self.source));
        match decoded {
            Ok(payload) => Some(Ok((key, payload))),
            Err(e) => {
                self.done = true;
                Some(Err(ReadError::Record { key, source: e }))
            }
        }
    }
}
