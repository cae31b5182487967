use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use crate::ser::{self, Encode};
use crate::source::{Address, OutputSource, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Could not open output")]
    Source(#[from] SourceError),

    #[error("Could not write record `{1}`")]
    Record(#[source] io::Error, String),

    #[error("Could not write script entry for `{1}`")]
    Script(#[source] io::Error, String),

    #[error("Could not flush outputs")]
    Flush(#[source] io::Error),
}

/// Appends keyed records to a binary archive, optionally emitting a
/// `key<TAB>path:offset` script alongside it.
///
/// Streams are opened at construction and flushed on [`finish`]
/// (`Drop` performs the same flush best-effort). A failed record write
/// is not rolled back; the archive and script may disagree about the
/// trailing record.
///
/// [`finish`]: Self::finish
pub struct ArchiveWriter<P: Encode> {
    archive: OutputSource,
    script: Option<OutputSource>,
    /// Absolute archive path recorded in script lines; `None` when the
    /// archive goes to standard output.
    archive_path: Option<PathBuf>,
    _payload: PhantomData<P>,
}

impl<P: Encode> ArchiveWriter<P> {
    /// Creates (or truncates) the archive at `archive_addr` and, if
    /// given, the script at `script_addr`. A script address is ignored
    /// with a warning when the archive goes to standard output, since
    /// no stable offsets exist there.
    pub fn create(
        archive_addr: &str,
        script_addr: Option<&str>,
    ) -> Result<ArchiveWriter<P>, WriteError> {
        let archive_address = Address::parse(archive_addr);
        let mut script_addr = script_addr.filter(|s| !s.is_empty());
        if archive_address == Address::Stdio && script_addr.is_some() {
            tracing::warn!("ignoring script output because the archive goes to stdout");
            script_addr = None;
        }

        let archive = OutputSource::create(&archive_address)?;
        let archive_path = archive.path().map(|p| p.to_path_buf());
        let script = match script_addr {
            Some(addr) => Some(OutputSource::create(&Address::parse(addr))?),
            None => None,
        };

        Ok(ArchiveWriter {
            archive,
            script,
            archive_path,
            _payload: PhantomData,
        })
    }

    /// Writes one record: key token, binary sentinel, encoded payload.
    /// The script line records the offset of the sentinel, which is
    /// exactly where a random-access load will seek.
    pub fn write(&mut self, key: &str, payload: &P) -> Result<(), WriteError> {
        ser::write_token(&mut self.archive, key)
            .map_err(|e| WriteError::Record(e, key.to_string()))?;
        let offset = self.archive.offset();
        ser::write_binary_sentinel(&mut self.archive)
            .map_err(|e| WriteError::Record(e, key.to_string()))?;
        payload
            .encode(&mut self.archive)
            .map_err(|e| WriteError::Record(e, key.to_string()))?;

        if let Some(script) = &mut self.script {
            // A script stream is only open for file archives, where the
            // path and offset are both known.
            if let (Some(path), Some(offset)) = (&self.archive_path, offset) {
                writeln!(script, "{}\t{}:{}", key, path.display(), offset)
                    .map_err(|e| WriteError::Script(e, key.to_string()))?;
            }
        }
        Ok(())
    }

    /// Flushes and closes both streams.
    pub fn finish(mut self) -> Result<(), WriteError> {
        self.finish_inner().map_err(WriteError::Flush)
    }

    fn finish_inner(&mut self) -> io::Result<()> {
        self.archive.flush()?;
        if let Some(script) = &mut self.script {
            script.flush()?;
        }
        Ok(())
    }
}

impl<P: Encode> Drop for ArchiveWriter<P> {
    fn drop(&mut self) {
        let _ = self.finish_inner();
    }
}
