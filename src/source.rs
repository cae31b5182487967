use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

/// A parsed logical address, resolved once at construction rather than
/// re-inspected on every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `"-"`: the process's standard input or output, depending on the
    /// open direction.
    Stdio,
    /// `"<command> |"`: the standard output of a shell command. Only
    /// valid for reading.
    Pipe(String),
    /// Anything else: a literal file path.
    Path(PathBuf),
}

impl Address {
    pub fn parse(addr: &str) -> Address {
        if addr == "-" {
            Address::Stdio
        } else if let Some(command) = addr.strip_suffix('|') {
            Address::Pipe(command.trim().to_string())
        } else {
            Address::Path(PathBuf::from(addr))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Could not find file '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("Could not open '{}'", .1.display())]
    Open(#[source] io::Error, PathBuf),

    #[error("Could not create '{}'", .1.display())]
    Create(#[source] io::Error, PathBuf),

    #[error("Could not spawn command `{1}`")]
    Spawn(#[source] io::Error, String),

    #[error("Pipe address `{0} |` is only valid for reading")]
    PipeWrite(String),
}

/// Nonzero exit of the command backing a pipe source, delivered over a
/// channel the consumer polls between decode steps. Best-effort: a
/// failure arriving after the last poll is logged but not observed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Command `{command}` exited with status {code}")]
pub struct PipeFailure {
    pub command: String,
    pub code: i32,
}

/// How long a consumer that has drained a pipe waits for the producing
/// command's exit status before giving up on observing a failure.
const PIPE_EXIT_GRACE: Duration = Duration::from_secs(5);

fn spawn_monitor(mut child: Child, command: String, exits: Sender<i32>) {
    std::thread::spawn(move || match child.wait() {
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            if !status.success() {
                tracing::warn!(command = %command, code, "pipe command exited with nonzero status");
            }
            let _ = exits.send(code);
        }
        Err(error) => {
            tracing::warn!(command = %command, %error, "could not wait on pipe command");
        }
    });
}

#[derive(Debug)]
enum InputStream {
    File(BufReader<File>),
    Stdin(io::Stdin),
    Pipe {
        stdout: BufReader<ChildStdout>,
        command: String,
        exits: Receiver<i32>,
        status: Option<i32>,
    },
}

/// A readable byte stream behind an [`Address`].
///
/// Dropping the source releases it: file handles close, the read end of
/// a pipe is reclaimed, and standard input is left untouched.
#[derive(Debug)]
pub struct InputSource {
    stream: InputStream,
}

impl InputSource {
    /// Opens the address for binary reading. A missing file fails here,
    /// not at first read.
    pub fn open(addr: &Address) -> Result<InputSource, SourceError> {
        let stream = match addr {
            Address::Stdio => InputStream::Stdin(io::stdin()),
            Address::Path(path) => {
                let file = File::open(path).map_err(|e| {
                    if e.kind() == io::ErrorKind::NotFound {
                        SourceError::NotFound(path.clone())
                    } else {
                        SourceError::Open(e, path.clone())
                    }
                })?;
                InputStream::File(BufReader::new(file))
            }
            Address::Pipe(command) => {
                let mut child = Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .stdout(Stdio::piped())
                    .spawn()
                    .map_err(|e| SourceError::Spawn(e, command.clone()))?;
                // Piped stdout is always present after a successful spawn.
                let stdout = child.stdout.take().unwrap();
                let (tx, exits) = std::sync::mpsc::channel();
                spawn_monitor(child, command.clone(), tx);
                InputStream::Pipe {
                    stdout: BufReader::new(stdout),
                    command: command.clone(),
                    exits,
                    status: None,
                }
            }
        };
        Ok(InputSource { stream })
    }

    fn poll_exit(&mut self, wait: Option<Duration>) -> Option<PipeFailure> {
        if let InputStream::Pipe {
            command,
            exits,
            status,
            ..
        } = &mut self.stream
        {
            if status.is_none() {
                *status = match wait {
                    None => exits.try_recv().ok(),
                    Some(timeout) => exits.recv_timeout(timeout).ok(),
                };
            }
            match *status {
                Some(code) if code != 0 => Some(PipeFailure {
                    command: command.clone(),
                    code,
                }),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Polls the monitor of a pipe-backed source without blocking.
    /// `None` for other source kinds, or when the command has not
    /// (yet) been seen to fail.
    pub fn pipe_failure(&mut self) -> Option<PipeFailure> {
        self.poll_exit(None)
    }

    /// Like [`pipe_failure`](Self::pipe_failure), but waits a bounded
    /// grace period for the exit status. Used once the stream has been
    /// drained, when the producing command is expected to terminate.
    pub(crate) fn await_pipe_failure(&mut self) -> Option<PipeFailure> {
        self.poll_exit(Some(PIPE_EXIT_GRACE))
    }
}

impl Read for InputSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stream {
            InputStream::File(f) => f.read(buf),
            InputStream::Stdin(s) => s.read(buf),
            InputStream::Pipe { stdout, .. } => stdout.read(buf),
        }
    }
}

#[derive(Debug)]
struct CountingWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Debug)]
enum OutputStream {
    File {
        path: PathBuf,
        file: CountingWriter<BufWriter<File>>,
    },
    Stdout(io::Stdout),
}

/// A writable byte stream behind an [`Address`].
///
/// Pipe addresses are rejected; standard output is never closed by this
/// layer. File targets track their write position so callers can record
/// stable byte offsets.
#[derive(Debug)]
pub struct OutputSource {
    stream: OutputStream,
}

impl OutputSource {
    /// Creates (or truncates) the addressed target for writing.
    pub fn create(addr: &Address) -> Result<OutputSource, SourceError> {
        let stream = match addr {
            Address::Stdio => OutputStream::Stdout(io::stdout()),
            Address::Pipe(command) => return Err(SourceError::PipeWrite(command.clone())),
            Address::Path(path) => {
                let file = File::create(path).map_err(|e| SourceError::Create(e, path.clone()))?;
                // Canonicalize after creation so recorded addresses are
                // absolute regardless of the working directory.
                let path = path
                    .canonicalize()
                    .map_err(|e| SourceError::Create(e, path.clone()))?;
                OutputStream::File {
                    path,
                    file: CountingWriter {
                        inner: BufWriter::new(file),
                        bytes_written: 0,
                    },
                }
            }
        };
        Ok(OutputSource { stream })
    }

    /// Current byte offset, for file targets only.
    pub fn offset(&self) -> Option<u64> {
        match &self.stream {
            OutputStream::File { file, .. } => Some(file.bytes_written),
            OutputStream::Stdout(_) => None,
        }
    }

    /// Absolute path of the target, for file targets only.
    pub fn path(&self) -> Option<&Path> {
        match &self.stream {
            OutputStream::File { path, .. } => Some(path),
            OutputStream::Stdout(_) => None,
        }
    }
}

impl Write for OutputSource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stream {
            OutputStream::File { file, .. } => file.write(buf),
            OutputStream::Stdout(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stream {
            OutputStream::File { file, .. } => file.flush(),
            OutputStream::Stdout(s) => s.flush(),
        }
    }
}
