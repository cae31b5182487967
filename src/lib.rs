//! Herein lies the plumbing for Kaldi-style `.ark`/`.scp` tables.
//!
//! Use [ScriptReader] for random access by key, [ArchiveReader] to stream
//! an archive (including from a pipe command), and [ArchiveWriter] to
//! produce an archive with its script.

mod de;
mod record;
mod script;
mod ser;
mod source;
mod table;

pub use de::{Decode, DecodeError};
pub use record::{Example, IntVector, Matrix};
pub use script::{AddressForm, Script, ScriptAddress, ScriptError};
pub use ser::Encode;
pub use source::{Address, InputSource, OutputSource, PipeFailure, SourceError};
pub use table::reader::{ArchiveIter, ArchiveReader, ReadError, ScriptIter, ScriptReader};
pub use table::writer::{ArchiveWriter, WriteError};
pub use table::Selector;

/// Sequential reader over a float-matrix archive.
pub type MatrixArchiveReader = ArchiveReader<Matrix>;
/// Random-access reader over a float-matrix script.
pub type MatrixScriptReader = ScriptReader<Matrix>;
/// Sequential reader over an alignment (int-vector) archive.
pub type AlignmentArchiveReader = ArchiveReader<IntVector>;
/// Random-access reader over an alignment (int-vector) script.
pub type AlignmentScriptReader = ScriptReader<IntVector>;
/// Sequential reader over a training-example archive.
pub type ExampleArchiveReader = ArchiveReader<Example>;
/// Writer for float-matrix archives.
pub type MatrixArchiveWriter = ArchiveWriter<Matrix>;
/// Writer for alignment (int-vector) archives.
pub type AlignmentArchiveWriter = ArchiveWriter<IntVector>;
/// Writer for training-example archives.
pub type ExampleArchiveWriter = ArchiveWriter<Example>;
