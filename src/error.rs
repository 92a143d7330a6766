//! Error types for ZIP archive reading.
//!
//! Every failure the reader can report is a variant of [`ZipError`], so
//! callers can match on the exact kind instead of inspecting strings.

use std::io;

use thiserror::Error;

/// Errors produced while opening, parsing, or streaming a ZIP archive.
#[derive(Debug, Error)]
pub enum ZipError {
    /// The archive file does not exist or could not be opened.
    #[error("cannot open zip file")]
    CannotOpen(#[source] io::Error),

    /// No end-of-central-directory signature within the scan window.
    #[error("not a valid zip archive")]
    InvalidArchive,

    /// An operation was invoked before a successful open.
    #[error("archive must be opened first")]
    MustOpenFirst,

    /// Short read or bad signature while parsing the central directory
    /// or the end-of-central-directory record.
    #[error("cannot read central directory")]
    CannotReadDirectory,

    /// The archive spans more than one disk.
    #[error("multi-disk archives are not supported")]
    MultipleDisksUnsupported,

    /// The number of parsed entries disagrees with the trailer.
    #[error("central directory claims {expected} entries, parsed {actual}")]
    EntryCountMismatch { expected: u16, actual: usize },

    /// The central directory does not run flush into the trailer record.
    #[error("central directory does not end at the end-of-central-directory record")]
    DirectoryMisaligned,

    /// An entry needs a newer format version than this reader handles.
    #[error("entry '{name}' requires unsupported version {version}")]
    UnsupportedVersion { name: String, version: u8 },

    /// An entry is encrypted.
    #[error("entry '{name}' is encrypted; encryption is not supported")]
    EncryptionUnsupported { name: String },

    /// An entry uses a compression method other than DEFLATE.
    #[error("entry '{name}' uses unsupported compression method {method}")]
    MethodUnsupported { name: String, method: u16 },

    /// A record index past the end of the directory.
    #[error("record index {index} out of bounds (directory has {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    /// The local header disagrees with the central directory, or the
    /// record does not belong to the currently loaded directory.
    #[error("cannot read entry data")]
    CannotReadEntry,

    /// Inflate failure, CRC mismatch, or cancellation before stream end.
    #[error("cannot decompress entry data")]
    CannotDecompress,
}
