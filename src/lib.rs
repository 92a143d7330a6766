//! # sunzip
//!
//! A streaming unzip utility and library.
//!
//! This crate reads single-disk ZIP archives: it locates the
//! end-of-central-directory record with a bounded backward scan, parses
//! and cross-validates the central directory, and streams DEFLATE entry
//! data through a caller-supplied sink in bounded chunks, verifying the
//! CRC-32 as it goes. Entries are never buffered whole.
//!
//! ## Features
//!
//! - List and stream entries of local ZIP archives
//! - Bounded memory: fixed-size buffers regardless of entry size
//! - Running CRC-32 verification against the central directory
//! - Progress reporting and cooperative cancellation per entry
//!
//! Encrypted entries, multi-disk archives, ZIP64 extensions, and
//! compression methods other than DEFLATE are recognized and rejected.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use sunzip::Unzipper;
//!
//! fn main() -> Result<(), sunzip::ZipError> {
//!     let mut unzipper = Unzipper::new();
//!     unzipper.open(Path::new("archive.zip"))?;
//!     unzipper.read_central_directory()?;
//!
//!     unzipper.enumerate_records(|record, _index| {
//!         println!("{}", record.name());
//!         false
//!     })?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::ZipError;
pub use zip::{
    CentralDirectory, CompressionLevel, CompressionMethod, EndOfCentralDirectory, FileEntry,
    StreamProgress, Unzipper,
};
