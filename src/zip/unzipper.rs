//! High-level ZIP reading API.
//!
//! [`Unzipper`] ties the pieces together: it opens an archive, discovers
//! the trailer, loads the central directory, and streams individual
//! entries through a caller-supplied sink with optional progress
//! reporting and cooperative cancellation.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use sunzip::Unzipper;
//!
//! # fn example() -> Result<(), sunzip::ZipError> {
//! let mut unzipper = Unzipper::new();
//! unzipper.open(Path::new("archive.zip"))?;
//! unzipper.read_central_directory()?;
//!
//! let record = unzipper.record_at(0)?.clone();
//! let mut contents = Vec::new();
//! unzipper.stream_entry(&record, |chunk, _range| {
//!     contents.extend_from_slice(chunk);
//!     false
//! })?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{Read, Seek};
use std::ops::Range;
use std::path::Path;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::ZipError;
use crate::io::ArchiveFile;

use super::directory::CentralDirectory;
use super::records::{EOCD_SIGNATURE, EndOfCentralDirectory, FileEntry, LOCAL_HEADER_SIGNATURE};

/// Size of the fixed input and output buffers used by the inflate pump.
const STREAM_BUFFER_SIZE: usize = 4096;

/// Fixed bytes between the local header signature and the name length
/// field: version, flags, method, DOS time/date, CRC-32, and both sizes.
/// All redundant copies of the central directory entry, which is the
/// source of truth; only the name length is cross-checked.
const LOCAL_HEADER_FIXED_TAIL: u64 = 22;

/// Progress report delivered alongside each decompressed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProgress {
    /// Expected total, from the central directory entry.
    pub total_size: u64,
    /// Bytes delivered so far, including the current chunk.
    pub streamed: u64,
    /// Bytes in the current chunk.
    pub delta: u64,
}

struct OpenArchive<R> {
    file: ArchiveFile<R>,
    eocd_offset: u64,
    directory: Option<CentralDirectory>,
}

/// A streaming reader over a single-disk ZIP archive.
///
/// The unzipper is a small state machine: construct it, `open` (or
/// `attach`) an archive, `read_central_directory`, then look up and
/// stream records. Operations invoked out of order fail with
/// [`ZipError::MustOpenFirst`] rather than panicking.
///
/// All operations are synchronous and run on the calling thread; the
/// sink callback is invoked inline as chunks are inflated.
pub struct Unzipper<R = File> {
    archive: Option<OpenArchive<R>>,
}

impl Unzipper<File> {
    /// Open a ZIP archive on the local filesystem.
    ///
    /// Verifies that the file carries an end-of-central-directory record
    /// within the trailing scan window; anything else is rejected as not
    /// a ZIP archive. Any previously attached archive is closed.
    pub fn open(&mut self, path: &Path) -> Result<(), ZipError> {
        let file = File::open(path).map_err(ZipError::CannotOpen)?;
        self.attach(file)
    }
}

impl<R: Read + Seek> Unzipper<R> {
    /// Create an unzipper with no archive attached.
    pub fn new() -> Self {
        Self { archive: None }
    }

    /// Attach any random-access source containing a ZIP archive.
    ///
    /// This is `open` for non-file sources (an in-memory buffer, most
    /// commonly). The trailer is located here; the central directory is
    /// not read until [`read_central_directory`](Self::read_central_directory).
    pub fn attach(&mut self, source: R) -> Result<(), ZipError> {
        self.archive = None;

        let mut file = ArchiveFile::new(source).map_err(ZipError::CannotOpen)?;
        if file.len() < EndOfCentralDirectory::SIZE {
            return Err(ZipError::InvalidArchive);
        }

        let max_scan = EndOfCentralDirectory::SIZE + EndOfCentralDirectory::MAX_COMMENT_SIZE;
        let eocd_offset = file
            .find_signature_backwards(EOCD_SIGNATURE, max_scan)
            .map_err(ZipError::CannotOpen)?
            .ok_or(ZipError::InvalidArchive)?;

        log::debug!("located end of central directory at offset {eocd_offset}");

        self.archive = Some(OpenArchive {
            file,
            eocd_offset,
            directory: None,
        });
        Ok(())
    }

    /// Whether an archive is currently attached.
    pub fn is_open(&self) -> bool {
        self.archive.is_some()
    }

    /// Close the archive and drop the loaded directory, if any.
    pub fn close(&mut self) {
        self.archive = None;
    }

    /// Load and validate the central directory.
    ///
    /// May be called repeatedly; each call re-reads the directory from
    /// disk and replaces the previous one. Records cloned out of an
    /// earlier load are rejected by [`stream_entry`](Self::stream_entry)
    /// afterward.
    pub fn read_central_directory(&mut self) -> Result<&CentralDirectory, ZipError> {
        let archive = self.archive.as_mut().ok_or(ZipError::MustOpenFirst)?;
        let directory = CentralDirectory::read_from(&mut archive.file, archive.eocd_offset)?;
        Ok(archive.directory.insert(directory))
    }

    /// The currently loaded central directory, if any.
    pub fn directory(&self) -> Option<&CentralDirectory> {
        self.archive.as_ref().and_then(|a| a.directory.as_ref())
    }

    /// Number of records in the loaded directory, 0 before loading.
    pub fn record_count(&self) -> usize {
        self.directory().map_or(0, CentralDirectory::len)
    }

    /// Record at `index` in on-disk order.
    pub fn record_at(&self, index: usize) -> Result<&FileEntry, ZipError> {
        let directory = self.directory().ok_or(ZipError::MustOpenFirst)?;
        directory
            .entry_at(index)
            .ok_or(ZipError::IndexOutOfBounds {
                index,
                count: directory.len(),
            })
    }

    /// Index of the record named exactly `name`, or `None`.
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.directory().and_then(|d| d.index_of(name))
    }

    /// Visit every record in on-disk order.
    ///
    /// The visitor returns `true` to stop the enumeration early.
    pub fn enumerate_records<F>(&self, mut visit: F) -> Result<(), ZipError>
    where
        F: FnMut(&FileEntry, usize) -> bool,
    {
        let directory = self.directory().ok_or(ZipError::MustOpenFirst)?;
        for (index, entry) in directory.entries().enumerate() {
            if visit(entry, index) {
                break;
            }
        }
        Ok(())
    }

    /// Stream a record's decompressed bytes into `sink`.
    ///
    /// `sink` receives each chunk together with its byte range within
    /// the decompressed output; the ranges are contiguous, in increasing
    /// order, and partition `[0, uncompressed_size)`. Returning `true`
    /// from the sink requests cancellation.
    ///
    /// On success the full entry was delivered and its CRC-32 matched
    /// the central directory. A cancellation that prevents the DEFLATE
    /// stream from completing is reported as
    /// [`ZipError::CannotDecompress`], since the entry's integrity was
    /// never confirmed. Failure leaves the archive open and the
    /// directory intact; other entries can still be streamed.
    pub fn stream_entry<S>(&mut self, record: &FileEntry, sink: S) -> Result<(), ZipError>
    where
        S: FnMut(&[u8], Range<u64>) -> bool,
    {
        self.stream_inner(record, None::<fn(StreamProgress) -> bool>, sink)
    }

    /// [`stream_entry`](Self::stream_entry) with a progress callback.
    ///
    /// `progress` is invoked after the sink for every chunk and may also
    /// cancel by returning `true`.
    pub fn stream_entry_with_progress<P, S>(
        &mut self,
        record: &FileEntry,
        progress: P,
        sink: S,
    ) -> Result<(), ZipError>
    where
        P: FnMut(StreamProgress) -> bool,
        S: FnMut(&[u8], Range<u64>) -> bool,
    {
        self.stream_inner(record, Some(progress), sink)
    }

    fn stream_inner<P, S>(
        &mut self,
        record: &FileEntry,
        mut progress: Option<P>,
        mut sink: S,
    ) -> Result<(), ZipError>
    where
        P: FnMut(StreamProgress) -> bool,
        S: FnMut(&[u8], Range<u64>) -> bool,
    {
        let archive = self.archive.as_mut().ok_or(ZipError::MustOpenFirst)?;
        let directory = archive.directory.as_ref().ok_or(ZipError::MustOpenFirst)?;

        // Identity, not value: the record must come from the directory
        // that is currently loaded, not an equal-looking stale one.
        if record.directory_id != directory.id() {
            return Err(ZipError::CannotReadEntry);
        }

        // Nothing to inflate and nothing to verify.
        if record.is_zero_length() {
            return Ok(());
        }

        let file = &mut archive.file;
        Self::locate_payload(file, record)?;

        let mut decoder = Decompress::new(false);
        let mut input_buf = [0u8; STREAM_BUFFER_SIZE];
        let mut output_buf = [0u8; STREAM_BUFFER_SIZE];
        let mut compressed_left = record.compressed_size as u64;
        let mut streamed: u64 = 0;
        let mut crc = crc32fast::Hasher::new();
        let mut stop = false;
        let mut stream_ended = false;

        while !stop {
            let in_size = (input_buf.len() as u64).min(compressed_left) as usize;
            file.read_exact(&mut input_buf[..in_size])
                .map_err(|_| ZipError::CannotDecompress)?;
            compressed_left -= in_size as u64;
            let mut input = &input_buf[..in_size];

            loop {
                let before_in = decoder.total_in();
                let before_out = decoder.total_out();
                let status = decoder
                    .decompress(input, &mut output_buf, FlushDecompress::None)
                    .map_err(|_| ZipError::CannotDecompress)?;
                let consumed = (decoder.total_in() - before_in) as usize;
                let produced = (decoder.total_out() - before_out) as usize;
                input = &input[consumed..];

                if produced > 0 {
                    let chunk = &output_buf[..produced];
                    // The CRC must witness every chunk before the sink
                    // does.
                    crc.update(chunk);
                    let range = streamed..streamed + produced as u64;
                    streamed = range.end;
                    if sink(chunk, range) {
                        stop = true;
                    }
                    if let Some(report) = progress.as_mut() {
                        let update = StreamProgress {
                            total_size: record.uncompressed_size as u64,
                            streamed,
                            delta: produced as u64,
                        };
                        if report(update) {
                            stop = true;
                        }
                    }
                }

                match status {
                    Status::StreamEnd => {
                        stream_ended = true;
                        stop = true;
                    }
                    Status::Ok => {}
                    // No forward progress is possible; the postcondition
                    // below reports the truncated stream.
                    Status::BufError => stop = true,
                }

                // A full output buffer means the decoder may be holding
                // more; drain before reading further input.
                if stop || produced < output_buf.len() {
                    break;
                }
            }

            if compressed_left == 0 {
                break;
            }
        }

        if !stream_ended
            || streamed != record.uncompressed_size as u64
            || crc.finalize() != record.crc32
        {
            return Err(ZipError::CannotDecompress);
        }
        Ok(())
    }

    /// Position the cursor on the first byte of compressed payload.
    fn locate_payload(file: &mut ArchiveFile<R>, record: &FileEntry) -> Result<(), ZipError> {
        file.seek_to(record.local_header_offset as u64)
            .map_err(|_| ZipError::CannotReadEntry)?;

        let signature = file.read_u32_le().map_err(|_| ZipError::CannotReadEntry)?;
        if signature != LOCAL_HEADER_SIGNATURE {
            return Err(ZipError::CannotReadEntry);
        }

        file.skip(LOCAL_HEADER_FIXED_TAIL)
            .map_err(|_| ZipError::CannotReadEntry)?;
        let name_size = file.read_u16_le().map_err(|_| ZipError::CannotReadEntry)?;
        let extra_field_size = file.read_u16_le().map_err(|_| ZipError::CannotReadEntry)?;

        if name_size as usize != record.name.len() {
            return Err(ZipError::CannotReadEntry);
        }

        file.skip(name_size as u64 + extra_field_size as u64)
            .map_err(|_| ZipError::CannotReadEntry)?;
        Ok(())
    }
}

impl<R: Read + Seek> Default for Unzipper<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn operations_require_open() {
        let mut unzipper: Unzipper<Cursor<Vec<u8>>> = Unzipper::new();
        assert!(!unzipper.is_open());
        assert!(matches!(
            unzipper.read_central_directory(),
            Err(ZipError::MustOpenFirst)
        ));
        assert!(matches!(
            unzipper.record_at(0),
            Err(ZipError::MustOpenFirst)
        ));
        assert!(matches!(
            unzipper.enumerate_records(|_, _| false),
            Err(ZipError::MustOpenFirst)
        ));
        assert_eq!(unzipper.record_count(), 0);
        assert_eq!(unzipper.index_for_name("anything"), None);
    }

    #[test]
    fn attach_rejects_tiny_files() {
        let mut unzipper = Unzipper::new();
        let result = unzipper.attach(Cursor::new(vec![0u8; 10]));
        assert!(matches!(result, Err(ZipError::InvalidArchive)));
        assert!(!unzipper.is_open());
    }

    #[test]
    fn attach_rejects_garbage() {
        let mut unzipper = Unzipper::new();
        let result = unzipper.attach(Cursor::new(vec![0xAAu8; 4096]));
        assert!(matches!(result, Err(ZipError::InvalidArchive)));
    }

    #[test]
    fn close_resets_state() {
        let mut unzipper: Unzipper<Cursor<Vec<u8>>> = Unzipper::new();
        unzipper.close();
        assert!(!unzipper.is_open());
        assert!(matches!(
            unzipper.read_central_directory(),
            Err(ZipError::MustOpenFirst)
        ));
    }
}
