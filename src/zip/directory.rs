//! Central directory loading and validation.
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) near the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For streaming, read each file's Local File Header and data
//!
//! This module owns steps 1-2 once the EOCD has been located: it parses
//! the trailer, walks the central directory entries, and cross-checks the
//! two against each other before any entry data is touched.

use std::borrow::Cow;
use std::io::{self, Read, Seek};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ZipError;
use crate::io::ArchiveFile;

use super::records::{CD_ENTRY_SIGNATURE, EOCD_SIGNATURE, EndOfCentralDirectory, FileEntry};

/// Source of directory identities. Every successful load gets a fresh id,
/// which its entries carry; the streamer uses it to reject records from a
/// stale or foreign load.
static NEXT_DIRECTORY_ID: AtomicU64 = AtomicU64::new(1);

/// The parsed central directory of an open archive.
///
/// Owns the trailer record and the entries in on-disk order. Entries are
/// immutable once the directory is built.
#[derive(Debug)]
pub struct CentralDirectory {
    id: u64,
    eocd: EndOfCentralDirectory,
    entries: Vec<FileEntry>,
    file_size: u64,
    eocd_offset: u64,
    /// Position just past the last parsed entry; must land exactly on
    /// the EOCD record.
    cd_end: u64,
}

impl CentralDirectory {
    /// Parse the trailer and all central directory entries, then
    /// cross-validate the result.
    ///
    /// `eocd_offset` is the absolute position of the EOCD signature as
    /// discovered by the backward scan.
    pub(crate) fn read_from<R: Read + Seek>(
        file: &mut ArchiveFile<R>,
        eocd_offset: u64,
    ) -> Result<Self, ZipError> {
        let eocd = Self::read_eocd(file, eocd_offset)
            .map_err(|_| ZipError::CannotReadDirectory)?
            .ok_or(ZipError::CannotReadDirectory)?;

        let id = NEXT_DIRECTORY_ID.fetch_add(1, Ordering::Relaxed);

        file.seek_to(eocd.cd_offset as u64)
            .map_err(|_| ZipError::CannotReadDirectory)?;

        let mut entries = Vec::with_capacity(eocd.total_records as usize);
        let mut cd_end = eocd.cd_offset as u64;
        loop {
            let position = file.position().map_err(|_| ZipError::CannotReadDirectory)?;
            if position >= eocd_offset {
                break;
            }
            match Self::read_cd_entry(file, id).map_err(|_| ZipError::CannotReadDirectory)? {
                Some(entry) => {
                    entries.push(entry);
                    cd_end = file.position().map_err(|_| ZipError::CannotReadDirectory)?;
                }
                None => break,
            }
        }

        log::debug!(
            "parsed {} central directory entries at offset {}",
            entries.len(),
            eocd.cd_offset
        );

        let directory = Self {
            id,
            eocd,
            entries,
            file_size: file.len(),
            eocd_offset,
            cd_end,
        };
        directory.validate()?;
        Ok(directory)
    }

    /// Read the EOCD record at `eocd_offset`. `None` means the signature
    /// did not match; short reads surface as I/O errors.
    fn read_eocd<R: Read + Seek>(
        file: &mut ArchiveFile<R>,
        eocd_offset: u64,
    ) -> io::Result<Option<EndOfCentralDirectory>> {
        file.seek_to(eocd_offset)?;
        let signature = file.read_u32_le()?;
        if signature != EOCD_SIGNATURE {
            return Ok(None);
        }

        let disk_number = file.read_u16_le()?;
        let cd_start_disk = file.read_u16_le()?;
        let records_on_disk = file.read_u16_le()?;
        let total_records = file.read_u16_le()?;
        let cd_size = file.read_u32_le()?;
        let cd_offset = file.read_u32_le()?;
        let comment_size = file.read_u16_le()?;
        let mut comment = vec![0u8; comment_size as usize];
        file.read_exact(&mut comment)?;

        Ok(Some(EndOfCentralDirectory {
            disk_number,
            cd_start_disk,
            records_on_disk,
            total_records,
            cd_size,
            cd_offset,
            comment,
        }))
    }

    /// Read one central directory entry at the current position.
    ///
    /// `None` ends the walk: a signature that is not a CD entry, or an
    /// entry with an empty name. The cross-validation pass turns a short
    /// walk into the right error.
    fn read_cd_entry<R: Read + Seek>(
        file: &mut ArchiveFile<R>,
        directory_id: u64,
    ) -> io::Result<Option<FileEntry>> {
        let signature = file.read_u32_le()?;
        if signature != CD_ENTRY_SIGNATURE {
            return Ok(None);
        }

        let version_made_by = file.read_u16_le()?;
        let version_needed = file.read_u16_le()?;
        let bit_flag = file.read_u16_le()?;
        let compression_method = file.read_u16_le()?;
        let dos_time = file.read_u16_le()?;
        let dos_date = file.read_u16_le()?;
        let crc32 = file.read_u32_le()?;
        let compressed_size = file.read_u32_le()?;
        let uncompressed_size = file.read_u32_le()?;
        let name_size = file.read_u16_le()?;
        let extra_field_size = file.read_u16_le()?;
        let comment_size = file.read_u16_le()?;
        let disk_start = file.read_u16_le()?;
        let internal_attrs = file.read_u16_le()?;
        let external_attrs = file.read_u32_le()?;
        let local_header_offset = file.read_u32_le()?;

        if name_size == 0 {
            return Ok(None);
        }

        let mut name = vec![0u8; name_size as usize];
        file.read_exact(&mut name)?;

        // Extra field contents are not interpreted, only skipped.
        file.skip(extra_field_size as u64)?;

        let mut comment = vec![0u8; comment_size as usize];
        file.read_exact(&mut comment)?;

        Ok(Some(FileEntry {
            version_made_by,
            version_needed,
            bit_flag,
            compression_method,
            dos_time,
            dos_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attrs,
            external_attrs,
            local_header_offset,
            name,
            extra_field_size,
            comment,
            directory_id,
        }))
    }

    /// Cross-check the parsed entries against the trailer.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// single-disk, at least one entry, entry count matches the trailer,
    /// the directory runs flush into the EOCD, and finally every entry
    /// validates on its own.
    fn validate(&self) -> Result<(), ZipError> {
        if self.eocd.disk_number != 0 || self.eocd.cd_start_disk != 0 {
            return Err(ZipError::MultipleDisksUnsupported);
        }
        if self.entries.is_empty() {
            return Err(ZipError::CannotReadDirectory);
        }
        if self.entries.len() != self.eocd.total_records as usize {
            return Err(ZipError::EntryCountMismatch {
                expected: self.eocd.total_records,
                actual: self.entries.len(),
            });
        }
        if self.cd_end != self.eocd_offset {
            return Err(ZipError::DirectoryMisaligned);
        }
        for entry in &self.entries {
            entry.validate()?;
        }
        Ok(())
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The parsed trailer record.
    pub fn eocd(&self) -> &EndOfCentralDirectory {
        &self.eocd
    }

    /// Archive comment from the trailer, decoded as UTF-8.
    pub fn comment(&self) -> Cow<'_, str> {
        self.eocd.comment()
    }

    /// Total size of the archive file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of entries, in on-disk order.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`, or `None` past the end.
    pub fn entry_at(&self, index: usize) -> Option<&FileEntry> {
        self.entries.get(index)
    }

    /// Index of the entry whose name equals `name` exactly
    /// (case-sensitive), or `None`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name.as_bytes())
    }

    /// Iterate entries in on-disk order.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }
}

impl PartialEq for CentralDirectory {
    /// Field-wise equality; the load identity is excluded so repeated
    /// loads of the same archive compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.eocd == other.eocd
            && self.entries == other.entries
            && self.file_size == other.file_size
            && self.eocd_offset == other.eocd_offset
            && self.cd_end == other.cd_end
    }
}

impl Eq for CentralDirectory {}
