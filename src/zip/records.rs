//! In-memory representation of ZIP records.
//!
//! These types mirror the on-disk central directory entry and trailer
//! record. Entries are built once while the central directory is parsed
//! and never mutated afterward; everything else here is read-only
//! accessors and per-record validation.

use std::borrow::Cow;

use crate::error::ZipError;

/// Local file header signature (little-endian).
pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4B50;

/// Central directory entry signature (little-endian).
pub const CD_ENTRY_SIGNATURE: u32 = 0x0201_4B50;

/// End-of-central-directory signature (little-endian).
pub const EOCD_SIGNATURE: u32 = 0x0605_4B50;

/// Highest `version needed to extract` (low byte) this reader handles.
pub const MAX_SUPPORTED_VERSION: u8 = 20;

/// Bit 0 of the general purpose flag: entry is encrypted.
const FLAG_ENCRYPTED: u16 = 0x0001;

/// Bits 1-2 of the general purpose flag: compression level hint.
const FLAG_LEVEL_MAXIMUM: u16 = 0x0002;
const FLAG_LEVEL_FAST: u16 = 0x0004;
const FLAG_LEVEL_SUPER_FAST: u16 = 0x0006;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Compression level hint from bits 1-2 of the general purpose flag.
///
/// Writers record how hard they tried, not anything needed to decode;
/// it is surfaced for listings only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    Default,
    Minimum,
    VeryLow,
    Maximum,
}

/// End of Central Directory record - 22 bytes plus comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub cd_start_disk: u16,
    pub records_on_disk: u16,
    pub total_records: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Fixed record size, signature included.
    pub const SIZE: u64 = 22;

    /// The comment length field is a u16, which bounds how far an EOCD
    /// can sit from the end of the file.
    pub const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

    /// Archive comment decoded as UTF-8.
    pub fn comment(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.comment)
    }
}

/// One archived file, as described by its central directory entry.
///
/// Carries the identity of the directory that parsed it so the streamer
/// can reject records from a stale or foreign directory load.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub(crate) version_made_by: u16,
    pub(crate) version_needed: u16,
    pub(crate) bit_flag: u16,
    pub(crate) compression_method: u16,
    pub(crate) dos_time: u16,
    pub(crate) dos_date: u16,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u32,
    pub(crate) uncompressed_size: u32,
    pub(crate) disk_start: u16,
    pub(crate) internal_attrs: u16,
    pub(crate) external_attrs: u32,
    pub(crate) local_header_offset: u32,
    pub(crate) name: Vec<u8>,
    /// The extra field itself is skipped during parsing; only its length
    /// is kept for bookkeeping.
    pub(crate) extra_field_size: u16,
    pub(crate) comment: Vec<u8>,
    pub(crate) directory_id: u64,
}

impl FileEntry {
    /// File name decoded as UTF-8.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Entry comment decoded as UTF-8, if one is present.
    pub fn comment(&self) -> Option<Cow<'_, str>> {
        if self.comment.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.comment))
        }
    }

    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.compression_method)
    }

    /// Compression level hint recorded by the writer.
    ///
    /// The two flag bits are tested super-fast first, then fast, then
    /// maximum; anything else is the default level.
    pub fn compression_level(&self) -> CompressionLevel {
        if self.bit_flag & FLAG_LEVEL_SUPER_FAST == FLAG_LEVEL_SUPER_FAST {
            CompressionLevel::Minimum
        } else if self.bit_flag & FLAG_LEVEL_FAST != 0 {
            CompressionLevel::VeryLow
        } else if self.bit_flag & FLAG_LEVEL_MAXIMUM != 0 {
            CompressionLevel::Maximum
        } else {
            CompressionLevel::Default
        }
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    pub fn local_header_offset(&self) -> u32 {
        self.local_header_offset
    }

    pub fn version_made_by(&self) -> u16 {
        self.version_made_by
    }

    pub fn version_needed(&self) -> u16 {
        self.version_needed
    }

    pub fn internal_attributes(&self) -> u16 {
        self.internal_attrs
    }

    pub fn external_attributes(&self) -> u32 {
        self.external_attrs
    }

    pub fn is_zero_length(&self) -> bool {
        self.compressed_size == 0
    }

    /// Directory entries end with '/'
    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/')
    }

    /// Resource-fork and Finder droppings that macOS archivers add.
    ///
    /// Archives produced on macOS routinely contain `__MACOSX/` shadows
    /// and `.DS_Store` files whose headers do not follow the rules the
    /// rest of the archive does; they are exempt from validation.
    pub fn is_macosx_metadata(&self) -> bool {
        let name = self.name();
        name.split('/').any(|part| part == "__MACOSX")
            || name.rsplit('/').next() == Some(".DS_Store")
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.dos_date & 0x1F) as u8;
        let month = ((self.dos_date >> 5) & 0x0F) as u8;
        let year = ((self.dos_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.dos_time & 0x1F) * 2) as u8;
        let minute = ((self.dos_time >> 5) & 0x3F) as u8;
        let hour = ((self.dos_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Check that this entry is one the reader can actually decompress.
    ///
    /// Zero-length entries and macOS metadata pass unconditionally.
    /// Everything else must be a plain, unencrypted DEFLATE entry no
    /// newer than the supported format version.
    pub fn validate(&self) -> Result<(), ZipError> {
        if self.is_zero_length() || self.is_macosx_metadata() {
            let reason = if self.is_macosx_metadata() {
                "macOS metadata"
            } else {
                "zero-length"
            };
            log::warn!(
                "entry '{}' exempted from validation ({reason})",
                self.name()
            );
            return Ok(());
        }

        let version = (self.version_needed & 0x00FF) as u8;
        if version > MAX_SUPPORTED_VERSION {
            return Err(ZipError::UnsupportedVersion {
                name: self.name().into_owned(),
                version,
            });
        }

        if self.bit_flag & FLAG_ENCRYPTED != 0 {
            return Err(ZipError::EncryptionUnsupported {
                name: self.name().into_owned(),
            });
        }

        if self.compression_method() != CompressionMethod::Deflate {
            return Err(ZipError::MethodUnsupported {
                name: self.name().into_owned(),
                method: self.compression_method,
            });
        }

        Ok(())
    }
}

impl PartialEq for FileEntry {
    /// Field-wise equality over the on-disk data. The parse-time
    /// directory id is deliberately excluded: two loads of the same
    /// archive must yield entries that compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.version_made_by == other.version_made_by
            && self.version_needed == other.version_needed
            && self.bit_flag == other.bit_flag
            && self.compression_method == other.compression_method
            && self.dos_time == other.dos_time
            && self.dos_date == other.dos_date
            && self.crc32 == other.crc32
            && self.compressed_size == other.compressed_size
            && self.uncompressed_size == other.uncompressed_size
            && self.disk_start == other.disk_start
            && self.internal_attrs == other.internal_attrs
            && self.external_attrs == other.external_attrs
            && self.local_header_offset == other.local_header_offset
            && self.name == other.name
            && self.extra_field_size == other.extra_field_size
            && self.comment == other.comment
    }
}

impl Eq for FileEntry {}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            version_made_by: 20,
            version_needed: 20,
            bit_flag: 0,
            compression_method: 8,
            dos_time: 0,
            dos_date: 0,
            crc32: 0,
            compressed_size: 10,
            uncompressed_size: 20,
            disk_start: 0,
            internal_attrs: 0,
            external_attrs: 0,
            local_header_offset: 0,
            name: name.as_bytes().to_vec(),
            extra_field_size: 0,
            comment: Vec::new(),
            directory_id: 1,
        }
    }

    #[test]
    fn compression_level_mapping() {
        let mut e = entry("a");
        e.bit_flag = 0b110;
        assert_eq!(e.compression_level(), CompressionLevel::Minimum);
        e.bit_flag = 0b100;
        assert_eq!(e.compression_level(), CompressionLevel::VeryLow);
        e.bit_flag = 0b010;
        assert_eq!(e.compression_level(), CompressionLevel::Maximum);
        e.bit_flag = 0b000;
        assert_eq!(e.compression_level(), CompressionLevel::Default);
    }

    #[test]
    fn macosx_metadata_detection() {
        assert!(entry("__MACOSX/foo.txt").is_macosx_metadata());
        assert!(entry("dir/__MACOSX/foo.txt").is_macosx_metadata());
        assert!(entry(".DS_Store").is_macosx_metadata());
        assert!(entry("photos/.DS_Store").is_macosx_metadata());
        assert!(!entry("NOT__MACOSX/foo.txt").is_macosx_metadata());
        assert!(!entry("a/DS_Store").is_macosx_metadata());
        assert!(!entry("regular.txt").is_macosx_metadata());
    }

    #[test]
    fn directory_names() {
        assert!(entry("a/").is_directory());
        assert!(!entry("a").is_directory());
    }

    #[test]
    fn validate_accepts_plain_deflate() {
        assert!(entry("a.txt").validate().is_ok());
    }

    #[test]
    fn validate_rejects_new_version() {
        let mut e = entry("a.txt");
        e.version_needed = 45;
        assert!(matches!(
            e.validate(),
            Err(ZipError::UnsupportedVersion { version: 45, .. })
        ));
    }

    #[test]
    fn validate_rejects_encrypted() {
        let mut e = entry("a.txt");
        e.bit_flag = 1;
        assert!(matches!(
            e.validate(),
            Err(ZipError::EncryptionUnsupported { .. })
        ));
    }

    #[test]
    fn validate_rejects_stored() {
        let mut e = entry("a.txt");
        e.compression_method = 0;
        assert!(matches!(
            e.validate(),
            Err(ZipError::MethodUnsupported { method: 0, .. })
        ));
    }

    #[test]
    fn validate_exempts_zero_length_and_metadata() {
        let mut dir = entry("a/");
        dir.compressed_size = 0;
        dir.compression_method = 0;
        assert!(dir.validate().is_ok());

        let mut meta = entry("__MACOSX/._a");
        meta.compression_method = 0;
        meta.bit_flag = 1;
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn version_check_uses_low_byte() {
        let mut e = entry("a.txt");
        // Only the low byte carries the format version.
        e.version_needed = 0x0314;
        assert!(e.validate().is_ok());
    }

    #[test]
    fn equality_ignores_directory_identity() {
        let a = entry("a.txt");
        let mut b = entry("a.txt");
        b.directory_id = 99;
        assert_eq!(a, b);

        let mut c = entry("a.txt");
        c.crc32 = 1;
        assert_ne!(a, c);
    }

    #[test]
    fn dos_timestamp_decoding() {
        let mut e = entry("a.txt");
        // 2024-06-15 12:34:56
        e.dos_date = ((2024 - 1980) << 9) | (6 << 5) | 15;
        e.dos_time = (12 << 11) | (34 << 5) | (56 / 2);
        assert_eq!(e.mod_date(), (2024, 6, 15));
        assert_eq!(e.mod_time(), (12, 34, 56));
    }
}
