//! Random-access binary reading for ZIP structures.
//!
//! ZIP archives are little-endian throughout, and the interesting records
//! live at the *end* of the file, so this module provides two things: a
//! thin wrapper over any `Read + Seek` source with little-endian primitive
//! reads, and a bounded backward scan for a 4-byte signature.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

/// Chunk size for the backward signature scan.
const SCAN_CHUNK_SIZE: usize = 4096;

/// A random-access view of an archive with little-endian primitive reads.
///
/// Generic over the source so the same code serves local files and
/// in-memory buffers. The total length is captured once at construction;
/// the archive is read-only, so it cannot change underneath us.
pub struct ArchiveFile<R> {
    source: R,
    len: u64,
}

impl<R: Read + Seek> ArchiveFile<R> {
    /// Wrap a source, measuring its total length.
    pub fn new(mut source: R) -> io::Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        Ok(Self { source, len })
    }

    /// Total size of the archive in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Seek to an absolute offset from the start of the archive.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.source.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    /// Current absolute position.
    pub fn position(&mut self) -> io::Result<u64> {
        self.source.stream_position()
    }

    /// Skip forward over `bytes` without reading them.
    pub fn skip(&mut self, bytes: u64) -> io::Result<()> {
        self.source.seek(SeekFrom::Current(bytes as i64)).map(|_| ())
    }

    /// Read a little-endian u16 at the current position.
    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        self.source.read_u16::<LittleEndian>()
    }

    /// Read a little-endian u32 at the current position.
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.source.read_u32::<LittleEndian>()
    }

    /// Fill `buf` exactly; a short read is an error.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.source.read_exact(buf)
    }

    /// Scan backward from the end of the archive for a 4-byte signature.
    ///
    /// At most `max_scan` trailing bytes are examined, in fixed-size
    /// chunks read back to front. Within a chunk the search runs from the
    /// highest index down, so the match closest to the end of the file
    /// wins. Consecutive chunks overlap by three bytes; a signature
    /// straddling a chunk boundary is still found.
    ///
    /// Returns the absolute offset of the match, or `None`.
    pub fn find_signature_backwards(
        &mut self,
        signature: u32,
        max_scan: u64,
    ) -> io::Result<Option<u64>> {
        let needle = signature.to_le_bytes();
        let window = self.len.min(max_scan);
        let mut chunk = [0u8; SCAN_CHUNK_SIZE];
        let mut scanned: u64 = 0;

        while scanned < window {
            let take = (window - scanned).min(SCAN_CHUNK_SIZE as u64) as usize;
            if take < needle.len() {
                return Ok(None);
            }

            let base = self.len - scanned - take as u64;
            self.seek_to(base)?;
            self.source.read_exact(&mut chunk[..take])?;

            for i in (0..=take - needle.len()).rev() {
                if chunk[i..i + needle.len()] == needle {
                    return Ok(Some(base + i as u64));
                }
            }

            scanned += (take - (needle.len() - 1)) as u64;
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SIG: u32 = 0x0605_4B50;

    fn archive(data: Vec<u8>) -> ArchiveFile<Cursor<Vec<u8>>> {
        ArchiveFile::new(Cursor::new(data)).unwrap()
    }

    #[test]
    fn finds_signature_at_end() {
        let mut data = vec![0u8; 100];
        data.extend_from_slice(&SIG.to_le_bytes());
        let mut file = archive(data);
        assert_eq!(
            file.find_signature_backwards(SIG, 1 << 16).unwrap(),
            Some(100)
        );
    }

    #[test]
    fn finds_last_match_first() {
        let mut data = Vec::new();
        data.extend_from_slice(&SIG.to_le_bytes());
        data.extend_from_slice(&[0u8; 10]);
        data.extend_from_slice(&SIG.to_le_bytes());
        data.extend_from_slice(&[0u8; 10]);
        let mut file = archive(data);
        assert_eq!(
            file.find_signature_backwards(SIG, 1 << 16).unwrap(),
            Some(14)
        );
    }

    #[test]
    fn finds_signature_straddling_chunk_boundary() {
        // The first chunk of an 8192-byte file covers [4096, 8192), so a
        // signature starting at 4093..=4095 crosses its lower edge.
        let total = 8192;
        for pos in [SCAN_CHUNK_SIZE - 3, SCAN_CHUNK_SIZE - 2, SCAN_CHUNK_SIZE - 1] {
            let mut data = vec![0u8; total];
            data[pos..pos + 4].copy_from_slice(&SIG.to_le_bytes());
            let mut file = archive(data);
            assert_eq!(
                file.find_signature_backwards(SIG, 1 << 16).unwrap(),
                Some(pos as u64),
                "signature at {pos}"
            );
        }
    }

    #[test]
    fn respects_scan_window() {
        let mut data = Vec::new();
        data.extend_from_slice(&SIG.to_le_bytes());
        data.extend_from_slice(&[0u8; 100]);
        let mut file = archive(data);
        // Window covers only the trailing zeros, not the signature.
        assert_eq!(file.find_signature_backwards(SIG, 50).unwrap(), None);
    }

    #[test]
    fn short_file_has_no_signature() {
        let mut file = archive(vec![0x50, 0x4B]);
        assert_eq!(file.find_signature_backwards(SIG, 1 << 16).unwrap(), None);
    }

    #[test]
    fn little_endian_primitives() {
        let mut file = archive(vec![0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
        file.seek_to(0).unwrap();
        assert_eq!(file.read_u16_le().unwrap(), 0x1234);
        assert_eq!(file.read_u32_le().unwrap(), 0x1234_5678);
    }
}
