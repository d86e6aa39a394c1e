//! # File Header Codec
//!
//! A jinn database file starts with a fixed 22-byte header followed by a
//! dense array of equally sized blocks.
//!
//! ## Header Layout
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic ASCII "jinn"
//! 4       1     Format version (currently 1)
//! 5       1     Flags: bit 0 = compressed payloads
//! 6       8     block_size (little-endian u64)
//! 14      8     blocks (little-endian u64)
//! ```
//!
//! The struct uses zerocopy traits so the header is read and written as raw
//! bytes with compile-time size verification, and `U64<LittleEndian>`
//! fields keep the encoding portable across architectures.

use eyre::Result;
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{CURRENT_VERSION, FLAG_COMPRESSED, HEADER_SIZE, MAGIC};
use crate::error::StoreError;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    magic: [u8; 4],
    version: u8,
    flags: u8,
    block_size: U64,
    blocks: U64,
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == HEADER_SIZE);

impl FileHeader {
    pub fn new(block_size: u64, blocks: u64, compressed: bool) -> Self {
        Self {
            magic: *MAGIC,
            version: CURRENT_VERSION,
            flags: if compressed { FLAG_COMPRESSED } else { 0 },
            block_size: U64::new(block_size),
            blocks: U64::new(blocks),
        }
    }

    /// Parses and validates a header from raw bytes.
    ///
    /// Fails with [`StoreError::BadMagic`] when the magic bytes are wrong
    /// and [`StoreError::UnsupportedVersion`] for unknown versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::BadMagic.into());
        }
        let header = Self::read_from_bytes(&bytes[..HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse file header: {:?}", e))?;

        if &header.magic != MAGIC {
            return Err(StoreError::BadMagic.into());
        }
        if header.version != CURRENT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: header.version,
                expected: CURRENT_VERSION,
            }
            .into());
        }
        Ok(header)
    }

    pub fn block_size(&self) -> u64 {
        self.block_size.get()
    }

    pub fn blocks(&self) -> u64 {
        self.blocks.get()
    }

    pub fn compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_22() {
        assert_eq!(std::mem::size_of::<FileHeader>(), 22);
    }

    #[test]
    fn header_roundtrip() {
        let header = FileHeader::new(256, 17, true);
        let parsed = FileHeader::from_bytes(header.as_bytes()).unwrap();

        assert_eq!(parsed.block_size(), 256);
        assert_eq!(parsed.blocks(), 17);
        assert!(parsed.compressed());
    }

    #[test]
    fn header_layout_is_little_endian() {
        let header = FileHeader::new(0x0102, 3, false);
        let bytes = header.as_bytes();

        assert_eq!(&bytes[0..4], b"jinn");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], 0);
        assert_eq!(&bytes[6..14], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[14..22], &[3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(b"nope");

        let err = FileHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::BadMagic)
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let good = FileHeader::new(64, 0, false);
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(good.as_bytes());
        bytes[4] = 9;

        let err = FileHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn short_buffer_is_bad_magic() {
        let err = FileHeader::from_bytes(b"jin").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::BadMagic)
        ));
    }
}
