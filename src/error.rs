//! Typed error taxonomy for the storage engine.
//!
//! Public operations return `eyre::Result`; the variants below are embedded
//! in the report so callers that need to branch on the failure class can
//! `downcast_ref::<StoreError>()` while everyone else gets a readable chain
//! of context.

use thiserror::Error;

/// Failure classes surfaced by the engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file header does not start with the `jinn` magic bytes.
    #[error("not a jinn database: bad magic bytes")]
    BadMagic,

    /// The file was written by an unknown format version.
    #[error("unsupported file format version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    /// A block failed to decode (bad JSON, compression mismatch).
    #[error("corrupt block {block}: {reason}")]
    CorruptBlock { block: u64, reason: String },

    /// Legacy newline-delimited file has non-uniform line lengths.
    #[error("legacy file has non-uniform blocks: expected {expected} bytes, found {found}")]
    BlockSizeMismatch { expected: u64, found: u64 },

    /// A query, update directive, or option was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying file operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn corrupt_block(block: u64, reason: impl Into<String>) -> Self {
        StoreError::CorruptBlock {
            block,
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_stable_messages() {
        assert_eq!(
            StoreError::BadMagic.to_string(),
            "not a jinn database: bad magic bytes"
        );
        assert_eq!(
            StoreError::UnsupportedVersion {
                found: 9,
                expected: 1
            }
            .to_string(),
            "unsupported file format version 9 (expected 1)"
        );
        assert_eq!(
            StoreError::BlockSizeMismatch {
                expected: 64,
                found: 61
            }
            .to_string(),
            "legacy file has non-uniform blocks: expected 64 bytes, found 61"
        );
    }

    #[test]
    fn store_error_downcasts_through_eyre() {
        let report: eyre::Report = StoreError::BadMagic.into();
        assert!(matches!(
            report.downcast_ref::<StoreError>(),
            Some(StoreError::BadMagic)
        ));
    }
}
