//! Error types shared by the decoder and the dictionary manager.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum MdictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header section is structurally invalid (length overflows the
    /// file, the XML cannot be decoded, or a required attribute is
    /// unparseable).
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// The MDict file version is unsupported (3.0+).
    #[error("Unsupported MDict version: {0}. Only v1.x and v2.x are supported.")]
    UnsupportedVersion(f64),

    /// A compressed block is structurally invalid: unknown tag, truncated
    /// region, or the decompressor rejected the payload.
    #[error("Malformed block: {0}")]
    MalformedBlock(String),

    /// A checksum validation failed, indicating data corruption.
    ///
    /// Kept distinct from [`MdictError::MalformedBlock`] so the header
    /// checksum can be downgraded to a log event while block checksums
    /// stay fatal.
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Decryption produced bytes that fail a later structural invariant.
    /// The stream cipher itself cannot fail; this surfaces the damage.
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// A declared count of items does not match the actual number found.
    #[error("Count mismatch for {item_type}: expected {expected}, but found {found}")]
    CountMismatch {
        item_type: &'static str,
        expected: u64,
        found: u64,
    },

    /// A buffer or data block has an unexpected size after an operation.
    #[error("Size mismatch for {context}: expected {expected} bytes, but found {found} bytes")]
    SizeMismatch {
        context: &'static str,
        expected: u64,
        found: u64,
    },

    /// No dictionary is registered under the given runtime ID.
    #[error("Dictionary not found: id {0}")]
    DictNotFound(u32),

    /// The word is absent from the dictionary's key index.
    #[error("Word not found: {0}")]
    WordNotFound(String),

    /// The dictionary has no MDD resource file attached.
    #[error("No MDD resource file associated with this dictionary")]
    NoMdd,

    /// The resource path is absent from the MDD's key index.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
}

/// A convenience `Result` type alias using the crate's `MdictError` type.
pub type Result<T> = std::result::Result<T, MdictError>;
