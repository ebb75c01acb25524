use thiserror::Error;

/// Errors that can occur while binding, loading or saving a record. Marked as non-exhaustive
/// to allow for future additions without breaking the API. At runtime a caller would usually
/// only handle `IntegrityFailure` by falling back to defaults, the layout errors are static.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// A record needs at least one byte.
    #[error("empty record")]
    EmptyRecord,

    /// The page size has to be a power of two and a multiple of the word size (4)
    #[error("invalid page size")]
    InvalidPageSize,

    /// The end of flash has to be aligned to the page size
    #[error("invalid flash end")]
    InvalidFlashEnd,

    /// The page aligned record does not fit between the start and the end of flash.
    #[error("record too large")]
    RecordTooLarge,

    /// The stored checksum does not match the one computed over the payload. Never written,
    /// corrupted and torn regions all look the same.
    #[error("integrity failure: stored {stored:#06x}, computed {computed:#06x}")]
    IntegrityFailure { stored: u16, computed: u16 },

    /// The internal error value is returned from the provided platform
    #[error("internal flash error")]
    FlashError,

    /// The flash controller stayed busy longer than the configured limit.
    #[error("flash controller timeout")]
    Timeout,
}
