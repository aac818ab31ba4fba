//! Error types for the rust-ndn stack.

use thiserror::Error;

/// All possible errors that can occur within the NDN stack.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed TLV, wrong length or non-canonical number.
    #[error("format error: {0}")]
    Format(String),

    /// A read ran past the end of the buffer; one of the TLV lengths is wrong.
    #[error("buffer overflow while parsing; one of the TLV lengths is wrong")]
    BufferOverflow,

    /// An unrecognized field with a critical type number was encountered.
    #[error("unrecognized field with critical type number {typ}")]
    UnrecognizedField { typ: u64 },

    /// A required field is missing from the wire.
    #[error("required field of type {typ} is missing in the wire")]
    SkipRequired { typ: u64 },

    /// A field-specific parse error, identifying the offending field.
    #[error("failed to parse field {typ}: {cause}")]
    FailToParse { typ: u64, cause: Box<Error> },

    /// The implicit or parameters SHA-256 digest is missing or incorrect.
    #[error("the sha256 digest is missing or incorrect")]
    IncorrectDigest,

    /// A prefix, node or pending-Interest lookup missed.
    #[error("{0}: not found")]
    NotFound(String),

    /// A signature was rejected.
    #[error("validation failed for {0}")]
    Validation(String),

    /// An expressed Interest ran out of lifetime.
    #[error("interest timed out")]
    Timeout,

    /// An expressed Interest was nacked by the forwarder.
    #[error("interest nacked (reason {0})")]
    Nack(u64),

    /// An expressed Interest was cancelled before completion.
    #[error("cancelled")]
    Cancelled,

    /// A handler is already attached at an equal or covering prefix.
    #[error("prefix already registered: {0}")]
    DuplicatePrefix(String),

    /// A schema node already occupies the target path.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The engine has been shut down or was never started.
    #[error("engine is not running")]
    NotRunning,

    /// Face read/write failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Signing or key material failure.
    #[error("signing error: {0}")]
    Signing(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a parse error with the TLV type of the field it occurred in.
    pub fn in_field(self, typ: u64) -> Error {
        Error::FailToParse {
            typ,
            cause: Box::new(self),
        }
    }
}
