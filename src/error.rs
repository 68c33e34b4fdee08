use failure::Fail;

/// Reasons the canonical message could not be built from its payload.
/// These occur before anything has been handed to the transport, so the
/// whole operation is still safe to retry upstream.
#[derive(Debug, Fail, PartialEq)]
pub enum BuildError {
    #[fail(display = "message has no sender address")]
    MissingFrom,

    #[fail(display = "invalid recipient address: {}", _0)]
    InvalidRecipient(String),

    /// A header-bound field contained a line break.  Letting it through
    /// would let caller content smuggle extra header lines onto the wire.
    #[fail(display = "header field {} contains a line break", _0)]
    InvalidHeaderValue(String),
}

/// Raised by the dispatcher only when every single recipient's send
/// attempt failed.  Partial failure is not an error.
#[derive(Debug, Fail, PartialEq)]
#[fail(display = "delivery failed for all {} recipients", count)]
pub struct AllRecipientsFailed {
    pub count: usize,
}

#[derive(Debug, Fail)]
pub enum Error {
    /// The canonical message could not be built.  No send was attempted
    /// and the operation was never marked non-retryable.
    #[fail(display = "unable to build message for sending: {}", _0)]
    Build(#[cause] BuildError),

    /// The message was not delivered to any recipient.  The operation is
    /// already non-retryable; surface this to the user rather than
    /// resending.
    #[fail(display = "message failed to send to all recipients")]
    SendFailure,

    #[fail(display = "invalid configuration: {}", _0)]
    Config(#[cause] toml::de::Error),
}

impl Error {
    /// Coarse HTTP-style classification for reporting to callers
    pub fn status_code(&self) -> u16 {
        match *self {
            Error::Build(_) => 400,
            Error::SendFailure => 500,
            Error::Config(_) => 400,
        }
    }
}

impl From<BuildError> for Error {
    fn from(e: BuildError) -> Error {
        Error::Build(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Error {
        Error::Config(e)
    }
}
