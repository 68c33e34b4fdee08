pub mod smtp;
pub use self::smtp::SmtpRelayTransport;

use failure::Fail;

use crate::message::{OutboundMessage, Recipient};

/// The delivery attempt for one recipient did not complete
#[derive(Debug, Fail, PartialEq)]
#[fail(display = "{}", reason)]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new<S: Into<String>>(reason: S) -> TransportError {
        TransportError {
            reason: reason.into(),
        }
    }
}

/// A trait for delivering one message copy to exactly one recipient.
///
/// Each call is a single blocking delivery attempt; retry policy belongs to
/// the caller of this crate, not to implementations.
pub trait Transport {
    fn send_to(
        &mut self,
        message: &OutboundMessage,
        recipient: &Recipient,
    ) -> Result<(), TransportError>;
}
