use crate::error::AllRecipientsFailed;
use crate::message::{BaseMessage, OutboundMessage};
use crate::tracking::{TrackingBodyBuilder, TrackingOptions};
use crate::transport::Transport;

/// Sends one personalized copy of a message to each of its recipients.
///
/// Recipients are attempted sequentially, in the order given by the
/// message's recipient list, with no reordering and no deduplication.  A
/// failure for one recipient never aborts the loop; it is logged, recorded,
/// and the loop moves on.
pub struct Dispatcher<'a, K: TrackingBodyBuilder, T: Transport> {
    bodies: &'a K,
    transport: &'a mut T,
}

impl<'a, K: TrackingBodyBuilder, T: Transport> Dispatcher<'a, K, T> {
    pub fn new(bodies: &'a K, transport: &'a mut T) -> Dispatcher<'a, K, T> {
        Dispatcher { bodies, transport }
    }

    /// Deliver `message` to every recipient, returning the email addresses
    /// of the recipients whose delivery failed, in attempt order.
    ///
    /// Errs only when the recipient list was non-empty and every attempt
    /// failed.  An empty recipient list is a no-op success, not a total
    /// failure.
    pub fn dispatch(
        &mut self,
        message: &BaseMessage,
        options: &TrackingOptions,
    ) -> Result<Vec<String>, AllRecipientsFailed> {
        let mut failed_recipients: Vec<String> = Vec::new();

        debug!(
            "dispatching message {} to {} recipients",
            message.message_id,
            message.to.len()
        );

        for recipient in &message.to {
            let body = self.bodies.build_body(recipient, message, options);
            let outbound = OutboundMessage::for_recipient(message, recipient, body);

            if let Err(e) = self.transport.send_to(&outbound, recipient) {
                warn!("delivery to {} failed: {}", recipient.email, e);
                failed_recipients.push(recipient.email.clone());
            }
        }

        if !message.to.is_empty() && failed_recipients.len() == message.to.len() {
            return Err(AllRecipientsFailed {
                count: failed_recipients.len(),
            });
        }

        Ok(failed_recipients)
    }
}
