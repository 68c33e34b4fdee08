use crate::builder::MessageBuilder;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::message::{BaseMessage, MessagePayload};
use crate::status::{OperationStatus, StatusStore};
use crate::storage::MessageStorage;
use crate::tracking::{TrackingBodyBuilder, TrackingOptions};
use crate::transport::Transport;

/// What one send operation came to
#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    /// The canonical message as persisted, or `None` when delivery happened
    /// but the record could not be committed
    pub message: Option<BaseMessage>,

    /// Email addresses that did not receive the message, in attempt order.
    /// Empty on full success.
    pub failed_recipients: Vec<String>,
}

/// Owns the end-to-end send operation: build the canonical message, mark
/// the operation non-retryable, fan out per-recipient deliveries, then
/// commit the sent record.
///
/// The correctness property everything here serves is asymmetric failure
/// handling around the commitment point.  Before any copy has left the
/// system, errors propagate and the caller may retry.  Once dispatch has
/// begun, the operation is non-retryable, and after dispatch reports that
/// at least one recipient received mail, no internal error may surface as
/// a send failure.  A caller that saw an error would retry and re-deliver
/// to recipients who already have the message.
pub struct DeliveryOrchestrator<B, K, T, S>
where
    B: MessageBuilder,
    K: TrackingBodyBuilder,
    T: Transport,
    S: MessageStorage,
{
    builder: B,
    bodies: K,
    transport: T,
    storage: S,
}

impl<B, K, T, S> DeliveryOrchestrator<B, K, T, S>
where
    B: MessageBuilder,
    K: TrackingBodyBuilder,
    T: Transport,
    S: MessageStorage,
{
    pub fn new(builder: B, bodies: K, transport: T, storage: S) -> DeliveryOrchestrator<B, K, T, S> {
        DeliveryOrchestrator {
            builder,
            bodies,
            transport,
            storage,
        }
    }

    /// Read access to the persisted records, mainly for callers that hand
    /// us an owned storage and want to inspect it afterwards
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Run one send operation to completion.
    ///
    /// Partial failure is a success carrying the failed addresses.  Errs
    /// with `Error::SendFailure` only when no recipient received the
    /// message, and with `Error::Build` when the canonical message could
    /// not be constructed (in which case nothing was sent and `status` was
    /// never touched).
    pub fn execute<U: StatusStore>(
        &mut self,
        payload: &MessagePayload,
        options: &TrackingOptions,
        status: &mut U,
    ) -> Result<SendReport, Error> {
        let mut message = self.builder.build_for_send(payload)?;

        // The commitment point.  Must happen before the first delivery
        // attempt; from here on the outer framework must not re-invoke this
        // operation, whatever happens below.
        status.update(OperationStatus::InProgressNotRetryable);

        let failed_recipients = {
            let mut dispatcher = Dispatcher::new(&self.bodies, &mut self.transport);
            match dispatcher.dispatch(&message, options) {
                Ok(failed) => failed,
                Err(e) => {
                    info!("message {} not delivered: {}", message.message_id, e);
                    return Err(Error::SendFailure);
                }
            }
        };

        // An empty recipient list delivered nothing, so there is no sent
        // record to commit.
        if message.to.is_empty() {
            debug!(
                "message {} has no recipients, skipping commit",
                message.message_id
            );
            return Ok(SendReport {
                message: Some(message),
                failed_recipients,
            });
        }

        // At least one copy is out.  Nothing below may surface as an error.
        message.body = self.bodies.strip_body(&message.body);
        message.is_sent = true;

        if let Err(e) = self.storage.save(&message) {
            error!(
                "message {} was delivered but its record could not be saved: {}",
                message.message_id, e
            );
            return Ok(SendReport {
                message: None,
                failed_recipients: Vec::new(),
            });
        }

        Ok(SendReport {
            message: Some(message),
            failed_recipients,
        })
    }
}
