use crate::builder::MessageBuilder;
use crate::error::Error;
use crate::message::MessagePayload;
use crate::orchestrator::{DeliveryOrchestrator, SendReport};
use crate::status::StatusStore;
use crate::storage::MessageStorage;
use crate::tracking::{TrackingBodyBuilder, TrackingOptions};
use crate::transport::Transport;

/// A unit of work an outer scheduler can describe and drive.
///
/// This is the whole contract the scheduler needs; no task hierarchy
/// beyond it.
pub trait Task {
    fn description(&self) -> String;
    fn run(&mut self) -> Result<SendReport, Error>;
}

/// The send-to-each-recipient operation, packaged as a `Task`
pub struct SendPerRecipient<B, K, T, S, U>
where
    B: MessageBuilder,
    K: TrackingBodyBuilder,
    T: Transport,
    S: MessageStorage,
    U: StatusStore,
{
    orchestrator: DeliveryOrchestrator<B, K, T, S>,
    payload: MessagePayload,
    options: TrackingOptions,
    status: U,
}

impl<B, K, T, S, U> SendPerRecipient<B, K, T, S, U>
where
    B: MessageBuilder,
    K: TrackingBodyBuilder,
    T: Transport,
    S: MessageStorage,
    U: StatusStore,
{
    pub fn new(
        orchestrator: DeliveryOrchestrator<B, K, T, S>,
        payload: MessagePayload,
        options: TrackingOptions,
        status: U,
    ) -> SendPerRecipient<B, K, T, S, U> {
        SendPerRecipient {
            orchestrator,
            payload,
            options,
            status,
        }
    }

    pub fn status(&self) -> &U {
        &self.status
    }
}

impl<B, K, T, S, U> Task for SendPerRecipient<B, K, T, S, U>
where
    B: MessageBuilder,
    K: TrackingBodyBuilder,
    T: Transport,
    S: MessageStorage,
    U: StatusStore,
{
    fn description(&self) -> String {
        format!(
            "sending \"{}\" individually to {} recipients",
            self.payload.subject,
            self.payload.to.len()
        )
    }

    fn run(&mut self) -> Result<SendReport, Error> {
        self.orchestrator
            .execute(&self.payload, &self.options, &mut self.status)
    }
}
