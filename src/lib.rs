//! Send one message as a distinct, individually-tracked copy per recipient.
//!
//! The dispatcher attempts every recipient even when some fail; only a
//! total failure is an error.  Once any copy has left the system the
//! operation is committed: the canonical record is sanitized, marked sent
//! and persisted, and a failure in that commit is logged and swallowed
//! rather than surfaced, so a caller never retries a send that already
//! delivered mail.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

#[cfg(test)]
mod tests;

mod builder;
pub mod config;
mod dispatcher;
pub mod error;
mod message;
mod orchestrator;
mod status;
pub mod storage;
mod task;
mod tracking;
pub mod transport;

pub use crate::builder::{MessageBuilder, PayloadMessageBuilder};
pub use crate::config::Config;
pub use crate::dispatcher::Dispatcher;
pub use crate::error::Error;
pub use crate::message::{BaseMessage, MessagePayload, OutboundMessage, Recipient};
pub use crate::orchestrator::{DeliveryOrchestrator, SendReport};
pub use crate::status::{OperationStatus, StatusStore};
pub use crate::task::{SendPerRecipient, Task};
pub use crate::tracking::{TrackedBodyBuilder, TrackingBodyBuilder, TrackingOptions};
