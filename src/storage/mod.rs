pub mod memory_storage;
pub use self::memory_storage::MemoryStorage;

use crate::message::BaseMessage;

pub trait MessageStorageError: ::std::error::Error {}

/// A trait for persisting the canonical sent-message record
pub trait MessageStorage: Send + Sync {
    type Error: MessageStorageError;

    /// Save a `BaseMessage`.  This should overwrite if the message-id
    /// matches an existing record.
    fn save(&mut self, message: &BaseMessage) -> Result<(), Self::Error>;

    /// Retrieve a `BaseMessage` by message-id
    fn retrieve(&self, message_id: &str) -> Result<BaseMessage, Self::Error>;
}
