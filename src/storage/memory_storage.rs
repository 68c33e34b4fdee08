use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use crate::message::BaseMessage;
use crate::storage::{MessageStorage, MessageStorageError};

#[derive(Debug)]
pub enum MemoryStorageError {
    NotFound,
}

impl fmt::Display for MemoryStorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemoryStorageError::NotFound => write!(f, "Memory Storage Error: message not found"),
        }
    }
}

impl Error for MemoryStorageError {}

impl MessageStorageError for MemoryStorageError {}

#[derive(Default)]
pub struct MemoryStorage(HashMap<String, BaseMessage>);

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage(HashMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl MessageStorage for MemoryStorage {
    type Error = MemoryStorageError;

    fn save(&mut self, message: &BaseMessage) -> Result<(), MemoryStorageError> {
        self.0.insert(message.message_id.clone(), message.clone());
        Ok(())
    }

    fn retrieve(&self, message_id: &str) -> Result<BaseMessage, MemoryStorageError> {
        match self.0.get(message_id) {
            None => Err(MemoryStorageError::NotFound),
            Some(message) => Ok(message.clone()),
        }
    }
}
