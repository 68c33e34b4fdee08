/// The state of one send operation.
///
/// `InProgressNotRetryable` is the commitment point: it is set exactly once,
/// strictly before the first delivery attempt, and once set the operation
/// must never be handed back to an outer retry framework.  Re-running a send
/// whose copies may already have left the system would deliver duplicate
/// mail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Initial state, set by the caller before the orchestrator runs
    Pending,

    /// Dispatch has begun (or is about to); external retry is forbidden
    InProgressNotRetryable,
}

impl OperationStatus {
    pub fn is_retryable(&self) -> bool {
        match *self {
            OperationStatus::Pending => true,
            OperationStatus::InProgressNotRetryable => false,
        }
    }
}

/// Narrow interface through which the orchestrator records status
/// transitions.  Updates are infallible; persistence of the status (if any)
/// is the caller's concern and must not be able to fail between message
/// build and dispatch.
pub trait StatusStore {
    fn update(&mut self, status: OperationStatus);
}

/// The simplest store: hold the status as a plain value.
impl StatusStore for OperationStatus {
    fn update(&mut self, status: OperationStatus) {
        *self = status;
    }
}
