/// Errors from event channel bookkeeping.
///
/// Subscriber failures are not errors of the channel; they are returned in
/// the [`PublishOutcome`](crate::PublishOutcome) of the publication.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A thread panicked while holding the subscriber list.
    #[error("event channel '{channel}' is poisoned")]
    Poisoned { channel: String },
}

/// Result alias for event channel operations.
pub type EventResult<T> = Result<T, EventError>;
