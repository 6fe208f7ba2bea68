//! Change notifications between model managers.
//!
//! Every manager owns one [`EventChannel`]. After an operation has released
//! the manager's data lock, the manager publishes a [`ModelEvent`] that
//! describes what changed. Two kinds of listeners exist:
//!
//! - synchronous subscribers, called in subscription order on the
//!   publishing thread; dependent managers use these to repair their own
//!   data before the publishing operation returns
//! - passive [`EventStream`]s, `tokio::sync::broadcast` receivers filtered
//!   by an [`EventFilter`], for observers that must never block a publisher

pub mod channel;
pub mod error;
pub mod event;

pub use channel::{
    DeliveryFailure, EventChannel, EventFilter, EventStream, PublishOutcome, SubscriptionId,
};
pub use error::{EventError, EventResult};
pub use event::{ChangeKind, ChangeTag, ModelEvent, Snapshot};
