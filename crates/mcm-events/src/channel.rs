use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use mcm_types::ObjectKind;

use crate::error::{EventError, EventResult};
use crate::event::{ChangeKind, ChangeTag, ModelEvent};

/// Default capacity of each broadcast stream.
pub const DEFAULT_STREAM_CAPACITY: usize = 256;

/// Filter for subscribing to a subset of model events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events about these kinds are delivered.
    pub kinds: Option<Vec<ObjectKind>>,
    /// If set, only these changes are delivered.
    pub changes: Option<Vec<ChangeTag>>,
}

impl EventFilter {
    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &ModelEvent) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(ref changes) = self.changes {
            if !changes.contains(&event.tag()) {
                return false;
            }
        }
        true
    }
}

/// A broadcast receiver for model events.
pub type EventStream = broadcast::Receiver<ModelEvent>;

type Callback = dyn Fn(&ModelEvent) -> anyhow::Result<()> + Send + Sync;

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    name: String,
    callback: Arc<Callback>,
}

struct Stream {
    filter: EventFilter,
    sender: broadcast::Sender<ModelEvent>,
}

/// A synchronous subscriber that returned an error.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub subscriber: String,
    pub error: anyhow::Error,
}

/// What happened when an event was published.
#[derive(Debug)]
pub struct PublishOutcome {
    pub event: ModelEvent,
    /// Synchronous subscribers that completed without error.
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl PublishOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Publish/subscribe channel owned by one manager.
pub struct EventChannel {
    name: String,
    sequence: AtomicU64,
    next_subscription: AtomicU64,
    subscribers: RwLock<Vec<Subscription>>,
    streams: RwLock<Vec<Stream>>,
    capacity: usize,
}

impl EventChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_STREAM_CAPACITY)
    }

    /// Create a channel whose broadcast streams buffer `capacity` events.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            sequence: AtomicU64::new(0),
            next_subscription: AtomicU64::new(0),
            subscribers: RwLock::new(Vec::new()),
            streams: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a synchronous subscriber. Subscribers run in the order they
    /// subscribed.
    pub fn subscribe<F>(&self, name: impl Into<String>, callback: F) -> EventResult<SubscriptionId>
    where
        F: Fn(&ModelEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let name = name.into();
        debug!(channel = %self.name, subscriber = %name, "subscriber added");
        self.subscribers
            .write()
            .map_err(|_| self.poisoned())?
            .push(Subscription {
                id,
                name,
                callback: Arc::new(callback),
            });
        Ok(id)
    }

    /// Remove a synchronous subscriber. Returns `false` if it was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> EventResult<bool> {
        let mut subscribers = self.subscribers.write().map_err(|_| self.poisoned())?;
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        Ok(subscribers.len() != before)
    }

    /// Open a passive stream of the events matching `filter`.
    pub fn stream(&self, filter: EventFilter) -> EventResult<EventStream> {
        let (sender, receiver) = broadcast::channel(self.capacity);
        self.streams
            .write()
            .map_err(|_| self.poisoned())?
            .push(Stream { filter, sender });
        Ok(receiver)
    }

    /// Number of synchronous subscribers.
    pub fn subscriber_count(&self) -> EventResult<usize> {
        Ok(self.subscribers.read().map_err(|_| self.poisoned())?.len())
    }

    /// Names of the synchronous subscribers in call order.
    pub fn subscriber_names(&self) -> EventResult<Vec<String>> {
        Ok(self
            .subscribers
            .read()
            .map_err(|_| self.poisoned())?
            .iter()
            .map(|s| s.name.clone())
            .collect())
    }

    /// Number of open streams.
    pub fn stream_count(&self) -> EventResult<usize> {
        Ok(self.streams.read().map_err(|_| self.poisoned())?.len())
    }

    /// Stamp and deliver a change about `kind`.
    ///
    /// Synchronous subscribers run first, in order, on the calling thread;
    /// the channel's own lists are not locked while they run, so a
    /// subscriber may publish on other channels or subscribe here. A failing
    /// subscriber does not stop delivery to the rest. Streams whose
    /// receivers were all dropped are pruned.
    pub fn publish(&self, kind: ObjectKind, change: ChangeKind) -> EventResult<PublishOutcome> {
        let event = ModelEvent {
            source: self.name.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            kind,
            change,
        };

        let callbacks: Vec<(String, Arc<Callback>)> = self
            .subscribers
            .read()
            .map_err(|_| self.poisoned())?
            .iter()
            .map(|s| (s.name.clone(), Arc::clone(&s.callback)))
            .collect();

        let mut delivered = 0;
        let mut failures = Vec::new();
        for (subscriber, callback) in callbacks {
            match callback(&event) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(
                        channel = %self.name,
                        subscriber = %subscriber,
                        change = %event.tag(),
                        error = %error,
                        "subscriber failed"
                    );
                    failures.push(DeliveryFailure { subscriber, error });
                }
            }
        }

        self.route(&event)?;
        debug!(
            channel = %self.name,
            sequence = event.sequence,
            kind = %event.kind,
            change = %event.tag(),
            delivered,
            "event published"
        );
        Ok(PublishOutcome {
            event,
            delivered,
            failures,
        })
    }

    fn route(&self, event: &ModelEvent) -> EventResult<()> {
        let mut streams = self.streams.write().map_err(|_| self.poisoned())?;
        streams.retain(|stream| {
            if stream.filter.matches(event) {
                stream.sender.send(event.clone()).is_ok()
            } else {
                stream.sender.receiver_count() > 0
            }
        });
        Ok(())
    }

    fn poisoned(&self) -> EventError {
        EventError::Poisoned {
            channel: self.name.clone(),
        }
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
