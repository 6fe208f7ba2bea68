//! On-demand computed data that expires when the model changes.
//!
//! A [`ModelCache`] groups [`CachedValue`]s derived from manager data, such
//! as lookup tables or counts that are expensive to rebuild. Values are
//! computed on first request and kept until an event on a watched channel
//! expires the whole cache. Expiry is a generation counter: it never takes a
//! lock, so publishers are never blocked by a value being recomputed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use mcm_events::{EventChannel, EventFilter, SubscriptionId};

use crate::data::ModelData;
use crate::error::{ManagerError, ManagerResult};
use crate::manager::ModelManager;

type Factory<V> = dyn Fn() -> ManagerResult<V> + Send + Sync;

/// Type-erased view of a cached value, used for bulk clearing.
trait CacheEntry: Send + Sync {
    fn clear(&self);
    fn clear_if_expired(&self);
}

/// One lazily computed value of a [`ModelCache`].
pub struct CachedValue<V> {
    cache: String,
    name: String,
    generation: Arc<AtomicU64>,
    factory: Box<Factory<V>>,
    /// The value and the generation it was computed in.
    slot: Mutex<Option<(u64, V)>>,
}

impl<V: Clone + Send + 'static> CachedValue<V> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cached value, recomputed first if the cache expired since it was
    /// computed.
    ///
    /// Concurrent callers wait for one recomputation instead of running the
    /// factory each.
    pub fn get(&self) -> ManagerResult<V> {
        let mut slot = self.slot.lock().map_err(|_| self.poisoned())?;
        let current = self.generation.load(Ordering::Acquire);
        if let Some((generation, value)) = slot.as_ref() {
            if *generation == current {
                return Ok(value.clone());
            }
        }

        let value = (self.factory)()?;
        debug!(cache = %self.cache, entry = %self.name, generation = current, "cached value computed");
        *slot = Some((current, value.clone()));
        Ok(value)
    }

    /// Returns `true` if the next [`get`](Self::get) recomputes.
    pub fn is_expired(&self) -> bool {
        let current = self.generation.load(Ordering::Acquire);
        self.slot
            .lock()
            .map(|slot| slot.as_ref().map_or(true, |(generation, _)| *generation != current))
            .unwrap_or(true)
    }

    fn poisoned(&self) -> ManagerError {
        ManagerError::CachePoisoned {
            cache: self.cache.clone(),
            entry: self.name.clone(),
        }
    }
}

impl<V: Clone + Send + 'static> CacheEntry for CachedValue<V> {
    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    fn clear_if_expired(&self) {
        let current = self.generation.load(Ordering::Acquire);
        if let Ok(mut slot) = self.slot.lock() {
            if slot.as_ref().is_some_and(|(generation, _)| *generation != current) {
                *slot = None;
            }
        }
    }
}

impl<V> fmt::Debug for CachedValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedValue")
            .field("cache", &self.cache)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A group of cached values that expire together.
pub struct ModelCache {
    name: String,
    generation: Arc<AtomicU64>,
    entries: RwLock<Vec<Arc<dyn CacheEntry>>>,
}

impl ModelCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generation: Arc::new(AtomicU64::new(0)),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Incremented on every expiry.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Register a value computed by `factory` on demand.
    pub fn entry<V, F>(&self, name: impl Into<String>, factory: F) -> ManagerResult<Arc<CachedValue<V>>>
    where
        V: Clone + Send + 'static,
        F: Fn() -> ManagerResult<V> + Send + Sync + 'static,
    {
        let value = Arc::new(CachedValue {
            cache: self.name.clone(),
            name: name.into(),
            generation: Arc::clone(&self.generation),
            factory: Box::new(factory),
            slot: Mutex::new(None),
        });
        self.entries
            .write()
            .map_err(|_| self.poisoned())?
            .push(Arc::clone(&value) as Arc<dyn CacheEntry>);
        Ok(value)
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark every value as outdated. Values are recomputed on their next
    /// request.
    pub fn expire(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(cache = %self.name, generation, "cache expired");
    }

    /// Drop every value, expired or not.
    pub fn clear_all(&self) -> ManagerResult<()> {
        for entry in self.entries.read().map_err(|_| self.poisoned())?.iter() {
            entry.clear();
        }
        Ok(())
    }

    /// Drop the values that would be recomputed anyway.
    pub fn clear_expired(&self) -> ManagerResult<()> {
        for entry in self.entries.read().map_err(|_| self.poisoned())?.iter() {
            entry.clear_if_expired();
        }
        Ok(())
    }

    /// Expire the cache whenever `channel` publishes an event matching
    /// `filter`. Unsubscribe the returned id from the channel to stop.
    pub fn watch(&self, channel: &EventChannel, filter: EventFilter) -> ManagerResult<SubscriptionId> {
        let generation = Arc::clone(&self.generation);
        let name = self.name.clone();
        let id = channel.subscribe(self.name.clone(), move |event| {
            if filter.matches(event) {
                let generation = generation.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(cache = %name, change = %event.tag(), generation, "cache expired");
            }
            Ok(())
        })?;
        debug!(cache = %self.name, channel = channel.name(), "cache watching channel");
        Ok(id)
    }

    /// Expire the cache on every change `manager` publishes.
    pub fn watch_manager<D: ModelData>(&self, manager: &ModelManager<D>) -> ManagerResult<SubscriptionId> {
        self.watch(manager.events(), EventFilter::default())
    }

    fn poisoned(&self) -> ManagerError {
        ManagerError::CachePoisoned {
            cache: self.name.clone(),
            entry: String::new(),
        }
    }
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("name", &self.name)
            .field("generation", &self.generation())
            .field("entries", &self.len())
            .finish()
    }
}
