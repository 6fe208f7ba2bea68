//! Scoped data accessors built on an [`AccessLockSource`].

use std::fmt;
use std::sync::Arc;

use crate::config::LockConfig;
use crate::error::{AccessError, AccessResult};
use crate::lock::{AccessLockSource, ReadLock, WriteLock};

/// Factory of scoped accessors to one manager's data object.
///
/// Cloning the source is cheap and shares the underlying lock.
pub struct DataAccessorSource<D> {
    lock: Arc<AccessLockSource<D>>,
}

/// Exclusive, lock-backed handle to the data. The write lock is released
/// exactly once, when the accessor drops.
pub struct DataAccessor<'a, D> {
    lock: WriteLock<'a, D>,
}

/// Shared, lock-backed read-only handle to the data.
pub struct DataReader<'a, D> {
    lock: ReadLock<'a, D>,
}

impl<D> DataAccessorSource<D> {
    /// Guard `data` with a new lock source.
    pub fn new(name: impl Into<String>, data: D, config: LockConfig) -> AccessResult<Self> {
        Ok(Self {
            lock: Arc::new(AccessLockSource::new(name, data, config)?),
        })
    }

    /// Build a source on an existing lock.
    pub fn from_lock(lock: Arc<AccessLockSource<D>>) -> Self {
        Self { lock }
    }

    pub fn lock_source(&self) -> &Arc<AccessLockSource<D>> {
        &self.lock
    }

    pub fn name(&self) -> &str {
        self.lock.name()
    }

    /// Blocking exclusive accessor; fails with `LockTimeout` when the retry
    /// budget is exhausted.
    pub fn create(&self) -> AccessResult<DataAccessor<'_, D>> {
        Ok(DataAccessor {
            lock: self.lock.acquire_write()?,
        })
    }

    /// Single-attempt exclusive accessor; fails with `Busy` instead of
    /// waiting.
    pub fn create_unsafe(&self) -> AccessResult<DataAccessor<'_, D>> {
        Ok(DataAccessor {
            lock: self.lock.try_acquire_write()?,
        })
    }

    /// Blocking shared accessor.
    pub fn create_reader(&self) -> AccessResult<DataReader<'_, D>> {
        Ok(DataReader {
            lock: self.lock.acquire_read()?,
        })
    }

    /// Single-attempt shared accessor for advisory reads.
    pub fn create_reader_unsafe(&self) -> AccessResult<DataReader<'_, D>> {
        Ok(DataReader {
            lock: self.lock.try_acquire_read()?,
        })
    }
}

impl<D: Send + Sync + 'static> DataAccessorSource<D> {
    /// Run a read-only projection on a blocking worker thread.
    ///
    /// This is a thin wrapper: the worker still acquires the same read lock
    /// with the same retry budget.
    pub async fn query_async<R, F>(&self, function: F) -> AccessResult<R>
    where
        F: FnOnce(&D) -> R + Send + 'static,
        R: Send + 'static,
    {
        let source = self.clone();
        tokio::task::spawn_blocking(move || {
            let reader = source.create_reader()?;
            let result = reader.query(function);
            Ok(result)
        })
        .await
        .map_err(|e| AccessError::TaskFailed(e.to_string()))?
    }
}

impl<D> Clone for DataAccessorSource<D> {
    fn clone(&self) -> Self {
        Self {
            lock: Arc::clone(&self.lock),
        }
    }
}

impl<D> fmt::Debug for DataAccessorSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAccessorSource")
            .field("lock", &self.lock)
            .finish()
    }
}

impl<D> fmt::Debug for DataAccessor<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAccessor")
            .field("lock", &self.lock)
            .finish()
    }
}

impl<D> fmt::Debug for DataReader<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReader")
            .field("lock", &self.lock)
            .finish()
    }
}

impl<D> DataAccessor<'_, D> {
    /// Read-only projection of the data.
    pub fn query<R>(&self, function: impl FnOnce(&D) -> R) -> R {
        function(&self.lock)
    }

    /// Mutating operation on the data.
    pub fn query_mut<R>(&mut self, function: impl FnOnce(&mut D) -> R) -> R {
        function(&mut self.lock)
    }

    pub fn data(&self) -> &D {
        &self.lock
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.lock
    }
}

impl<D> DataReader<'_, D> {
    /// Read-only projection of the data.
    pub fn query<R>(&self, function: impl FnOnce(&D) -> R) -> R {
        function(&self.lock)
    }

    pub fn data(&self) -> &D {
        &self.lock
    }
}
