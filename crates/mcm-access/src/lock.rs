use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::{AccessError, AccessMode, AccessResult};

/// Bounded-retry reader/writer lock guarding one shared data object.
///
/// Acquisition never blocks inside the OS lock: each attempt is a `try_*`
/// call, and the calling thread sleeps `attempt_interval` between attempts.
pub struct AccessLockSource<D> {
    name: String,
    config: LockConfig,
    data: RwLock<D>,
}

/// Shared access to the guarded data. Released on drop.
pub struct ReadLock<'a, D> {
    guard: RwLockReadGuard<'a, D>,
}

/// Exclusive access to the guarded data. Released on drop.
pub struct WriteLock<'a, D> {
    guard: RwLockWriteGuard<'a, D>,
}

impl<D> AccessLockSource<D> {
    /// Guard `data` under the given retry budget.
    pub fn new(name: impl Into<String>, data: D, config: LockConfig) -> AccessResult<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            data: RwLock::new(data),
        })
    }

    /// Diagnostic name used in errors and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire shared access, retrying per configuration.
    pub fn acquire_read(&self) -> AccessResult<ReadLock<'_, D>> {
        self.acquire(AccessMode::Read, || self.try_read_once())
    }

    /// Acquire exclusive access, retrying per configuration.
    pub fn acquire_write(&self) -> AccessResult<WriteLock<'_, D>> {
        self.acquire(AccessMode::Write, || self.try_write_once())
    }

    /// Attempt shared access once; [`AccessError::Busy`] if a writer holds
    /// the lock.
    pub fn try_acquire_read(&self) -> AccessResult<ReadLock<'_, D>> {
        self.try_read_once()?.ok_or_else(|| self.busy(AccessMode::Read))
    }

    /// Attempt exclusive access once; [`AccessError::Busy`] if any reader or
    /// writer holds the lock.
    pub fn try_acquire_write(&self) -> AccessResult<WriteLock<'_, D>> {
        self.try_write_once()?.ok_or_else(|| self.busy(AccessMode::Write))
    }

    /// Returns `true` if an exclusive lock could not be taken right now.
    pub fn is_locked(&self) -> bool {
        !matches!(self.data.try_write(), Ok(_))
    }

    /// Consume the source and return the data.
    pub fn into_inner(self) -> AccessResult<D> {
        let name = self.name;
        self.data
            .into_inner()
            .map_err(|_| AccessError::Poisoned { source_name: name })
    }

    fn acquire<G>(
        &self,
        mode: AccessMode,
        mut attempt: impl FnMut() -> AccessResult<Option<G>>,
    ) -> AccessResult<G> {
        let started = Instant::now();
        if let Some(guard) = attempt()? {
            return Ok(guard);
        }
        for retry in 1..=self.config.max_attempts {
            thread::sleep(self.config.attempt_interval);
            if let Some(guard) = attempt()? {
                debug!(source = %self.name, %mode, retry, "lock acquired after retry");
                return Ok(guard);
            }
        }
        let waited = started.elapsed();
        warn!(source = %self.name, %mode, ?waited, "lock acquisition timed out");
        Err(AccessError::LockTimeout {
            source_name: self.name.clone(),
            mode,
            retries: self.config.max_attempts,
            waited,
        })
    }

    fn try_read_once(&self) -> AccessResult<Option<ReadLock<'_, D>>> {
        match self.data.try_read() {
            Ok(guard) => Ok(Some(ReadLock { guard })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Poisoned(_)) => Err(self.poisoned()),
        }
    }

    fn try_write_once(&self) -> AccessResult<Option<WriteLock<'_, D>>> {
        match self.data.try_write() {
            Ok(guard) => Ok(Some(WriteLock { guard })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Poisoned(_)) => Err(self.poisoned()),
        }
    }

    fn busy(&self, mode: AccessMode) -> AccessError {
        AccessError::Busy {
            source_name: self.name.clone(),
            mode,
        }
    }

    fn poisoned(&self) -> AccessError {
        AccessError::Poisoned {
            source_name: self.name.clone(),
        }
    }
}

impl<D> fmt::Debug for AccessLockSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLockSource")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

impl<D> fmt::Debug for ReadLock<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadLock").finish_non_exhaustive()
    }
}

impl<D> fmt::Debug for WriteLock<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteLock").finish_non_exhaustive()
    }
}

impl<D> ReadLock<'_, D> {
    /// Release the lock now. Dropping the guard does the same.
    pub fn release(self) {}
}

impl<D> Deref for ReadLock<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.guard
    }
}

impl<D> WriteLock<'_, D> {
    /// Release the lock now. Dropping the guard does the same.
    pub fn release(self) {}
}

impl<D> Deref for WriteLock<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.guard
    }
}

impl<D> DerefMut for WriteLock<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.guard
    }
}
