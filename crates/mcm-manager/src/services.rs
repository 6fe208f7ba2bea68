//! Services shared by every manager of one project.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use mcm_access::{AccessLockSource, WriteLock};
use mcm_tracker::ObjectTracker;

use crate::error::ManagerResult;
use crate::settings::ProjectSettings;

/// Project-wide state: settings, the object tracker, and the input lock
/// that serializes all input operations.
pub struct ProjectServices {
    settings: ProjectSettings,
    tracker: Arc<ObjectTracker>,
    input_lock: AccessLockSource<()>,
}

impl ProjectServices {
    pub fn new(settings: ProjectSettings) -> ManagerResult<Arc<Self>> {
        settings.validate()?;
        let input_lock = AccessLockSource::new("project input", (), settings.input.clone())?;
        debug!(
            input_wait = ?settings.input.max_wait(),
            data_wait = ?settings.concurrency.max_wait(),
            "project services created"
        );
        Ok(Arc::new(Self {
            settings,
            tracker: Arc::new(ObjectTracker::new()),
            input_lock,
        }))
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        &self.tracker
    }

    /// Take the project input lock with the `[input]` retry budget.
    ///
    /// Fails with a busy access error when another input operation keeps
    /// the lock past the budget.
    pub fn acquire_input(&self) -> ManagerResult<WriteLock<'_, ()>> {
        Ok(self.input_lock.acquire_write()?)
    }

    /// Returns `true` while an input operation is running.
    pub fn is_input_locked(&self) -> bool {
        self.input_lock.is_locked()
    }
}

impl fmt::Debug for ProjectServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectServices")
            .field("settings", &self.settings)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
