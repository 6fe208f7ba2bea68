use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mcm_types::{ModelObject, ObjectKind};

// ---------------------------------------------------------------------------
// Warning
// ---------------------------------------------------------------------------

/// A message attached to a report. Critical warnings reject the operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
    pub details: Vec<String>,
    pub critical: bool,
}

impl Warning {
    /// A non-critical warning.
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
            critical: false,
        }
    }

    /// A warning that rejects the operation.
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            critical: true,
            ..Self::notice(message)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// A critical "duplicate of an existing object" warning.
    pub fn duplicate(detail: impl Into<String>) -> Self {
        Self::critical("model object duplicate").with_detail(detail)
    }

    /// A non-critical "parameter unchanged" warning.
    pub fn parameter_identical(detail: impl Into<String>) -> Self {
        Self::notice("model parameter identical").with_detail(detail)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.critical { "critical" } else { "notice" };
        write!(f, "[{level}] {}", self.message)?;
        for detail in &self.details {
            write!(f, "; {detail}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Outcome of validating one candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    is_good: bool,
    warnings: Vec<Warning>,
}

impl ValidationReport {
    /// A good report without warnings.
    pub fn new() -> Self {
        Self {
            is_good: true,
            warnings: Vec::new(),
        }
    }

    /// A report rejected by a critical warning built from `message`.
    pub fn rejected(message: impl Into<String>) -> Self {
        let mut report = Self::new();
        report.add_warning(Warning::critical(message));
        report
    }

    pub fn is_good(&self) -> bool {
        self.is_good
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Attach `warning`. A critical warning makes the report bad.
    pub fn add_warning(&mut self, warning: Warning) {
        if warning.critical {
            self.is_good = false;
        }
        self.warnings.push(warning);
    }

    /// Fold `other` into `self`. The result is good only if both were.
    pub fn merge(&mut self, other: ValidationReport) {
        self.is_good &= other.is_good;
        self.warnings.extend(other.warnings);
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ConflictReport
// ---------------------------------------------------------------------------

/// An object a conflict handler deprecated as a side effect.
///
/// The snapshot is the object as it was after deprecation, kept so the
/// manager can announce the removal to its subscribers.
#[derive(Clone, Serialize)]
pub struct DeprecatedObject {
    pub kind: ObjectKind,
    pub index: i32,
    #[serde(skip)]
    pub snapshot: Option<Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for DeprecatedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeprecatedObject")
            .field("kind", &self.kind)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Outcome of resolving the conflicts caused by one change.
#[derive(Clone, Debug, Serialize)]
pub struct ConflictReport {
    is_good: bool,
    warnings: Vec<Warning>,
    deprecated: Vec<DeprecatedObject>,
}

impl ConflictReport {
    /// A good report without warnings.
    pub fn new() -> Self {
        Self {
            is_good: true,
            warnings: Vec::new(),
            deprecated: Vec::new(),
        }
    }

    pub fn is_good(&self) -> bool {
        self.is_good
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Objects deprecated while resolving, in the order they were recorded.
    pub fn deprecated(&self) -> &[DeprecatedObject] {
        &self.deprecated
    }

    /// Attach `warning`. A critical warning makes the report bad.
    pub fn add_warning(&mut self, warning: Warning) {
        if warning.critical {
            self.is_good = false;
        }
        self.warnings.push(warning);
    }

    /// Record that `object` was deprecated, keeping a snapshot of it.
    pub fn record_deprecation<T: ModelObject + Clone>(&mut self, object: &T) {
        self.deprecated.push(DeprecatedObject {
            kind: T::kind(),
            index: object.index(),
            snapshot: Some(Arc::new(object.clone())),
        });
    }

    /// Fold `other` into `self`. The result is good only if both were.
    pub fn merge(&mut self, other: ConflictReport) {
        self.is_good &= other.is_good;
        self.warnings.extend(other.warnings);
        self.deprecated.extend(other.deprecated);
    }
}

impl Default for ConflictReport {
    fn default() -> Self {
        Self::new()
    }
}
