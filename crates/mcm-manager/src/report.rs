use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use mcm_pipeline::{ConflictReport, ValidationReport};
use mcm_tracker::PropagationReport;

/// Outcome of one manager operation.
///
/// `is_good` is false when the project was busy, when validation rejected
/// the candidate, or when conflict resolution reported a critical warning.
/// Failures of dependent managers are listed but do not make the report bad:
/// the change itself was applied.
#[derive(Clone, Debug, Serialize)]
pub struct OperationReport {
    id: Uuid,
    description: String,
    is_good: bool,
    busy: bool,
    validation: Option<ValidationReport>,
    conflict: Option<ConflictReport>,
    propagation: Vec<PropagationReport>,
    dependency_failures: Vec<String>,
    elapsed: Duration,
    #[serde(skip)]
    started: Instant,
}

impl OperationReport {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            description: description.into(),
            is_good: true,
            busy: false,
            validation: None,
            conflict: None,
            propagation: Vec::new(),
            dependency_failures: Vec::new(),
            elapsed: Duration::ZERO,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_good(&self) -> bool {
        self.is_good
    }

    /// Returns `true` if the operation was not attempted because the
    /// project input lock was held elsewhere.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validation.as_ref()
    }

    pub fn conflict(&self) -> Option<&ConflictReport> {
        self.conflict.as_ref()
    }

    pub fn propagation(&self) -> &[PropagationReport] {
        &self.propagation
    }

    pub fn dependency_failures(&self) -> &[String] {
        &self.dependency_failures
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn mark_busy(&mut self) {
        self.busy = true;
        self.is_good = false;
    }

    pub(crate) fn set_validation(&mut self, report: ValidationReport) {
        self.is_good &= report.is_good();
        self.validation = Some(report);
    }

    pub(crate) fn set_conflict(&mut self, report: ConflictReport) {
        self.is_good &= report.is_good();
        self.conflict = Some(report);
    }

    /// Failures of listeners that handled cascade deprecations count as
    /// dependency failures.
    pub(crate) fn add_propagation(&mut self, reports: Vec<PropagationReport>) {
        for report in &reports {
            self.dependency_failures.extend(report.failures.iter().cloned());
        }
        self.propagation.extend(reports);
    }

    pub(crate) fn add_dependency_failure(&mut self, failure: String) {
        self.dependency_failures.push(failure);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.elapsed = self.started.elapsed();
        self
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.busy {
            "busy"
        } else if self.is_good {
            "good"
        } else {
            "rejected"
        };
        write!(f, "{} [{status}]", self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcm_pipeline::Warning;

    #[test]
    fn fresh_report_is_good() {
        let report = OperationReport::new("input Particle").finish();
        assert!(report.is_good());
        assert!(!report.is_busy());
        assert_eq!(report.to_string(), "input Particle [good]");
        assert_eq!(report.id().get_version_num(), 7);
    }

    #[test]
    fn busy_report_is_not_good() {
        let mut report = OperationReport::new("remove Particle");
        report.mark_busy();
        assert!(!report.is_good());
        assert_eq!(report.to_string(), "remove Particle [busy]");
    }

    #[test]
    fn rejected_validation_makes_report_bad() {
        let mut report = OperationReport::new("input Particle");
        report.set_validation(ValidationReport::rejected("duplicate"));
        let mut conflict = ConflictReport::new();
        conflict.add_warning(Warning::notice("nothing to repair"));
        report.set_conflict(conflict);
        assert!(!report.is_good());
        assert_eq!(report.to_string(), "input Particle [rejected]");
    }

    #[test]
    fn dependency_failures_keep_report_good() {
        let mut report = OperationReport::new("remove Particle");
        report.add_dependency_failure("pairs: repair failed".into());
        assert!(report.is_good());
        assert_eq!(report.dependency_failures().len(), 1);
    }

    #[test]
    fn cascade_failures_are_dependency_failures() {
        let mut report = OperationReport::new("clean Particle");
        report.add_propagation(vec![PropagationReport {
            site: "pairs.PairInteraction".into(),
            deprecated: vec![0],
            failures: vec!["triples: repair failed".into()],
            ..PropagationReport::default()
        }]);
        assert!(report.is_good());
        assert_eq!(report.dependency_failures(), ["triples: repair failed".to_string()]);
        assert_eq!(report.propagation().len(), 1);
    }

    #[test]
    fn json_rendering() {
        let mut report = OperationReport::new("set Temperature");
        report.set_validation(ValidationReport::new());
        let json: serde_json::Value =
            serde_json::from_str(&report.finish().to_json().unwrap()).unwrap();
        assert_eq!(json["description"], "set Temperature");
        assert_eq!(json["is_good"], true);
        assert_eq!(json["validation"]["is_good"], true);
        assert!(json["id"].as_str().is_some());
        assert!(json.get("started").is_none());
    }
}
