//! Cross-checks over the pipeline's combined outputs.
//!
//! Validation is a pure function of the other components' outputs: it
//! holds no state and never mutates what it inspects. Errors mark
//! results that violate structural invariants; warnings mark data that
//! is suspicious but usable.

use crate::correlate::ItemCorrelation;
use crate::models::{Coordinate, RegionTable, VisitTimeline};
use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Timestamps outside this year range are flagged as suspicious.
pub const MIN_VALID_YEAR: i32 = 1990;
pub const MAX_VALID_YEAR: i32 = 2030;

/// How many offending examples to keep per issue.
const MAX_EXAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One class of problem found during validation, with capped examples.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub check: String,
    pub message: String,
    pub count: usize,
    pub examples: Vec<String>,
}

/// Aggregate validation outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| i.count)
            .sum()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .map(|i| i.count)
            .sum()
    }

    /// Valid means no errors; warnings alone do not fail a run.
    pub fn valid(&self) -> bool {
        self.issues.iter().all(|i| i.severity != Severity::Error)
    }
}

/// One issue under construction: counts every offender, keeps only the
/// first few as examples.
struct IssueBuilder {
    severity: Severity,
    check: &'static str,
    message: String,
    count: usize,
    examples: Vec<String>,
}

impl IssueBuilder {
    fn new(severity: Severity, check: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            check,
            message: message.into(),
            count: 0,
            examples: Vec::new(),
        }
    }

    fn record(&mut self, example: String) {
        self.count += 1;
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(example);
        }
    }

    fn finish(self, report: &mut ValidationReport) {
        if self.count > 0 {
            report.issues.push(ValidationIssue {
                severity: self.severity,
                check: self.check.to_string(),
                message: self.message,
                count: self.count,
                examples: self.examples,
            });
        }
    }
}

/// Run every check against the combined outputs.
pub fn validate(
    regions: &RegionTable,
    known_place_ids: &HashSet<String>,
    correlations: &BTreeMap<String, ItemCorrelation>,
    timelines: &BTreeMap<String, VisitTimeline>,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_region_centers(regions, &mut report);
    check_region_members(regions, known_place_ids, &mut report);
    check_correlation_references(regions, correlations, &mut report);
    check_timeline_references(regions, timelines, &mut report);
    check_timestamp_sanity(timelines, &mut report);
    check_count_consistency(timelines, &mut report);

    if !report.valid() {
        tracing::warn!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            "validation found errors"
        );
    }
    report
}

/// Every region center must be a coordinate the rest of the system
/// would accept.
fn check_region_centers(regions: &RegionTable, report: &mut ValidationReport) {
    let mut issue = IssueBuilder::new(
        Severity::Error,
        "region_center_range",
        "region center outside valid coordinate range",
    );
    for region in regions.iter() {
        if Coordinate::new(region.center.latitude, region.center.longitude).is_err() {
            issue.record(format!(
                "{} ({}, {})",
                region.name, region.center.latitude, region.center.longitude
            ));
        }
    }
    issue.finish(report);
}

/// Region membership must reference known place records.
fn check_region_members(
    regions: &RegionTable,
    known_place_ids: &HashSet<String>,
    report: &mut ValidationReport,
) {
    let mut issue = IssueBuilder::new(
        Severity::Error,
        "region_member_integrity",
        "region member id does not match any input record",
    );
    for region in regions.iter() {
        for member in &region.members {
            if !known_place_ids.contains(member) {
                issue.record(format!("{} -> {}", region.name, member));
            }
        }
    }
    issue.finish(report);
}

/// Correlation region links must point at regions that exist.
fn check_correlation_references(
    regions: &RegionTable,
    correlations: &BTreeMap<String, ItemCorrelation>,
    report: &mut ValidationReport,
) {
    let mut issue = IssueBuilder::new(
        Severity::Error,
        "correlation_region_integrity",
        "correlation references an unknown region",
    );
    for correlation in correlations.values() {
        if let Some(m) = &correlation.region {
            if !regions.contains(&m.region) {
                issue.record(format!("{} -> {}", correlation.source_id, m.region));
            }
        }
    }
    issue.finish(report);
}

/// Timeline region keys must point at regions that exist.
fn check_timeline_references(
    regions: &RegionTable,
    timelines: &BTreeMap<String, VisitTimeline>,
    report: &mut ValidationReport,
) {
    let mut issue = IssueBuilder::new(
        Severity::Error,
        "timeline_region_integrity",
        "timeline references an unknown region",
    );
    for name in timelines.keys() {
        if !regions.contains(name) {
            issue.record(name.clone());
        }
    }
    issue.finish(report);
}

/// Visit timestamps outside the plausible year range are warnings; the
/// data is kept, just flagged.
fn check_timestamp_sanity(
    timelines: &BTreeMap<String, VisitTimeline>,
    report: &mut ValidationReport,
) {
    let mut issue = IssueBuilder::new(
        Severity::Warning,
        "timestamp_sanity",
        format!("visit timestamp outside {}..={}", MIN_VALID_YEAR, MAX_VALID_YEAR),
    );
    for timeline in timelines.values() {
        for visit in &timeline.visits {
            let year = visit.timestamp.year();
            if !(MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year) {
                issue.record(format!(
                    "{} {} ({})",
                    timeline.region, visit.source_id, visit.timestamp
                ));
            }
        }
    }
    issue.finish(report);
}

/// Derived counts must agree with the lists they summarize.
fn check_count_consistency(
    timelines: &BTreeMap<String, VisitTimeline>,
    report: &mut ValidationReport,
) {
    let mut issue = IssueBuilder::new(
        Severity::Error,
        "visit_count_consistency",
        "visit_count does not match the visit list length",
    );
    for timeline in timelines.values() {
        if timeline.visit_count != timeline.visits.len() {
            issue.record(format!(
                "{}: count={} list={}",
                timeline.region,
                timeline.visit_count,
                timeline.visits.len()
            ));
        }
    }
    issue.finish(report);
}
