//! Structural validation of a resolved package.
//!
//! Unlike construction and resolution, validation never stops early: every
//! rule runs over the whole graph and findings accumulate in a
//! [`ValidationReport`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{DataObject, Reference};
use crate::metadata::{MetadataBody, MetadataIdPattern};
use crate::resolve::ResolvedGraph;

/// Minimum number of metadata objects in a metadata section.
pub const MIN_METADATA_OBJECTS: usize = 2;

/// Checksum algorithms accepted when nothing else is configured.
pub const DEFAULT_CHECKSUM_ALGORITHMS: &[&str] = &["MD5", "CRC32"];

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// The rule a finding comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    MetadataCardinality,
    MetadataIdPattern,
    ChecksumAlgorithm,
    OtherLocatorType,
    CombinationMethod,
    DeclaredSize,
    RepresentationConsistency,
    UnreferencedDataObject,
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub rule: Rule,
    /// Identifier (or href) of the offending entity.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level} [{:?}] {}: {}", self.rule, self.subject, self.message)
    }
}

/// Accumulated findings; empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there is no error. Warnings do not invalidate a package.
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.severity == Severity::Warning)
    }

    /// Findings of one rule.
    pub fn by_rule(&self, rule: Rule) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.rule == rule)
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn error(&mut self, rule: Rule, subject: impl Into<String>, message: impl Into<String>) {
        self.push(Violation {
            severity: Severity::Error,
            rule,
            subject: subject.into(),
            message: message.into(),
        });
    }

    pub fn warning(&mut self, rule: Rule, subject: impl Into<String>, message: impl Into<String>) {
        self.push(Violation {
            severity: Severity::Warning,
            rule,
            subject: subject.into(),
            message: message.into(),
        });
    }
}

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Accepted `checksumName` values (case-sensitive).
    pub checksum_algorithms: BTreeSet<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            checksum_algorithms: DEFAULT_CHECKSUM_ALGORITHMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ValidatorConfig {
    /// Accept additional checksum algorithms, e.g. every name a codec
    /// registry knows.
    pub fn with_checksum_algorithms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.checksum_algorithms.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Sum of the declared stream sizes: `None` if any stream omits its size,
/// `Some(None)` if the sum does not fit in a `u64`.
fn declared_stream_total(object: &DataObject) -> Option<Option<u64>> {
    let sizes = object
        .byte_streams
        .iter()
        .map(|s| s.size)
        .collect::<Option<Vec<u64>>>()?;
    Some(sizes.into_iter().try_fold(0u64, u64::checked_add))
}

/// Run every structural rule over a resolved package.
pub fn validate(graph: &ResolvedGraph, config: &ValidatorConfig) -> ValidationReport {
    let mut report = ValidationReport::new();
    let package = graph.package();

    // 1. Metadata section cardinality
    if let Some(section) = &package.metadata_section {
        if section.len() < MIN_METADATA_OBJECTS {
            report.error(
                Rule::MetadataCardinality,
                "metadataSection",
                format!(
                    "metadata section holds {} metadata object(s), at least {MIN_METADATA_OBJECTS} required",
                    section.len()
                ),
            );
        }
    }

    // 2. Metadata identifiers and reference locators
    for m in graph.metadata_objects() {
        let object = graph.metadata(m);
        if MetadataIdPattern::classify(object.id.as_str()).is_none() {
            report.error(
                Rule::MetadataIdPattern,
                object.id.as_str(),
                "identifier matches none of the metadata naming patterns",
            );
        }
        if let MetadataBody::Reference(r) = &object.body {
            check_locator(&mut report, &r.reference, object.id.as_str());
        }
    }

    // 3. Data objects and their streams
    for d in graph.data_objects() {
        let object = graph.data_object(d);
        let subject = object.id.as_str();

        for stream in &object.byte_streams {
            if !config.checksum_algorithms.contains(&stream.checksum.algorithm) {
                report.error(
                    Rule::ChecksumAlgorithm,
                    stream.label(),
                    format!(
                        "checksum algorithm '{}' is not supported",
                        stream.checksum.algorithm
                    ),
                );
            }
            check_locator(&mut report, &stream.file_location, &stream.label());
        }

        if object.byte_streams.len() > 1 && object.combination.is_none() {
            report.error(
                Rule::CombinationMethod,
                subject,
                format!(
                    "{} byte streams but no combination method",
                    object.byte_streams.len()
                ),
            );
        }

        if let Some(total) = object.size {
            match declared_stream_total(object) {
                Some(Some(parts)) if parts != total => report.warning(
                    Rule::DeclaredSize,
                    subject,
                    format!("declared size {total} differs from the sum of stream sizes {parts}"),
                ),
                Some(None) => report.warning(
                    Rule::DeclaredSize,
                    subject,
                    "declared stream sizes overflow a 64-bit total",
                ),
                _ => {}
            }
        }

        if !graph.data_object_links(d).is_referenced() {
            report.error(
                Rule::UnreferencedDataObject,
                subject,
                "not referenced by any content unit, metadata object or behavior",
            );
        }
    }

    // 4. Content units agree with the data objects they point at
    for u in graph.units() {
        let unit = graph.unit(u);
        let Some(d) = graph.unit_links(u).data_object else {
            continue;
        };
        let object = graph.data_object(d);
        let (Some(unit_rep), Some(object_rep)) =
            (unit.rep_ids.first(), object.primary_representation())
        else {
            continue;
        };
        if unit_rep != object_rep {
            report.error(
                Rule::RepresentationConsistency,
                unit.label(),
                format!(
                    "representation '{unit_rep}' differs from '{object_rep}' declared by data object '{}'",
                    object.id
                ),
            );
        }
    }

    // 5. Behavior references
    for b in graph.behaviors() {
        let behavior = graph.behavior(b);
        for reference in behavior.references() {
            check_locator(&mut report, reference, behavior.id.as_str());
        }
    }

    report
}

fn check_locator(report: &mut ValidationReport, reference: &Reference, subject: &str) {
    if !reference.has_scheme() {
        report.error(
            Rule::OtherLocatorType,
            subject,
            format!(
                "reference '{}' uses locatorType OTHER without otherLocatorType",
                reference.href
            ),
        );
    }
}
