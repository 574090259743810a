//! Package consistency check.
//!
//! Unlike materialization this never stops at the first problem: every
//! stream is checked for existence, size and checksum, and every stored
//! entry the manifest does not mention is reported. Payloads whose MIME type
//! has a registered validator are checked against their representation
//! schema.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use xfdu_codec::CodecRegistry;
use xfdu_core::{
    ByteStream, LocatorType, MetadataBody, MetadataIndex, Reference, ResolvedGraph, Rule,
    Severity, ValidationReport,
};
use xfdu_store::{normalize_href, ByteSource, StoreError};

use crate::error::Result;

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Check {
    /// A structural validation rule.
    Structure(Rule),
    /// A referenced entry is missing.
    Existence,
    /// Stored length differs from the declared size.
    Size,
    /// Stored bytes do not match the declared checksum.
    Checksum,
    /// The entry exists but could not be read.
    Read,
    /// A stored entry nothing in the manifest refers to.
    UnreferencedEntry,
    /// A payload does not conform to its representation schema.
    Payload,
}

/// One verification finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub check: Check,
    /// Identifier or href the finding is about.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level} [{:?}] {}: {}", self.check, self.subject, self.message)
    }
}

/// Overall outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Clean,
    Warnings,
    Errors,
}

/// Every finding of one verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    findings: Vec<Finding>,
}

impl VerificationReport {
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    pub fn by_check(&self, check: Check) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.check == check)
    }

    /// `Errors` if any finding is an error, `Warnings` if any is a warning.
    pub fn verdict(&self) -> Verdict {
        match self.findings.iter().map(|f| f.severity).max() {
            Some(Severity::Error) => Verdict::Errors,
            Some(Severity::Warning) => Verdict::Warnings,
            None => Verdict::Clean,
        }
    }

    fn push(&mut self, severity: Severity, check: Check, subject: &str, message: String) {
        let finding = Finding {
            severity,
            check,
            subject: subject.to_string(),
            message,
        };
        warn!(%finding, "verification finding");
        self.findings.push(finding);
    }
}

pub(crate) async fn verify<S: ByteSource + ?Sized>(
    graph: &ResolvedGraph,
    validation: &ValidationReport,
    source: &S,
    registry: &CodecRegistry,
    manifest_entry: Option<&str>,
) -> Result<VerificationReport> {
    let mut report = VerificationReport::default();
    let mut referenced = BTreeSet::new();

    // 1. Structural findings
    report.findings.extend(validation.violations().iter().map(|v| Finding {
        severity: v.severity,
        check: Check::Structure(v.rule),
        subject: v.subject.clone(),
        message: v.message.clone(),
    }));

    // 2. Metadata references that point into the package. A missing
    //    primary representation schema of a data object is an error.
    let representations: BTreeSet<MetadataIndex> = graph
        .data_objects()
        .filter_map(|d| graph.data_object_links(d).representation.first().copied())
        .collect();
    let mut schemas: BTreeMap<MetadataIndex, Bytes> = BTreeMap::new();
    for m in graph.metadata_objects() {
        let object = graph.metadata(m);
        let MetadataBody::Reference(r) = &object.body else {
            continue;
        };
        let Some(path) = package_path(&r.reference) else {
            continue;
        };
        referenced.insert(path);

        let is_representation = representations.contains(&m);
        let severity = if is_representation {
            Severity::Error
        } else {
            Severity::Warning
        };
        let href = r.reference.href.as_str();
        let stored = if is_representation {
            source.fetch(&r.reference).await.map(Some)
        } else {
            source.exists(&r.reference).await.map(|found| found.then(Bytes::new))
        };
        match stored {
            Ok(Some(bytes)) => {
                if is_representation {
                    schemas.insert(m, bytes);
                }
            }
            Ok(None) | Err(StoreError::NotFound { .. }) => report.push(
                severity,
                Check::Existence,
                href,
                format!("referenced by metadata object '{}' but not stored", object.id),
            ),
            Err(e) => report.push(severity, Check::Read, href, e.to_string()),
        }
    }

    // 3. Byte streams, and payloads against their representation schema
    for d in graph.data_objects() {
        let object = graph.data_object(d);
        let schema = graph
            .data_object_links(d)
            .representation
            .first()
            .and_then(|m| schemas.get(m));
        // Only a lone, untransformed stream holds the payload as stored.
        let plain = object.byte_streams.len() == 1 && object.transforms.is_empty();

        for stream in &object.byte_streams {
            if let Some(path) = package_path(&stream.file_location) {
                referenced.insert(path);
            }
            let checked = check_stream(&mut report, source, registry, object.id.as_str(), stream);
            let Some(bytes) = checked.await else {
                continue;
            };
            let validator = registry.payload_validator(&stream.mime_type);
            let (Some(schema), Some(validator)) = (schema, validator) else {
                continue;
            };
            if !plain || !stream.transforms.is_empty() {
                debug!(stream = %stream.label(), "transformed payload, schema check skipped");
                continue;
            }
            if let Err(e) = validator.validate(&bytes, schema) {
                let href = &stream.file_location.href;
                report.push(Severity::Error, Check::Payload, href, e.to_string());
            }
        }
    }

    // 4. Stored entries nobody refers to
    for entry in source.list().await? {
        if referenced.contains(&entry) || Some(entry.as_str()) == manifest_entry {
            continue;
        }
        report.push(
            Severity::Warning,
            Check::UnreferencedEntry,
            &entry,
            "stored in the package but not referenced by the manifest".to_string(),
        );
    }

    debug!(findings = report.findings.len(), verdict = ?report.verdict(), "verification done");
    Ok(report)
}

async fn check_stream<S: ByteSource + ?Sized>(
    report: &mut VerificationReport,
    source: &S,
    registry: &CodecRegistry,
    data_object: &str,
    stream: &ByteStream,
) -> Option<Bytes> {
    let href = stream.file_location.href.as_str();

    let bytes = match source.fetch(&stream.file_location).await {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound { .. }) => {
            report.push(
                Severity::Error,
                Check::Existence,
                href,
                format!("referenced by data object '{data_object}' but not stored"),
            );
            return None;
        }
        Err(e) => {
            report.push(Severity::Error, Check::Read, href, e.to_string());
            return None;
        }
    };

    if let Some(declared) = stream.size {
        if declared != bytes.len() as u64 {
            report.push(
                Severity::Error,
                Check::Size,
                href,
                format!("stored size {} differs from declared size {declared}", bytes.len()),
            );
        }
    }

    // Unknown algorithms are already a structural finding.
    let Ok(actual) = registry.compute_checksum(&stream.checksum.algorithm, &bytes) else {
        return Some(bytes);
    };
    if !stream.checksum.matches(&actual) {
        report.push(
            Severity::Error,
            Check::Checksum,
            href,
            format!(
                "{} of stored bytes is {actual}, declared {}",
                stream.checksum.algorithm,
                stream.checksum.value.trim()
            ),
        );
    }
    Some(bytes)
}

/// The entry path of a reference that names a file in the package.
fn package_path(reference: &Reference) -> Option<String> {
    if reference.locator_type == LocatorType::Other {
        return None;
    }
    normalize_href(&reference.href).ok()
}
