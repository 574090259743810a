//! The Archive: one opened package and its payload.
//!
//! Opening runs the whole front half of the pipeline (entities, resolution,
//! validation); the payload is only read on demand.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use xfdu_codec::CodecRegistry;
use xfdu_core::{
    resolve, validate, Element, Id, Package, ResolvedGraph, Severity, ValidationReport,
    ValidatorConfig,
};
use xfdu_store::ByteSource;

use crate::combinator::{CombineOptions, Combinator};
use crate::error::{ArchiveError, MaterializationError, Result};
use crate::verify::{self, VerificationReport};

/// Configuration for the Archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Refuse to open a package whose validation report has errors.
    pub reject_invalid: bool,
    /// Treat declared size disagreements as errors instead of warnings.
    pub strict_size: bool,
    /// Byte stream fetches in flight per data object.
    pub max_concurrent_fetches: usize,
    /// Stored entry holding the manifest itself, ignored by the
    /// unreferenced-entry check.
    pub manifest_entry: Option<String>,
    /// Structural validator settings.
    pub validator: ValidatorConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            reject_invalid: true,
            strict_size: false,
            max_concurrent_fetches: 8,
            manifest_entry: Some("manifest.safe".to_string()),
            validator: ValidatorConfig::default(),
        }
    }
}

impl ArchiveConfig {
    fn combine_options(&self) -> CombineOptions {
        CombineOptions {
            strict_size: self.strict_size,
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }
}

/// An opened package.
pub struct Archive<S> {
    graph: Arc<ResolvedGraph>,
    report: ValidationReport,
    source: Arc<S>,
    combinator: Combinator<S>,
    config: ArchiveConfig,
}

impl<S: ByteSource + 'static> Archive<S> {
    /// Open a package with the default codecs.
    pub fn open(manifest: &Element, source: S, config: ArchiveConfig) -> Result<Self> {
        Self::with_registry(manifest, source, CodecRegistry::with_defaults(), config)
    }

    /// Open a package with a caller-supplied codec registry (custom codecs,
    /// or a secret for keyed transforms).
    pub fn with_registry(
        manifest: &Element,
        source: S,
        registry: CodecRegistry,
        config: ArchiveConfig,
    ) -> Result<Self> {
        let package = Package::from_element(manifest)?;
        let graph = resolve(package)?;

        let validator = config
            .validator
            .clone()
            .with_checksum_algorithms(registry.checksum_names());
        let report = validate(&graph, &validator);
        for violation in report.violations() {
            match violation.severity {
                Severity::Error => warn!(%violation, "validation error"),
                Severity::Warning => debug!(%violation, "validation warning"),
            }
        }
        if config.reject_invalid && !report.is_valid() {
            return Err(ArchiveError::Invalid(report));
        }

        let source = Arc::new(source);
        let combinator = Combinator::new(
            Arc::clone(&source),
            Arc::new(registry),
            config.combine_options(),
        );
        debug!(
            data_objects = graph.package().data_objects().len(),
            findings = report.len(),
            "archive opened"
        );

        Ok(Self {
            graph: Arc::new(graph),
            report,
            source,
            combinator,
            config,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// The resolved package.
    pub fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    /// A shared handle to the resolved package.
    pub fn shared_graph(&self) -> Arc<ResolvedGraph> {
        Arc::clone(&self.graph)
    }

    /// Findings from opening the package.
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn registry(&self) -> &CodecRegistry {
        self.combinator.registry()
    }

    /// Emit the package back as a generic tree.
    pub fn to_element(&self) -> Element {
        self.graph.to_element()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payload
    // ─────────────────────────────────────────────────────────────────────────

    /// Canonical bytes of one data object.
    pub async fn materialize(&self, id: &str) -> std::result::Result<Bytes, MaterializationError> {
        let index = self
            .graph
            .data_object_by_id(id)
            .ok_or_else(|| MaterializationError::UnknownDataObject { id: id.to_string() })?;
        self.combinator
            .materialize(self.graph.data_object(index))
            .await
    }

    /// Every data object in document order, each with its own outcome.
    pub async fn materialize_all(
        &self,
    ) -> Vec<(Id, std::result::Result<Bytes, MaterializationError>)> {
        let mut results = Vec::new();
        for index in self.graph.data_objects() {
            let object = self.graph.data_object(index);
            let outcome = self.combinator.materialize(object).await;
            if let Err(e) = &outcome {
                warn!(data_object = %object.id, error = %e, "materialization failed");
            }
            results.push((object.id.clone(), outcome));
        }
        results
    }

    /// Check every stored stream against the manifest.
    pub async fn verify(&self) -> Result<VerificationReport> {
        verify::verify(
            &self.graph,
            &self.report,
            &*self.source,
            self.combinator.registry(),
            self.config.manifest_entry.as_deref(),
        )
        .await
    }
}
