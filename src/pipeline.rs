//! Compilation Pipeline - Single Entry Point
//!
//! CRITICAL: publish runs only after schema, transform and semantic stages
//! have all accepted the document. No bypass.
//!
//! Files compile strictly sequentially in discovery order; the manifest is
//! threaded through the loop as an owned value and persisted exactly once at
//! the end. Any stage error aborts the whole run - there is no
//! skip-and-continue mode and no rollback of artifacts already written.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::model::{CanonicalDefinition, ManifestEntry};
use crate::registry::RegistryPublisher;
use crate::{hashing, loader, registry, schema, semantic, transform};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Schema validation failed: {0}")]
    Schema(#[from] schema::SchemaError),

    #[error("{path}: transformation failed: {source}")]
    Transform {
        path: String,
        #[source]
        source: transform::TransformError,
    },

    #[error("Semantic validation failed: {0}")]
    Semantic(#[from] semantic::SemanticError),

    #[error("Checksum computation failed: {0}")]
    Checksum(#[from] serde_json::Error),

    #[error("Publishing failed: {0}")]
    Publish(#[from] registry::PublishError),

    #[error("Failed to scan authoring directory: {0}")]
    Scan(#[from] walkdir::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Directory tree of authoring documents.
    pub authoring_root: PathBuf,
    /// Root for compiled artifacts, latest pointers and the manifest.
    pub output_root: PathBuf,
}

/// Summary of one full compiler run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub files_seen: usize,
    pub published: Vec<ManifestEntry>,
    pub manifest_path: String,
}

/// Run one document through every stage short of publishing:
/// schema-validate, parse, lower, semantic-check, checksum-stamp.
pub fn compile_document(
    text: &str,
    path: &Path,
) -> Result<CanonicalDefinition, PipelineError> {
    schema::validate(text, path)?;

    let wrap = |source| PipelineError::Transform {
        path: path.display().to_string(),
        source,
    };
    let doc = transform::parse(text).map_err(&wrap)?;
    let definition = transform::transform(&doc, path).map_err(&wrap)?;

    semantic::validate_definition(&definition)?;
    Ok(hashing::apply_checksum(definition)?)
}

/// The compiler orchestrator: discover, compile and publish every authoring
/// document, then persist the manifest.
pub struct CompilationPipeline {
    authoring_root: PathBuf,
    publisher: RegistryPublisher,
}

impl CompilationPipeline {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            publisher: RegistryPublisher::new(&options.output_root),
            authoring_root: options.authoring_root,
        }
    }

    /// Compile a single file from disk without publishing it.
    pub fn compile_file(&self, path: &Path) -> Result<CanonicalDefinition, PipelineError> {
        let text = fs::read_to_string(path).map_err(|source| PipelineError::Read {
            path: path.display().to_string(),
            source,
        })?;
        compile_document(&text, path)
    }

    /// Drive the full run. A missing authoring root is the only non-fatal
    /// condition: the run completes with zero entries.
    pub fn run(&self) -> Result<CompileReport, PipelineError> {
        let mut manifest = self.publisher.load_manifest()?;

        let files = if !self.authoring_root.exists() {
            tracing::warn!(
                root = %self.authoring_root.display(),
                "authoring root does not exist, compiling zero documents"
            );
            Vec::new()
        } else {
            loader::discover(&self.authoring_root)?
        };

        let mut published = Vec::new();
        for path in &files {
            let definition = self.compile_file(path)?;
            let entry = self.publisher.publish(&definition, &mut manifest)?;
            tracing::info!(
                key = %entry.key,
                version = %entry.content_version,
                "published definition"
            );
            published.push(entry);
        }

        self.publisher.persist_manifest(&mut manifest)?;

        Ok(CompileReport {
            files_seen: files.len(),
            published,
            manifest_path: self.publisher.manifest_path().display().to_string(),
        })
    }
}
