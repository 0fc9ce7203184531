//! PageForge Core - Page Metadata Compiler
//!
//! # Pipeline Guarantees (Non-Negotiable)
//! 1. Schema Validation Gates Everything
//! 2. Lowering Never Checks Invariants, The Semantic Validator Does
//! 3. Checksums Are Deterministic
//! 4. Latest Pointers Never Regress
//! 5. The Manifest Is Written Once Per Run

pub mod model;
pub mod loader;
pub mod schema;
pub mod transform;
pub mod semantic;
pub mod hashing;
pub mod registry;
pub mod pipeline;

pub use model::{
    CanonicalAction, CanonicalComponent, CanonicalDataSource, CanonicalDefinition,
    CanonicalLayer, CanonicalPage, CanonicalRegion, DefinitionKind, ManifestEntry, ManifestFile,
    PatchOperation, PropValue,
};
pub use schema::SchemaError;
pub use transform::TransformError;
pub use semantic::SemanticError;
pub use hashing::{apply_checksum, canonical_json};
pub use registry::{PublishError, RegistryPublisher};
pub use pipeline::{
    compile_document, CompilationPipeline, CompileOptions, CompileReport, PipelineError,
};

pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffix that marks a file as an authoring document.
pub const AUTHORING_EXT: &str = ".page.xml";

/// Extension of compiled artifacts, latest pointers and the manifest.
pub const COMPILED_EXT: &str = "json";

/// Well-known manifest file name under the output root.
pub const MANIFEST_FILE: &str = "manifest.json";
