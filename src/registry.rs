//! Registry Publisher - Artifact Store and Manifest Bookkeeping
//!
//! Three steps per definition, always in order: write the version-qualified
//! compiled artifact, update the per-layer "latest" pointer under the
//! highest-version-wins policy, upsert the in-memory manifest. The manifest
//! itself is persisted once per run, after every file has been published.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::model::{
    CanonicalDefinition, CanonicalLayer, DefinitionKind, ManifestEntry, ManifestFile,
    GLOBAL_TENANT,
};
use crate::{COMPILED_EXT, MANIFEST_FILE};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Map every character outside `[A-Za-z0-9-_]` to `-` so layer values are
/// safe as path segments.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Monotonic "highest-version-wins" comparison for latest pointers.
///
/// Semantic-version comparison when both sides parse as semver; plain string
/// comparison otherwise. Non-semver content versions are an observed
/// possibility and must not crash the publisher.
pub fn version_is_at_least(candidate: &str, existing: &str) -> bool {
    match (
        semver::Version::parse(candidate),
        semver::Version::parse(existing),
    ) {
        (Ok(new), Ok(old)) => new >= old,
        _ => candidate >= existing,
    }
}

pub struct RegistryPublisher {
    compiled_root: PathBuf,
    latest_root: PathBuf,
    manifest_path: PathBuf,
}

impl RegistryPublisher {
    /// Publisher rooted at one output directory:
    /// `<out>/compiled`, `<out>/latest`, `<out>/manifest.json`.
    pub fn new(output_root: &Path) -> Self {
        Self {
            compiled_root: output_root.join("compiled"),
            latest_root: output_root.join("latest"),
            manifest_path: output_root.join(MANIFEST_FILE),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Read the persisted manifest, or start an empty one.
    pub fn load_manifest(&self) -> Result<ManifestFile, PublishError> {
        if !self.manifest_path.exists() {
            return Ok(ManifestFile::empty());
        }
        let text = fs::read_to_string(&self.manifest_path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Publish one stamped definition: compiled artifact, latest pointer,
    /// manifest upsert.
    pub fn publish(
        &self,
        definition: &CanonicalDefinition,
        manifest: &mut ManifestFile,
    ) -> Result<ManifestEntry, PublishError> {
        let compiled_path = self.compiled_path(definition);
        if let Some(parent) = compiled_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(
            &compiled_path,
            serde_json::to_string_pretty(definition)?,
        )?;

        let key = definition.layer.manifest_key();
        let entry = ManifestEntry {
            key: key.clone(),
            kind: definition.kind,
            schema_version: definition.schema_version.clone(),
            content_version: definition.content_version.clone(),
            checksum: definition.checksum.clone(),
            layer: definition.layer.clone(),
            source_path: definition.source_path.clone(),
            compiled_path: compiled_path.display().to_string(),
            feature_code: definition.feature_code.clone(),
            required_permissions: definition.required_permissions.clone(),
            depends_on: (definition.kind == DefinitionKind::Overlay)
                .then(|| definition.layer.blueprint_key()),
        };

        self.update_latest_pointer(&entry)?;
        manifest.entries.insert(key, entry.clone());
        Ok(entry)
    }

    /// Serialize the full manifest with a fresh timestamp. Entries are kept
    /// in a BTreeMap, so keys come out sorted for reproducible diffs.
    pub fn persist_manifest(&self, manifest: &mut ManifestFile) -> Result<(), PublishError> {
        manifest.generated_at = Utc::now();
        if let Some(parent) = self.manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.manifest_path, serde_json::to_string_pretty(manifest)?)?;
        Ok(())
    }

    /// Relative directory for a layer:
    /// `<tenant|global>/<module>[/role/<role>][/variant/<variant>][/locale/<locale>]`.
    fn layer_dir(&self, layer: &CanonicalLayer) -> PathBuf {
        let mut dir = PathBuf::new();
        dir.push(sanitize(
            layer.tenant.as_deref().unwrap_or(GLOBAL_TENANT),
        ));
        dir.push(sanitize(&layer.module));
        if let Some(role) = &layer.role {
            dir.push("role");
            dir.push(sanitize(role));
        }
        if let Some(variant) = &layer.variant {
            dir.push("variant");
            dir.push(sanitize(variant));
        }
        if let Some(locale) = &layer.locale {
            dir.push("locale");
            dir.push(sanitize(locale));
        }
        dir
    }

    /// Content-version-qualified artifact path, so multiple versions of one
    /// layer+route coexist on disk.
    fn compiled_path(&self, definition: &CanonicalDefinition) -> PathBuf {
        self.compiled_root
            .join(self.layer_dir(&definition.layer))
            .join(format!(
                "{}@{}.{}",
                sanitize(&definition.layer.route),
                definition.content_version,
                COMPILED_EXT
            ))
    }

    /// Parallel, version-unqualified pointer path.
    fn latest_path(&self, layer: &CanonicalLayer) -> PathBuf {
        self.latest_root
            .join(self.layer_dir(layer))
            .join(format!("{}.{}", sanitize(&layer.route), COMPILED_EXT))
    }

    /// Overwrite the pointer only when the new version is >= the existing
    /// one, so republishing an older version never regresses it and
    /// republishing the same version stays idempotent.
    fn update_latest_pointer(&self, entry: &ManifestEntry) -> Result<(), PublishError> {
        let pointer_path = self.latest_path(&entry.layer);

        if pointer_path.exists() {
            let existing_version = match serde_json::from_str::<ManifestEntry>(
                &fs::read_to_string(&pointer_path)?,
            ) {
                Ok(existing) => Some(existing.content_version),
                Err(e) => {
                    tracing::warn!(
                        pointer = %pointer_path.display(),
                        error = %e,
                        "latest pointer is unreadable, overwriting"
                    );
                    None
                }
            };
            if let Some(existing) = existing_version {
                if !version_is_at_least(&entry.content_version, &existing) {
                    return Ok(());
                }
            }
        } else if let Some(parent) = pointer_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&pointer_path, serde_json::to_string_pretty(entry)?)?;
        Ok(())
    }
}
