//! Canonical Model - Data Contracts
//!
//! The in-memory IR produced by the transformer and the on-disk manifest
//! schema. No behavior beyond key/dependency derivation; policy lives in the
//! semantic validator and the registry publisher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Separator used between manifest key segments.
pub const KEY_SEPARATOR: &str = "::";

/// Placeholder segment for an unset optional layer dimension.
pub const KEY_BLANK: &str = "-";

/// Tenant segment used when a definition is not tenant-scoped.
pub const GLOBAL_TENANT: &str = "global";

/// Identifies what a definition applies to.
///
/// A layer with all four optional dimensions unset is the global base for a
/// module+route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalLayer {
    pub module: String,
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl CanonicalLayer {
    /// True when no tenant/role/variant/locale targeting is present.
    pub fn is_untargeted(&self) -> bool {
        self.tenant.is_none()
            && self.role.is_none()
            && self.variant.is_none()
            && self.locale.is_none()
    }

    /// Deterministic manifest key for this layer.
    ///
    /// Same values always produce the same key regardless of how the layer
    /// was assembled.
    pub fn manifest_key(&self) -> String {
        let blank = || KEY_BLANK.to_string();
        [
            self.tenant.clone().unwrap_or_else(|| GLOBAL_TENANT.to_string()),
            self.module.clone(),
            self.route.clone(),
            self.role.clone().unwrap_or_else(blank),
            self.variant.clone().unwrap_or_else(blank),
            self.locale.clone().unwrap_or_else(blank),
        ]
        .join(KEY_SEPARATOR)
    }

    /// Manifest key of the blueprint this layer depends on: same
    /// module/route/locale with tenant/role/variant cleared.
    pub fn blueprint_key(&self) -> String {
        CanonicalLayer {
            module: self.module.clone(),
            route: self.route.clone(),
            tenant: None,
            role: None,
            variant: None,
            locale: self.locale.clone(),
        }
        .manifest_key()
    }
}

/// Whether a definition is the global base or a patch on top of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Blueprint,
    Overlay,
}

/// How an overlay node patches the same-id node in the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOperation {
    Merge,
    Replace,
    Remove,
}

impl PatchOperation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "merge" => Some(Self::Merge),
            "replace" => Some(Self::Replace),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// A component prop - exactly one variant is active.
///
/// Kept as a sum type so consumers get exhaustive matching when resolving
/// props at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PropValue {
    /// Literal value.
    Static { value: serde_json::Value },
    /// Reference to a data source declared in the same definition.
    #[serde(rename_all = "camelCase")]
    Binding {
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<serde_json::Value>,
    },
    /// Computed value; the expression text is opaque to the compiler.
    #[serde(rename_all = "camelCase")]
    Expression {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<serde_json::Value>,
    },
    /// Reference to an action declared in the same definition.
    #[serde(rename_all = "camelCase")]
    Action { action_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalComponent {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<PatchOperation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, PropValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CanonicalComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<Vec<String>>,
}

/// A named layout slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRegion {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<PatchOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<CanonicalComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDataSource {
    pub id: String,
    /// Open set: static | http | service | backend | ...
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<PatchOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAction {
    pub id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<PatchOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<CanonicalRegion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<CanonicalComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<CanonicalDataSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<CanonicalAction>,
}

/// The compilation unit: one fully lowered authoring document.
///
/// Never mutated after checksum-stamping; consumed once by the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDefinition {
    pub schema_version: String,
    pub content_version: String,
    pub checksum: String,
    pub kind: DefinitionKind,
    pub layer: CanonicalLayer,
    pub page: CanonicalPage,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_permissions: Option<Vec<String>>,
}

/// One published definition, as recorded in the manifest and in the latest
/// pointer files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub key: String,
    pub kind: DefinitionKind,
    pub schema_version: String,
    pub content_version: String,
    pub checksum: String,
    pub layer: CanonicalLayer,
    pub source_path: String,
    pub compiled_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
}

/// The persisted index of every published definition.
///
/// Entries live in a BTreeMap so serialization order is reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl ManifestFile {
    pub fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}
