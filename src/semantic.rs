//! Semantic Validator - Invariant Enforcement
//!
//! Cross-cutting checks on a canonical definition, run in a fixed order so
//! error messages are deterministic:
//! version format -> module/route presence -> overlay targeting -> blueprint
//! page id -> duplicate ids (regions depth-first, then top-level components)
//! -> data-source/action registration -> batch binding resolution.
//!
//! Binding resolution is deferred until every data source is registered:
//! a component earlier in the tree may legitimately bind to a data source
//! declared later in the same document.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{CanonicalComponent, CanonicalDefinition, DefinitionKind, PropValue};

#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("{path}: {field} '{value}' is not a valid semantic version")]
    InvalidVersion {
        path: String,
        field: String,
        value: String,
    },

    #[error("{path}: layer is missing a non-empty '{field}'")]
    MissingLayerField { path: String, field: &'static str },

    #[error("{path}: overlay must target at least one of tenant, role, variant, locale")]
    UntargetedOverlay { path: String },

    #[error("{path}: blueprint requires a page id")]
    MissingPageId { path: String },

    #[error("{path}: duplicate {category} id '{id}' (first at {first}, again at {second})")]
    DuplicateId {
        path: String,
        category: &'static str,
        id: String,
        first: String,
        second: String,
    },

    #[error("{path}: unresolved data source bindings:\n{}", render_unresolved(.bindings))]
    UnresolvedBindings {
        path: String,
        bindings: Vec<UnresolvedBinding>,
    },
}

/// One binding prop whose data source does not exist in the definition.
#[derive(Debug, Clone)]
pub struct UnresolvedBinding {
    pub trail: String,
    pub source: String,
}

fn render_unresolved(bindings: &[UnresolvedBinding]) -> String {
    bindings
        .iter()
        .map(|b| format!("  {} -> data source '{}'", b.trail, b.source))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Enforce every definition invariant, in the fixed order above.
pub fn validate_definition(def: &CanonicalDefinition) -> Result<(), SemanticError> {
    let path = &def.source_path;

    check_semver(path, "schemaVersion", &def.schema_version)?;
    check_semver(path, "contentVersion", &def.content_version)?;

    if def.layer.module.trim().is_empty() {
        return Err(SemanticError::MissingLayerField {
            path: path.clone(),
            field: "module",
        });
    }
    if def.layer.route.trim().is_empty() {
        return Err(SemanticError::MissingLayerField {
            path: path.clone(),
            field: "route",
        });
    }

    // An overlay with no targeting would silently shadow the global base.
    if def.kind == DefinitionKind::Overlay && def.layer.is_untargeted() {
        return Err(SemanticError::UntargetedOverlay { path: path.clone() });
    }

    if def.kind == DefinitionKind::Blueprint
        && def.page.id.as_deref().map_or(true, |id| id.trim().is_empty())
    {
        return Err(SemanticError::MissingPageId { path: path.clone() });
    }

    // Overlays legitimately re-target existing ids, so uniqueness applies to
    // blueprints only. Component versions are checked for both kinds.
    let enforce_unique = def.kind == DefinitionKind::Blueprint;

    let mut walk = Walk {
        path,
        component_ids: enforce_unique.then(HashMap::new),
        bindings: Vec::new(),
    };

    let mut region_ids: HashMap<String, String> = HashMap::new();
    for region in &def.page.regions {
        let trail = format!("region '{}'", region.id);
        if enforce_unique {
            register(&mut region_ids, "region", &region.id, &trail, path)?;
        }
        for component in &region.components {
            walk.visit(component, &trail)?;
        }
    }
    for component in &def.page.components {
        walk.visit(component, "page")?;
    }

    // Data sources and actions share one id namespace: bindings reference the
    // former, action props the latter, and an id colliding across the two
    // would be ambiguous to the runtime.
    if enforce_unique {
        let mut source_ids: HashMap<String, String> = HashMap::new();
        for ds in &def.page.data_sources {
            let trail = format!("dataSource '{}'", ds.id);
            register(&mut source_ids, "data-source/action", &ds.id, &trail, path)?;
        }
        for action in &def.page.actions {
            let trail = format!("action '{}'", action.id);
            register(&mut source_ids, "data-source/action", &action.id, &trail, path)?;
        }

        let unresolved: Vec<UnresolvedBinding> = walk
            .bindings
            .into_iter()
            .filter(|b| !source_ids.contains_key(&b.source))
            .collect();
        if !unresolved.is_empty() {
            return Err(SemanticError::UnresolvedBindings {
                path: path.clone(),
                bindings: unresolved,
            });
        }
    }

    Ok(())
}

fn check_semver(path: &str, field: &str, value: &str) -> Result<(), SemanticError> {
    semver::Version::parse(value)
        .map(|_| ())
        .map_err(|_| SemanticError::InvalidVersion {
            path: path.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn register(
    map: &mut HashMap<String, String>,
    category: &'static str,
    id: &str,
    trail: &str,
    path: &str,
) -> Result<(), SemanticError> {
    if let Some(first) = map.get(id) {
        return Err(SemanticError::DuplicateId {
            path: path.to_string(),
            category,
            id: id.to_string(),
            first: first.clone(),
            second: trail.to_string(),
        });
    }
    map.insert(id.to_string(), trail.to_string());
    Ok(())
}

struct Walk<'a> {
    path: &'a str,
    /// Present only when uniqueness is enforced (blueprints).
    component_ids: Option<HashMap<String, String>>,
    bindings: Vec<UnresolvedBinding>,
}

impl Walk<'_> {
    fn visit(&mut self, component: &CanonicalComponent, parent: &str) -> Result<(), SemanticError> {
        let trail = format!("{parent} > component '{}'", component.id);

        if let Some(ids) = self.component_ids.as_mut() {
            register(ids, "component", &component.id, &trail, self.path)?;
        }

        if let Some(version) = &component.version {
            check_semver(self.path, &format!("version of {trail}"), version)?;
        }

        for (name, prop) in &component.props {
            if let PropValue::Binding { source, .. } = prop {
                self.bindings.push(UnresolvedBinding {
                    trail: format!("{trail} > prop '{name}'"),
                    source: source.clone(),
                });
            }
        }

        for child in &component.children {
            self.visit(child, &trail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CanonicalAction, CanonicalDataSource, CanonicalLayer, CanonicalPage, CanonicalRegion,
    };
    use std::collections::BTreeMap;

    fn component(id: &str) -> CanonicalComponent {
        CanonicalComponent {
            id: id.to_string(),
            component_type: None,
            namespace: None,
            version: None,
            operation: None,
            props: BTreeMap::new(),
            children: Vec::new(),
            rbac: None,
        }
    }

    fn data_source(id: &str) -> CanonicalDataSource {
        CanonicalDataSource {
            id: id.to_string(),
            kind: "static".to_string(),
            operation: None,
            config: None,
            contract: None,
            rbac: None,
        }
    }

    fn blueprint() -> CanonicalDefinition {
        CanonicalDefinition {
            schema_version: "1.0.0".to_string(),
            content_version: "1.0.0".to_string(),
            checksum: String::new(),
            kind: DefinitionKind::Blueprint,
            layer: CanonicalLayer {
                module: "members".to_string(),
                route: "list".to_string(),
                ..Default::default()
            },
            page: CanonicalPage {
                id: Some("members-list".to_string()),
                ..Default::default()
            },
            source_path: "pages/members/list.page.xml".to_string(),
            feature_code: None,
            required_permissions: None,
        }
    }

    #[test]
    fn version_format_is_checked_first() {
        let mut def = blueprint();
        def.schema_version = "one".to_string();
        def.layer.module = String::new(); // would also fail, but later
        let err = validate_definition(&def).unwrap_err();
        assert!(matches!(err, SemanticError::InvalidVersion { .. }));
        assert!(err.to_string().contains("schemaVersion"));
    }

    #[test]
    fn untargeted_overlay_is_rejected() {
        let mut def = blueprint();
        def.kind = DefinitionKind::Overlay;
        let err = validate_definition(&def).unwrap_err();
        assert!(matches!(err, SemanticError::UntargetedOverlay { .. }));

        def.layer.variant = Some("b".to_string());
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn blueprint_requires_page_id() {
        let mut def = blueprint();
        def.page.id = None;
        let err = validate_definition(&def).unwrap_err();
        assert!(matches!(err, SemanticError::MissingPageId { .. }));
    }

    #[test]
    fn duplicate_component_ids_across_regions_name_both_locations() {
        let mut def = blueprint();
        def.page.regions = vec![
            CanonicalRegion {
                id: "header".to_string(),
                operation: None,
                components: vec![component("title")],
            },
            CanonicalRegion {
                id: "footer".to_string(),
                operation: None,
                components: vec![{
                    let mut outer = component("wrap");
                    outer.children.push(component("title"));
                    outer
                }],
            },
        ];
        let err = validate_definition(&def).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("duplicate component id 'title'"));
        assert!(message.contains("region 'header' > component 'title'"));
        assert!(message.contains("region 'footer' > component 'wrap' > component 'title'"));
    }

    #[test]
    fn overlays_are_exempt_from_uniqueness() {
        let mut def = blueprint();
        def.kind = DefinitionKind::Overlay;
        def.layer.tenant = Some("acme".to_string());
        def.page.id = None;
        def.page.components = vec![component("title"), component("title")];
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn component_versions_are_semver_checked() {
        let mut def = blueprint();
        let mut c = component("title");
        c.version = Some("latest".to_string());
        def.page.components = vec![c];
        let err = validate_definition(&def).unwrap_err();
        assert!(err.to_string().contains("component 'title'"));
    }

    #[test]
    fn data_source_and_action_ids_share_a_namespace() {
        let mut def = blueprint();
        def.page.data_sources = vec![data_source("feed")];
        def.page.actions = vec![CanonicalAction {
            id: "feed".to_string(),
            kind: "navigate".to_string(),
            operation: None,
            config: None,
            rbac: None,
        }];
        let err = validate_definition(&def).unwrap_err();
        assert!(err.to_string().contains("data-source/action"));
    }

    #[test]
    fn forward_binding_references_are_legal() {
        let mut def = blueprint();
        let mut c = component("list");
        c.props.insert(
            "rows".to_string(),
            PropValue::Binding {
                source: "feed".to_string(),
                path: None,
                fallback: None,
            },
        );
        def.page.components = vec![c];
        // Declared after the component that binds to it.
        def.page.data_sources = vec![data_source("feed")];
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn unresolved_bindings_are_reported_together() {
        let mut def = blueprint();
        let mut a = component("a");
        a.props.insert(
            "rows".to_string(),
            PropValue::Binding {
                source: "missing1".to_string(),
                path: None,
                fallback: None,
            },
        );
        let mut b = component("b");
        b.props.insert(
            "items".to_string(),
            PropValue::Binding {
                source: "missing2".to_string(),
                path: None,
                fallback: None,
            },
        );
        def.page.components = vec![a, b];
        let err = validate_definition(&def).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing1"));
        assert!(message.contains("missing2"));
        assert!(message.contains("prop 'rows'"));
    }
}
