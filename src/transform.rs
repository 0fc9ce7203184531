//! Canonical Transformer - XML Lowering
//!
//! Parses accepted XML into a raw element tree and lowers it into the
//! Canonical Model: layer extraction, prop-value tagging, nested
//! component/region trees, data-source/action extraction.
//!
//! No cross-reference or uniqueness checks here. Invariant enforcement is
//! deferred to the semantic validator so lowering and checking stay testable
//! independently.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::model::{
    CanonicalAction, CanonicalComponent, CanonicalDataSource, CanonicalDefinition,
    CanonicalLayer, CanonicalPage, CanonicalRegion, DefinitionKind, PatchOperation, PropValue,
};

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("document kind must be 'blueprint' or 'overlay', found '{0}'")]
    UnknownKind(String),

    #[error("unknown operation '{value}' on <{element}>")]
    UnknownOperation {
        element: &'static str,
        value: String,
    },

    #[error(
        "prop '{prop}' on component '{component}' must set exactly one of \
         value, bind, expr, action ({found})"
    )]
    AmbiguousProp {
        component: String,
        prop: String,
        found: String,
    },

    #[error("unexpected element <{element}> inside <{parent}>")]
    UnexpectedElement {
        parent: &'static str,
        element: String,
    },

    #[error("data source '{data_source}' has an invalid contract body: {message}")]
    InvalidContract {
        data_source: String,
        message: String,
    },
}

/// Parse raw XML text into an element tree.
pub fn parse(xml: &str) -> Result<roxmltree::Document<'_>, TransformError> {
    roxmltree::Document::parse(xml).map_err(|e| TransformError::Parse(e.to_string()))
}

/// Lower a parsed document into a canonical definition.
///
/// The returned definition carries an empty checksum; stamping happens in a
/// later stage.
pub fn transform(
    doc: &roxmltree::Document,
    source_path: &Path,
) -> Result<CanonicalDefinition, TransformError> {
    let root = doc.root_element();
    if root.tag_name().name() != "page" {
        return Err(TransformError::UnexpectedElement {
            parent: "document",
            element: root.tag_name().name().to_string(),
        });
    }

    let kind = match req_attr(root, "page", "kind")? {
        "blueprint" => DefinitionKind::Blueprint,
        "overlay" => DefinitionKind::Overlay,
        other => return Err(TransformError::UnknownKind(other.to_string())),
    };

    let layer = CanonicalLayer {
        module: req_attr(root, "page", "module")?.to_string(),
        route: req_attr(root, "page", "route")?.to_string(),
        tenant: opt_attr(root, "tenant"),
        role: opt_attr(root, "role"),
        variant: opt_attr(root, "variant"),
        locale: opt_attr(root, "locale"),
    };

    let mut page = CanonicalPage {
        id: opt_attr(root, "id"),
        title: opt_attr(root, "title"),
        ..Default::default()
    };

    // Authored order is preserved within each list.
    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "region" => page.regions.push(lower_region(child)?),
            "component" => page.components.push(lower_component(child)?),
            "dataSource" => page.data_sources.push(lower_data_source(child)?),
            "action" => page.actions.push(lower_action(child)?),
            other => {
                return Err(TransformError::UnexpectedElement {
                    parent: "page",
                    element: other.to_string(),
                })
            }
        }
    }

    Ok(CanonicalDefinition {
        schema_version: req_attr(root, "page", "schemaVersion")?.to_string(),
        content_version: req_attr(root, "page", "contentVersion")?.to_string(),
        checksum: String::new(),
        kind,
        layer,
        page,
        source_path: source_path.display().to_string(),
        feature_code: opt_attr(root, "feature"),
        required_permissions: permissions(root.attribute("requires")),
    })
}

fn req_attr<'a>(
    node: roxmltree::Node<'a, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, TransformError> {
    node.attribute(attribute)
        .ok_or(TransformError::MissingAttribute { element, attribute })
}

fn opt_attr(node: roxmltree::Node, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn operation(
    node: roxmltree::Node,
    element: &'static str,
) -> Result<Option<PatchOperation>, TransformError> {
    match node.attribute("operation") {
        None => Ok(None),
        Some(raw) => PatchOperation::parse(raw)
            .map(Some)
            .ok_or_else(|| TransformError::UnknownOperation {
                element,
                value: raw.to_string(),
            }),
    }
}

/// Split a `requires` attribute into permission codes.
fn permissions(raw: Option<&str>) -> Option<Vec<String>> {
    let raw = raw?;
    let codes: Vec<String> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if codes.is_empty() {
        None
    } else {
        Some(codes)
    }
}

/// Authored literals are JSON when they parse as JSON, strings otherwise.
fn literal(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn lower_region(node: roxmltree::Node) -> Result<CanonicalRegion, TransformError> {
    let mut components = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "component" => components.push(lower_component(child)?),
            other => {
                return Err(TransformError::UnexpectedElement {
                    parent: "region",
                    element: other.to_string(),
                })
            }
        }
    }
    Ok(CanonicalRegion {
        id: req_attr(node, "region", "id")?.to_string(),
        operation: operation(node, "region")?,
        components,
    })
}

fn lower_component(node: roxmltree::Node) -> Result<CanonicalComponent, TransformError> {
    let id = req_attr(node, "component", "id")?.to_string();

    let mut props = BTreeMap::new();
    let mut children = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "prop" => {
                let (name, value) = lower_prop(child, &id)?;
                props.insert(name, value);
            }
            "component" => children.push(lower_component(child)?),
            other => {
                return Err(TransformError::UnexpectedElement {
                    parent: "component",
                    element: other.to_string(),
                })
            }
        }
    }

    Ok(CanonicalComponent {
        id,
        component_type: opt_attr(node, "type"),
        namespace: opt_attr(node, "namespace"),
        version: opt_attr(node, "version"),
        operation: operation(node, "component")?,
        props,
        children,
        rbac: permissions(node.attribute("requires")),
    })
}

/// Tag one authored prop as exactly one `PropValue` variant.
///
/// Classification is driven by which authoring attribute is present; zero or
/// more than one classifying attribute is a hard error.
fn lower_prop(
    node: roxmltree::Node,
    component_id: &str,
) -> Result<(String, PropValue), TransformError> {
    let name = req_attr(node, "prop", "name")?.to_string();

    let value = node.attribute("value");
    let bind = node.attribute("bind");
    let expr = node.attribute("expr");
    let action = node.attribute("action");

    let present: Vec<&str> = [
        value.map(|_| "value"),
        bind.map(|_| "bind"),
        expr.map(|_| "expr"),
        action.map(|_| "action"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if present.len() != 1 {
        let found = if present.is_empty() {
            "found none".to_string()
        } else {
            format!("found {}", present.join(", "))
        };
        return Err(TransformError::AmbiguousProp {
            component: component_id.to_string(),
            prop: name,
            found,
        });
    }

    let fallback = node.attribute("fallback").map(literal);
    let tagged = if let Some(raw) = value {
        PropValue::Static { value: literal(raw) }
    } else if let Some(source) = bind {
        PropValue::Binding {
            source: source.to_string(),
            path: opt_attr(node, "path"),
            fallback,
        }
    } else if let Some(expression) = expr {
        PropValue::Expression {
            expression: expression.to_string(),
            fallback,
        }
    } else {
        PropValue::Action {
            action_id: action.map(str::to_string).unwrap_or_default(),
        }
    };

    Ok((name, tagged))
}

/// Attributes with structural meaning on dataSource/action elements; anything
/// else becomes a config key.
const RESERVED_ATTRS: &[&str] = &["id", "kind", "operation", "requires"];

fn config_from_attrs(node: roxmltree::Node) -> Option<serde_json::Value> {
    let mut config = serde_json::Map::new();
    for attr in node.attributes() {
        if !RESERVED_ATTRS.contains(&attr.name()) {
            config.insert(attr.name().to_string(), literal(attr.value()));
        }
    }
    if config.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(config))
    }
}

fn lower_data_source(node: roxmltree::Node) -> Result<CanonicalDataSource, TransformError> {
    let id = req_attr(node, "dataSource", "id")?.to_string();

    let mut contract = None;
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "contract" => {
                let body = child.text().unwrap_or("").trim();
                if !body.is_empty() {
                    contract = Some(serde_json::from_str(body).map_err(|e| {
                        TransformError::InvalidContract {
                            data_source: id.clone(),
                            message: e.to_string(),
                        }
                    })?);
                }
            }
            other => {
                return Err(TransformError::UnexpectedElement {
                    parent: "dataSource",
                    element: other.to_string(),
                })
            }
        }
    }

    Ok(CanonicalDataSource {
        kind: req_attr(node, "dataSource", "kind")?.to_string(),
        operation: operation(node, "dataSource")?,
        config: config_from_attrs(node),
        contract,
        rbac: permissions(node.attribute("requires")),
        id,
    })
}

fn lower_action(node: roxmltree::Node) -> Result<CanonicalAction, TransformError> {
    Ok(CanonicalAction {
        id: req_attr(node, "action", "id")?.to_string(),
        kind: req_attr(node, "action", "kind")?.to_string(),
        operation: operation(node, "action")?,
        config: config_from_attrs(node),
        rbac: permissions(node.attribute("requires")),
    })
}
