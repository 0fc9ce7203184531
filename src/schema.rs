//! Schema Validator - Structural Gate
//!
//! Validates raw authoring documents against the fixed schema definition
//! before any semantic processing. Malformed documents never reach the
//! canonical transformer.
//!
//! This stage is structural only: element/attribute shape and closed value
//! sets. Prop classification and cross-reference rules belong to later
//! stages.

use std::path::Path;

use thiserror::Error;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static SCHEMA_VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_schema_validation_call_count() -> u32 {
    SCHEMA_VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_schema_validation_call_count() {
    SCHEMA_VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{path}: document is not well-formed XML: {message}")]
    Malformed { path: String, message: String },

    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
}

/// One entry of the fixed schema definition.
struct ElementRule {
    name: &'static str,
    required: &'static [&'static str],
    optional: &'static [&'static str],
    children: &'static [&'static str],
    /// Unrecognized attributes are config keys, not errors.
    open_attributes: bool,
    /// Non-whitespace text content is allowed.
    allows_text: bool,
}

/// The fixed schema definition for authoring documents.
const SCHEMA: &[ElementRule] = &[
    ElementRule {
        name: "page",
        required: &["schemaVersion", "contentVersion", "kind", "module", "route"],
        optional: &[
            "tenant", "role", "variant", "locale", "id", "title", "feature", "requires",
        ],
        children: &["region", "component", "dataSource", "action"],
        open_attributes: false,
        allows_text: false,
    },
    ElementRule {
        name: "region",
        required: &["id"],
        optional: &["operation"],
        children: &["component"],
        open_attributes: false,
        allows_text: false,
    },
    ElementRule {
        name: "component",
        required: &["id"],
        optional: &["type", "namespace", "version", "operation", "requires"],
        children: &["prop", "component"],
        open_attributes: false,
        allows_text: false,
    },
    ElementRule {
        name: "prop",
        required: &["name"],
        optional: &["value", "bind", "path", "expr", "action", "fallback"],
        children: &[],
        open_attributes: false,
        allows_text: false,
    },
    ElementRule {
        name: "dataSource",
        required: &["id", "kind"],
        optional: &["operation", "requires"],
        children: &["contract"],
        open_attributes: true,
        allows_text: false,
    },
    ElementRule {
        name: "contract",
        required: &[],
        optional: &[],
        children: &[],
        open_attributes: false,
        allows_text: true,
    },
    ElementRule {
        name: "action",
        required: &["id", "kind"],
        optional: &["operation", "requires"],
        children: &[],
        open_attributes: true,
        allows_text: false,
    },
];

const KIND_VALUES: &[&str] = &["blueprint", "overlay"];
const OPERATION_VALUES: &[&str] = &["merge", "replace", "remove"];

fn rule_for(name: &str) -> Option<&'static ElementRule> {
    SCHEMA.iter().find(|r| r.name == name)
}

/// Structurally validate one raw document.
///
/// `path` anchors every diagnostic so a batch run can pinpoint the failing
/// document.
pub fn validate(document_text: &str, path: &Path) -> Result<(), SchemaError> {
    #[cfg(feature = "test-hooks")]
    SCHEMA_VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

    let path_str = path.display().to_string();

    let doc = roxmltree::Document::parse(document_text).map_err(|e| SchemaError::Malformed {
        path: path_str.clone(),
        message: e.to_string(),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "page" {
        return Err(SchemaError::Invalid {
            path: path_str,
            message: format!(
                "root element must be <page>, found <{}>",
                root.tag_name().name()
            ),
        });
    }

    validate_element(root, &path_str)
}

fn validate_element(node: roxmltree::Node, path: &str) -> Result<(), SchemaError> {
    let name = node.tag_name().name();
    let rule = rule_for(name).ok_or_else(|| SchemaError::Invalid {
        path: path.to_string(),
        message: format!("unknown element <{name}>"),
    })?;

    for attr in node.attributes() {
        let attr_name = attr.name();
        let known =
            rule.required.contains(&attr_name) || rule.optional.contains(&attr_name);
        if !known && !rule.open_attributes {
            return Err(SchemaError::Invalid {
                path: path.to_string(),
                message: format!("unknown attribute '{attr_name}' on <{name}>"),
            });
        }
        if attr_name == "kind" && name == "page" && !KIND_VALUES.contains(&attr.value()) {
            return Err(SchemaError::Invalid {
                path: path.to_string(),
                message: format!(
                    "attribute 'kind' on <page> must be one of blueprint|overlay, found '{}'",
                    attr.value()
                ),
            });
        }
        if attr_name == "operation" && !OPERATION_VALUES.contains(&attr.value()) {
            return Err(SchemaError::Invalid {
                path: path.to_string(),
                message: format!(
                    "attribute 'operation' on <{name}> must be one of merge|replace|remove, found '{}'",
                    attr.value()
                ),
            });
        }
    }

    for required in rule.required {
        if node.attribute(*required).is_none() {
            return Err(SchemaError::Invalid {
                path: path.to_string(),
                message: format!("<{name}> is missing required attribute '{required}'"),
            });
        }
    }

    for child in node.children() {
        if child.is_element() {
            let child_name = child.tag_name().name();
            if !rule.children.contains(&child_name) {
                return Err(SchemaError::Invalid {
                    path: path.to_string(),
                    message: format!("<{name}> may not contain <{child_name}>"),
                });
            }
            validate_element(child, path)?;
        } else if child.is_text() && !rule.allows_text {
            if child.text().map_or(false, |t| !t.trim().is_empty()) {
                return Err(SchemaError::Invalid {
                    path: path.to_string(),
                    message: format!("<{name}> may not contain text content"),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn check(xml: &str) -> Result<(), SchemaError> {
        validate(xml, &PathBuf::from("pages/test.page.xml"))
    }

    const VALID: &str = r#"
        <page schemaVersion="1.0.0" contentVersion="1.0.0" kind="blueprint"
              module="members" route="list" id="members-list">
          <region id="header">
            <component id="title" type="Heading">
              <prop name="text" value="Members"/>
            </component>
          </region>
          <dataSource id="membersFeed" kind="http" url="/api/members">
            <contract>{"rows": "array"}</contract>
          </dataSource>
          <action id="open" kind="navigate" target="/members/:id"/>
        </page>
    "#;

    #[test]
    fn accepts_well_formed_document() {
        assert!(check(VALID).is_ok());
    }

    #[test]
    fn rejects_non_xml() {
        let err = check("not xml at all").unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
        assert!(err.to_string().contains("test.page.xml"));
    }

    #[test]
    fn rejects_unknown_element() {
        let err = check(
            r#"<page schemaVersion="1.0.0" contentVersion="1.0.0" kind="blueprint"
                     module="m" route="r"><widget id="x"/></page>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("<widget>"));
    }

    #[test]
    fn rejects_missing_required_attribute() {
        let err = check(
            r#"<page schemaVersion="1.0.0" contentVersion="1.0.0" kind="blueprint"
                     module="m" route="r"><region><component id="c"/></region></page>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("required attribute 'id'"));
    }

    #[test]
    fn rejects_bad_kind_and_operation_values() {
        let err = check(
            r#"<page schemaVersion="1.0.0" contentVersion="1.0.0" kind="patch"
                     module="m" route="r"/>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("blueprint|overlay"));

        let err = check(
            r#"<page schemaVersion="1.0.0" contentVersion="1.0.0" kind="overlay"
                     module="m" route="r" tenant="acme">
                 <region id="main" operation="delete"/>
               </page>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("merge|replace|remove"));
    }

    #[test]
    fn data_source_config_attributes_are_open() {
        assert!(check(
            r#"<page schemaVersion="1.0.0" contentVersion="1.0.0" kind="blueprint"
                     module="m" route="r" id="p">
                 <dataSource id="feed" kind="http" url="/x" method="GET"/>
               </page>"#,
        )
        .is_ok());
    }

    #[test]
    fn rejects_stray_text() {
        let err = check(
            r#"<page schemaVersion="1.0.0" contentVersion="1.0.0" kind="blueprint"
                     module="m" route="r">stray</page>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("text content"));
    }
}
