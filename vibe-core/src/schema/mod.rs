//! Schema descriptors
//!
//! A descriptor names the shape of a session's root state so that a loaded
//! document can be checked before it is handed to the application.

mod app;

pub use app::{app_schema, create_initial_app_state, App, AppMetadata, APP_SCHEMA_ID};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Error types for schema validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Expected an object at {0}")]
    NotAnObject(String),
    #[error("Missing required field {0}")]
    MissingField(String),
    #[error("Field {path} should be {expected}")]
    WrongKind { path: String, expected: &'static str },
}

/// Type of a field's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    String,
    Node(NodeDescriptor),
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            FieldKind::String => "a string",
            FieldKind::Node(_) => "an object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub required: bool,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDescriptor {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            required: true,
            kind,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An object node: a name plus its fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    fn validate(&self, value: &Value, path: &str) -> Result<(), SchemaError> {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaError::NotAnObject(path.to_string()))?;

        for field in &self.fields {
            let field_path = if path.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", path, field.name)
            };

            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(SchemaError::MissingField(field_path));
                }
                None | Some(Value::Null) => {}
                Some(child) => match &field.kind {
                    FieldKind::String if child.is_string() => {}
                    FieldKind::Node(node) if child.is_object() => node.validate(child, &field_path)?,
                    kind => {
                        return Err(SchemaError::WrongKind {
                            path: field_path,
                            expected: kind.expected(),
                        })
                    }
                },
            }
        }

        Ok(())
    }
}

/// Identified root schema of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescriptor {
    pub id: String,
    pub root: NodeDescriptor,
}

impl SchemaDescriptor {
    pub fn new(id: impl Into<String>, root: NodeDescriptor) -> Self {
        Self {
            id: id.into(),
            root,
        }
    }

    /// Check `value` against the root node, recursively.
    ///
    /// Unknown fields are allowed so older clients can read newer documents.
    pub fn validate_root(&self, value: &Value) -> Result<(), SchemaError> {
        self.root.validate(value, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        let inner = NodeDescriptor::new(
            "Inner",
            vec![
                FieldDescriptor::required("title", FieldKind::String),
                FieldDescriptor::optional("note", FieldKind::String),
            ],
        );
        SchemaDescriptor::new(
            "test-schema",
            NodeDescriptor::new(
                "Root",
                vec![FieldDescriptor::required("inner", FieldKind::Node(inner))],
            ),
        )
    }

    #[test]
    fn test_valid_root() {
        let value = json!({ "inner": { "title": "t" } });
        assert_eq!(schema().validate_root(&value), Ok(()));

        let value = json!({ "inner": { "title": "t", "note": null, "extra": 1 } });
        assert_eq!(schema().validate_root(&value), Ok(()));
    }

    #[test]
    fn test_missing_nested_field_reports_path() {
        let value = json!({ "inner": { "note": "n" } });
        assert_eq!(
            schema().validate_root(&value),
            Err(SchemaError::MissingField("inner.title".to_string()))
        );
    }

    #[test]
    fn test_wrong_kind() {
        let value = json!({ "inner": { "title": 3 } });
        assert_eq!(
            schema().validate_root(&value),
            Err(SchemaError::WrongKind {
                path: "inner.title".to_string(),
                expected: "a string",
            })
        );

        let value = json!({ "inner": "flat" });
        assert!(matches!(
            schema().validate_root(&value),
            Err(SchemaError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_root_must_be_object() {
        assert_eq!(
            schema().validate_root(&json!([1, 2])),
            Err(SchemaError::NotAnObject(String::new()))
        );
    }
}
