//! Root schema of the collaborative workspace.
//!
//! To extend it, add a field to [`App`] (and its descriptor in
//! [`app_schema`]) and give it a default in [`create_initial_app_state`].

use super::{FieldDescriptor, FieldKind, NodeDescriptor, SchemaDescriptor};
use serde::{Deserialize, Serialize};

pub const APP_SCHEMA_ID: &str = "95f2e010-5c4a-4b3f-bf1f-1e5d3867c9c1";

/// Session-level metadata shown in the header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
}

/// Root of the shared state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub metadata: AppMetadata,
}

pub fn app_schema() -> SchemaDescriptor {
    let metadata = NodeDescriptor::new(
        "AppMetadata",
        vec![
            FieldDescriptor::required("title", FieldKind::String)
                .with_description("Primary title shown in the template header or navigation."),
            FieldDescriptor::optional("tagline", FieldKind::String)
                .with_description("Short description that sets the vibe for collaborators."),
        ],
    );

    SchemaDescriptor::new(
        APP_SCHEMA_ID,
        NodeDescriptor::new(
            "App",
            vec![FieldDescriptor::required("metadata", FieldKind::Node(metadata))],
        ),
    )
}

/// Seed for a freshly created session
pub fn create_initial_app_state() -> App {
    App {
        metadata: AppMetadata {
            title: "New vibe session".to_string(),
            tagline: Some("Sketch ideas, explore concepts, and ship together.".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_matches_schema() {
        let value = serde_json::to_value(create_initial_app_state()).unwrap();
        assert_eq!(app_schema().validate_root(&value), Ok(()));
    }

    #[test]
    fn test_tagline_is_optional() {
        let value = serde_json::json!({ "metadata": { "title": "Plain" } });
        assert_eq!(app_schema().validate_root(&value), Ok(()));

        let app: App = serde_json::from_value(value).unwrap();
        assert_eq!(app.metadata.tagline, None);
    }

    #[test]
    fn test_schema_id() {
        assert_eq!(app_schema().id, APP_SCHEMA_ID);
        assert_eq!(app_schema().root.name, "App");
    }
}
