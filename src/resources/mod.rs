//! Lifecycle handlers, one per resource kind.
//!
//! Each handler owns its kind's diff table and schema and translates
//! Create/Read/Update/Delete into Buddy REST calls. Handlers are stateless;
//! [`handler`] is the static registry the dispatcher routes through.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::Kind;
use crate::properties::{get_path, set_path_if_absent, value_to_id};
use crate::rules::DiffRules;
use crate::schema::ResourceSchema;
use crate::types::CreateResult;

pub mod action;
pub mod collection;
pub mod group;
pub mod group_member;
pub mod integration;
pub mod member;
pub mod permission;
pub mod pipeline;
pub mod project;
pub mod project_member;
pub mod ssh_key;
pub mod variable;
pub mod webhook;

/// CRUD for one resource kind.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// The kind this handler owns.
    fn kind(&self) -> Kind;

    /// The kind's diff table.
    fn rules(&self) -> &'static DiffRules;

    /// Input and output schema, without replacement markers.
    fn base_schema(&self) -> ResourceSchema;

    /// Schema with `replaceOnChanges` set from the diff table.
    fn schema(&self) -> ResourceSchema {
        self.base_schema()
            .mark_replace_on_changes(self.rules().replace_fields())
    }

    /// Create the remote object.
    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError>;

    /// Fetch the remote object's current outputs.
    async fn read(&self, client: &Client, id: &str, props: &Value) -> Result<Value, ProviderError>;

    /// Apply in-place changes and return the new outputs.
    async fn update(
        &self,
        client: &Client,
        id: &str,
        olds: &Value,
        news: &Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, client: &Client, id: &str, props: &Value) -> Result<(), ProviderError>;

    /// Rebuild inputs from outputs, for Read and import.
    fn inputs_from_outputs(&self, outputs: &Value) -> Value {
        self.rules().derive_inputs(outputs)
    }
}

/// Look up the handler for a kind.
pub fn handler(kind: Kind) -> &'static dyn ResourceHandler {
    match kind {
        Kind::Project => &project::ProjectHandler,
        Kind::Pipeline => &pipeline::PipelineHandler,
        Kind::Action => &action::ActionHandler,
        Kind::Member => &member::MemberHandler,
        Kind::Group => &group::HANDLER,
        Kind::Permission => &permission::HANDLER,
        Kind::Webhook => &webhook::HANDLER,
        Kind::Variable => &variable::VariableHandler,
        Kind::SshKey => &ssh_key::HANDLER,
        Kind::Integration => &integration::HANDLER,
        Kind::GroupMember => &group_member::GroupMemberHandler,
        Kind::ProjectMember => &project_member::ProjectMemberHandler,
    }
}

/// Copy the named fields out of `inputs`, skipping absent ones.
pub(crate) fn pick(inputs: &Value, fields: &[&str]) -> Value {
    let mut body = Map::new();
    for field in fields {
        if let Some(value) = get_path(inputs, &[*field]) {
            body.insert(field.to_string(), value.clone());
        }
    }
    Value::Object(body)
}

/// A required id-like input, rendered as a path segment.
pub(crate) fn require_id(inputs: &Value, field: &str) -> Result<String, ProviderError> {
    get_path(inputs, &[field])
        .and_then(value_to_id)
        .ok_or_else(|| ProviderError::Validation(format!("Missing required property '{}'", field)))
}

/// The id the API assigned, read from `key` of a response.
pub(crate) fn response_id(response: &Value, key: &str) -> Result<String, ProviderError> {
    get_path(response, &[key]).and_then(value_to_id).ok_or_else(|| {
        ProviderError::Validation(format!("Buddy API response has no '{}' field", key))
    })
}

/// A raw id segment as a JSON value: numeric when it parses as one.
pub(crate) fn id_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

/// Record containment context in outputs so diff rules can navigate it.
///
/// Values the API already returned at `path` win.
pub(crate) fn with_context(mut outputs: Value, path: &[&str], value: Value) -> Value {
    if !outputs.is_object() {
        outputs = Value::Object(Map::new());
    }
    set_path_if_absent(&mut outputs, path, value);
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_covers_every_kind() {
        for kind in Kind::ALL {
            assert_eq!(handler(kind).kind(), kind);
        }
    }

    #[test]
    fn test_schema_marks_replacement_fields() {
        for kind in Kind::ALL {
            let handler = handler(kind);
            let schema = handler.schema();
            for field in handler.rules().replace_fields() {
                let attr = schema
                    .inputs
                    .get(field)
                    .unwrap_or_else(|| panic!("{} schema lacks input '{}'", kind, field));
                assert!(attr.replace_on_changes, "{}.{}", kind, field);
            }
        }
    }

    #[test]
    fn test_every_rule_field_is_a_schema_input() {
        for kind in Kind::ALL {
            let handler = handler(kind);
            let schema = handler.base_schema();
            for rule in handler.rules().rules {
                assert!(
                    schema.inputs.contains_key(rule.field),
                    "{} rule '{}' has no schema input",
                    kind,
                    rule.field
                );
            }
        }
    }

    #[test]
    fn test_pick_skips_absent_and_null() {
        let inputs = json!({"name": "a", "description": null, "extra": 1});
        assert_eq!(pick(&inputs, &["name", "description", "missing"]), json!({"name": "a"}));
    }

    #[test]
    fn test_require_id() {
        let inputs = json!({"pipeline_id": 7, "project_name": "demo", "empty": ""});
        assert_eq!(require_id(&inputs, "pipeline_id").unwrap(), "7");
        assert_eq!(require_id(&inputs, "project_name").unwrap(), "demo");
        assert!(matches!(
            require_id(&inputs, "empty"),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn test_id_value() {
        assert_eq!(id_value("42"), json!(42));
        assert_eq!(id_value("web"), json!("web"));
    }

    #[test]
    fn test_with_context() {
        let outputs = json!({"id": 3, "project": {"name": "kept"}});
        let outputs = with_context(outputs, &["project", "name"], json!("ignored"));
        let outputs = with_context(outputs, &["pipeline", "id"], json!(7));
        assert_eq!(outputs["project"]["name"], "kept");
        assert_eq!(outputs["pipeline"]["id"], 7);
        assert_eq!(with_context(Value::Null, &["a"], json!(1)), json!({"a": 1}));
    }
}
