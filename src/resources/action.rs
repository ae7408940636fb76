//! Pipeline actions.
//!
//! Actions carry many type-specific settings (a `BUILD` action has a docker
//! image, an `AMAZON_S3` action a bucket). Only the common fields are diffed;
//! everything else in the inputs passes through to the API untouched.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{CompositeId, Kind};
use crate::resources::{id_value, require_id, response_id, with_context, ResourceHandler};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};
use crate::types::CreateResult;

/// Inputs that address the action rather than configure it.
const ADDRESS_FIELDS: &[&str] = &["kind", "project_name", "pipeline_id"];

/// Action diff table.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("name").mapped(&["name"]).replace(),
        FieldRule::new("project_name")
            .mapped(&["project", "name"])
            .replace(),
        FieldRule::new("pipeline_id")
            .mapped(&["pipeline", "id"])
            .replace(),
        FieldRule::new("type").mapped(&["type"]).replace(),
        FieldRule::new("trigger_time").mapped(&["trigger_time"]),
        FieldRule::new("disabled").mapped(&["disabled"]),
    ],
    stables: &["id"],
    delete_before_replace: false,
};

/// Action handler.
#[derive(Debug)]
pub struct ActionHandler;

struct ActionPath {
    project: String,
    pipeline: String,
    action: Option<String>,
}

impl ActionPath {
    fn from_inputs(inputs: &Value) -> Result<Self, ProviderError> {
        Ok(Self {
            project: require_id(inputs, "project_name")?,
            pipeline: require_id(inputs, "pipeline_id")?,
            action: None,
        })
    }

    fn from_id(id: &str) -> Result<Self, ProviderError> {
        let id = CompositeId::parse(id)?;
        Ok(Self {
            project: id.require(Kind::Project)?.to_string(),
            pipeline: id.require(Kind::Pipeline)?.to_string(),
            action: Some(id.require(Kind::Action)?.to_string()),
        })
    }

    fn path(&self, client: &Client) -> String {
        let collection = client.workspace_path(&format!(
            "/projects/{}/pipelines/{}/actions",
            self.project, self.pipeline
        ));
        match &self.action {
            Some(action) => format!("{}/{}", collection, action),
            None => collection,
        }
    }

    fn id(&self, action: String) -> String {
        CompositeId::single(Kind::Project, self.project.as_str())
            .child(Kind::Pipeline, self.pipeline.as_str())
            .child(Kind::Action, action)
            .stringify()
    }

    /// Record the containment path in outputs.
    fn enrich(&self, outputs: Value) -> Value {
        let outputs = with_context(outputs, &["project", "name"], Value::from(self.project.as_str()));
        with_context(outputs, &["pipeline", "id"], id_value(&self.pipeline))
    }
}

/// Everything but the addressing inputs.
fn action_body(inputs: &Value) -> Value {
    let body: Map<String, Value> = inputs
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(key, value)| !ADDRESS_FIELDS.contains(&key.as_str()) && !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(body)
}

#[async_trait]
impl ResourceHandler for ActionHandler {
    fn kind(&self) -> Kind {
        Kind::Action
    }

    fn rules(&self) -> &'static DiffRules {
        &RULES
    }

    fn base_schema(&self) -> ResourceSchema {
        ResourceSchema::new("An action inside a pipeline. Type-specific settings pass through.")
            .with_input("name", Attribute::required_string())
            .with_input("project_name", Attribute::required_string())
            .with_input("pipeline_id", Attribute::required_int())
            .with_input(
                "type",
                Attribute::required_string().with_description("Action type, e.g. BUILD or AMAZON_S3."),
            )
            .with_input(
                "trigger_time",
                Attribute::optional_string().with_description("ON_EVERY_EXECUTION, ON_FAILURE or ON_BACK_TO_SUCCESS."),
            )
            .with_input("disabled", Attribute::optional_bool())
            .with_output("id", Attribute::computed_int())
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let address = ActionPath::from_inputs(inputs)?;
        let response = client
            .post(&address.path(client), &action_body(inputs))
            .await?;
        let id = address.id(response_id(&response, "id")?);
        Ok(CreateResult::new(id, address.enrich(response)))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        let address = ActionPath::from_id(id)?;
        let action = client.get(&address.path(client)).await?;
        Ok(address.enrich(action))
    }

    async fn update(
        &self,
        client: &Client,
        id: &str,
        _olds: &Value,
        news: &Value,
    ) -> Result<Value, ProviderError> {
        let address = ActionPath::from_id(id)?;
        let action = client
            .patch(&address.path(client), &action_body(news))
            .await?;
        Ok(address.enrich(action))
    }

    async fn delete(&self, client: &Client, id: &str, _props: &Value) -> Result<(), ProviderError> {
        let address = ActionPath::from_id(id)?;
        client.delete(&address.path(client)).await
    }

    fn inputs_from_outputs(&self, outputs: &Value) -> Value {
        let mut inputs = RULES.derive_inputs(outputs);
        // Type-specific settings are inputs too.
        if let (Some(target), Some(source)) = (inputs.as_object_mut(), outputs.as_object()) {
            for (key, value) in source {
                let derived_elsewhere =
                    matches!(key.as_str(), "id" | "url" | "html_url" | "project" | "pipeline");
                if !derived_elsewhere && !value.is_null() {
                    target.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBuddyApi;
    use crate::types::DiffChanges;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_rename_and_reproject_replaces_without_input_diffs() {
        let props = json!({
            "project": {"name": "test123"},
            "pipeline": {"id": 1},
            "name": "test123",
            "type": "AMAZON_S3",
        });
        let news = json!({
            "project_name": "test123 NEW",
            "pipeline_id": 1,
            "name": "test123 NEW",
            "type": "AMAZON_S3",
        });

        let result = RULES.evaluate(&news, &news, &props);
        assert_eq!(result.changes, DiffChanges::Some);
        assert!(result.diffs.is_empty());
        assert_eq!(result.replaces, vec!["name", "project_name"]);
        assert!(!result.delete_before_replace);
    }

    #[test]
    fn test_action_body_strips_addressing() {
        let inputs = json!({
            "kind": "action",
            "project_name": "web",
            "pipeline_id": 3,
            "name": "upload",
            "type": "AMAZON_S3",
            "bucket_name": "artifacts",
            "local_path": null,
        });
        assert_eq!(
            action_body(&inputs),
            json!({"name": "upload", "type": "AMAZON_S3", "bucket_name": "artifacts"})
        );
    }

    #[test]
    fn test_inputs_from_outputs_keeps_type_settings() {
        let outputs = json!({
            "id": 5,
            "project": {"name": "web"},
            "pipeline": {"id": 3},
            "name": "upload",
            "type": "AMAZON_S3",
            "bucket_name": "artifacts",
        });
        let inputs = ActionHandler.inputs_from_outputs(&outputs);
        assert_eq!(
            inputs,
            json!({
                "name": "upload",
                "project_name": "web",
                "pipeline_id": 3,
                "type": "AMAZON_S3",
                "bucket_name": "artifacts",
            })
        );
    }

    #[tokio::test]
    async fn test_crud() {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");

        let created = ActionHandler
            .create(
                &client,
                &json!({
                    "project_name": "web",
                    "pipeline_id": 3,
                    "name": "build",
                    "type": "BUILD",
                    "docker_image_name": "library/node",
                }),
            )
            .await
            .unwrap();
        assert_eq!(created.id, "project:web/pipeline:3/action:1");
        assert_eq!(created.outputs["project"]["name"], "web");
        assert_eq!(created.outputs["pipeline"]["id"], 3);
        assert_eq!(created.outputs["docker_image_name"], "library/node");

        let path = "/workspaces/acme/projects/web/pipelines/3/actions/1";
        assert!(fake.object(path).await.is_some());

        let updated = ActionHandler
            .update(
                &client,
                &created.id,
                &json!({}),
                &json!({"name": "build", "type": "BUILD", "disabled": true}),
            )
            .await
            .unwrap();
        assert_eq!(updated["disabled"], true);

        ActionHandler
            .delete(&client, &created.id, &updated)
            .await
            .unwrap();
        assert!(fake.object(path).await.is_none());
    }
}
