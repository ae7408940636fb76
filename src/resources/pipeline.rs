//! Pipelines.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{CompositeId, Kind};
use crate::resources::{pick, require_id, response_id, with_context, ResourceHandler};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, AttributeFlags, AttributeType, ResourceSchema};
use crate::types::CreateResult;

const FIELDS: &[&str] = &[
    "name",
    "on",
    "refs",
    "events",
    "trigger_mode",
    "always_from_scratch",
    "priority",
    "disabled",
];

/// Pipeline diff table. Moving a pipeline to another project replaces it.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("name").mapped(&["name"]),
        FieldRule::new("project_name")
            .mapped(&["project", "name"])
            .replace(),
        FieldRule::new("on").mapped(&["on"]),
        FieldRule::new("refs").mapped(&["refs"]),
        FieldRule::new("events").mapped(&["events"]),
        FieldRule::new("trigger_mode").mapped(&["trigger_mode"]),
        FieldRule::new("always_from_scratch").mapped(&["always_from_scratch"]),
        FieldRule::new("priority").mapped(&["priority"]),
        FieldRule::new("disabled").mapped(&["disabled"]),
    ],
    stables: &["id"],
    delete_before_replace: false,
};

/// Pipeline handler.
#[derive(Debug)]
pub struct PipelineHandler;

fn collection_path(client: &Client, project: &str) -> String {
    client.workspace_path(&format!("/projects/{}/pipelines", project))
}

fn item_path(client: &Client, id: &str) -> Result<String, ProviderError> {
    let id = CompositeId::parse(id)?;
    let project = id.require(Kind::Project)?;
    let pipeline = id.require(Kind::Pipeline)?;
    Ok(format!("{}/{}", collection_path(client, project), pipeline))
}

fn with_project(outputs: Value, id: &str) -> Result<Value, ProviderError> {
    let id = CompositeId::parse(id)?;
    let project = id.require(Kind::Project)?;
    Ok(with_context(outputs, &["project", "name"], Value::from(project)))
}

#[async_trait]
impl ResourceHandler for PipelineHandler {
    fn kind(&self) -> Kind {
        Kind::Pipeline
    }

    fn rules(&self) -> &'static DiffRules {
        &RULES
    }

    fn base_schema(&self) -> ResourceSchema {
        ResourceSchema::new("A pipeline inside a project.")
            .with_input("name", Attribute::required_string())
            .with_input("project_name", Attribute::required_string())
            .with_input(
                "on",
                Attribute::required_string().with_description("CLICK, EVENT or SCHEDULE."),
            )
            .with_input("refs", Attribute::optional_strings())
            .with_input(
                "events",
                Attribute::new(
                    AttributeType::list(AttributeType::Dynamic),
                    AttributeFlags::optional(),
                ),
            )
            .with_input(
                "trigger_mode",
                Attribute::optional_string().with_description("MANUAL, ON_EVERY_PUSH or SCHEDULED."),
            )
            .with_input("always_from_scratch", Attribute::optional_bool())
            .with_input(
                "priority",
                Attribute::optional_string().with_description("LOW, NORMAL or HIGH."),
            )
            .with_input("disabled", Attribute::optional_bool())
            .with_output("id", Attribute::computed_int())
            .with_output("html_url", Attribute::computed_string())
            .with_output("last_execution_status", Attribute::computed_string())
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let project = require_id(inputs, "project_name")?;
        let body = pick(inputs, FIELDS);
        let response = client
            .post(&collection_path(client, &project), &body)
            .await?;
        let id = CompositeId::single(Kind::Project, project)
            .child(Kind::Pipeline, response_id(&response, "id")?)
            .stringify();
        let outputs = with_project(response, &id)?;
        Ok(CreateResult::new(id, outputs))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        let pipeline = client.get(&item_path(client, id)?).await?;
        with_project(pipeline, id)
    }

    async fn update(
        &self,
        client: &Client,
        id: &str,
        _olds: &Value,
        news: &Value,
    ) -> Result<Value, ProviderError> {
        let body = pick(news, FIELDS);
        let pipeline = client.patch(&item_path(client, id)?, &body).await?;
        with_project(pipeline, id)
    }

    async fn delete(&self, client: &Client, id: &str, _props: &Value) -> Result<(), ProviderError> {
        client.delete(&item_path(client, id)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBuddyApi;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_project_move_replaces_via_nested_path() {
        let olds = json!({"name": "build", "project_name": "web", "on": "CLICK"});
        let news = json!({"name": "build", "project_name": "api", "on": "CLICK"});
        let props = json!({"id": 7, "name": "build", "project": {"name": "web"}, "on": "CLICK"});

        let result = RULES.evaluate(&olds, &news, &props);
        assert_eq!(result.diffs, vec!["project_name"]);
        assert_eq!(result.replaces, vec!["project_name"]);
    }

    #[test]
    fn test_matching_nested_project_is_not_a_diff() {
        let bag = json!({"name": "build", "project_name": "web", "on": "CLICK"});
        let props = json!({"id": 7, "name": "build", "project": {"name": "web"}, "on": "CLICK"});
        let result = RULES.evaluate(&bag, &bag, &props);
        assert!(result.detailed_diff.is_empty());
        assert_eq!(result.stables, vec!["id"]);
    }

    #[tokio::test]
    async fn test_crud_records_project_context() {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");

        let created = PipelineHandler
            .create(
                &client,
                &json!({"name": "build", "project_name": "web", "on": "CLICK"}),
            )
            .await
            .unwrap();
        assert_eq!(created.id, "project:web/pipeline:1");
        assert_eq!(created.outputs["project"]["name"], "web");
        assert!(created.outputs.get("project_name").is_none());
        assert!(fake
            .object("/workspaces/acme/projects/web/pipelines/1")
            .await
            .is_some());

        let read = PipelineHandler
            .read(&client, &created.id, &json!({}))
            .await
            .unwrap();
        assert_eq!(read["project"]["name"], "web");

        let updated = PipelineHandler
            .update(
                &client,
                &created.id,
                &json!({}),
                &json!({"name": "build", "project_name": "web", "on": "EVENT"}),
            )
            .await
            .unwrap();
        assert_eq!(updated["on"], "EVENT");

        PipelineHandler
            .delete(&client, &created.id, &updated)
            .await
            .unwrap();
        assert!(fake
            .object("/workspaces/acme/projects/web/pipelines/1")
            .await
            .is_none());
    }
}
