//! Environment variables.
//!
//! Variables live in one workspace collection; a `project` object in the body
//! scopes one to a project. The id records that scope so Read can restore
//! `project.name` for diffing.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{CompositeId, Kind};
use crate::properties::get_path;
use crate::resources::{pick, response_id, with_context, ResourceHandler};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};
use crate::types::CreateResult;

const UPDATE_FIELDS: &[&str] = &["value", "settable", "description"];

/// Variable diff table. `value` is never echoed back unencrypted.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("key").mapped(&["key"]).replace(),
        FieldRule::new("value"),
        FieldRule::new("encrypted").mapped(&["encrypted"]).replace(),
        FieldRule::new("settable").mapped(&["settable"]),
        FieldRule::new("description").mapped(&["description"]),
        FieldRule::new("project_name")
            .mapped(&["project", "name"])
            .replace(),
    ],
    stables: &["id"],
    delete_before_replace: false,
};

/// Variable handler.
#[derive(Debug)]
pub struct VariableHandler;

struct VariableId {
    project: Option<String>,
    variable: String,
}

impl VariableId {
    fn parse(id: &str) -> Result<Self, ProviderError> {
        let id = CompositeId::parse(id)?;
        Ok(Self {
            project: id.get(Kind::Project).map(str::to_string),
            variable: id.require(Kind::Variable)?.to_string(),
        })
    }

    fn stringify(&self) -> String {
        match &self.project {
            Some(project) => CompositeId::single(Kind::Project, project.as_str())
                .child(Kind::Variable, self.variable.as_str())
                .stringify(),
            None => CompositeId::single(Kind::Variable, self.variable.as_str()).stringify(),
        }
    }

    fn path(&self, client: &Client) -> String {
        client.workspace_path(&format!("/variables/{}", self.variable))
    }

    fn enrich(&self, outputs: Value) -> Value {
        match &self.project {
            Some(project) => with_context(outputs, &["project", "name"], Value::from(project.as_str())),
            None => outputs,
        }
    }
}

fn project_name(inputs: &Value) -> Option<String> {
    get_path(inputs, &["project_name"])
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn create_body(inputs: &Value) -> Value {
    let mut body = match pick(inputs, &["key", "value", "encrypted", "settable", "description"]) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    body.insert("type".to_string(), Value::from("VAR"));
    if let Some(project) = project_name(inputs) {
        body.insert("project".to_string(), json!({ "name": project }));
    }
    Value::Object(body)
}

#[async_trait]
impl ResourceHandler for VariableHandler {
    fn kind(&self) -> Kind {
        Kind::Variable
    }

    fn rules(&self) -> &'static DiffRules {
        &RULES
    }

    fn base_schema(&self) -> ResourceSchema {
        ResourceSchema::new("An environment variable, workspace-wide or scoped to a project.")
            .with_input("key", Attribute::required_string())
            .with_input("value", Attribute::required_string().sensitive())
            .with_input("encrypted", Attribute::optional_bool())
            .with_input(
                "settable",
                Attribute::optional_bool().with_description("Whether executions may override the value."),
            )
            .with_input("description", Attribute::optional_string())
            .with_input(
                "project_name",
                Attribute::optional_string().with_description("Scope the variable to this project."),
            )
            .with_output("id", Attribute::computed_int())
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let response = client
            .post(&client.workspace_path("/variables"), &create_body(inputs))
            .await?;
        let id = VariableId {
            project: project_name(inputs),
            variable: response_id(&response, "id")?,
        };
        Ok(CreateResult::new(id.stringify(), id.enrich(response)))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        let id = VariableId::parse(id)?;
        let variable = client.get(&id.path(client)).await?;
        Ok(id.enrich(variable))
    }

    async fn update(
        &self,
        client: &Client,
        id: &str,
        _olds: &Value,
        news: &Value,
    ) -> Result<Value, ProviderError> {
        let id = VariableId::parse(id)?;
        let variable = client
            .patch(&id.path(client), &pick(news, UPDATE_FIELDS))
            .await?;
        Ok(id.enrich(variable))
    }

    async fn delete(&self, client: &Client, id: &str, _props: &Value) -> Result<(), ProviderError> {
        let id = VariableId::parse(id)?;
        client.delete(&id.path(client)).await
    }
}
