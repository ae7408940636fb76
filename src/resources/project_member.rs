//! Project membership bindings.
//!
//! A member joins a project with a permission set. The id carries all three
//! ids so Read can restore the inputs without any other state.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{BindingId, Kind};
use crate::properties::get_path;
use crate::resources::{id_value, require_id, with_context, ResourceHandler};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};
use crate::types::CreateResult;

/// Project membership diff table.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("project_name").replace(),
        FieldRule::new("member_id").replace(),
        FieldRule::new("permission_id")
            .mapped(&["permission_set", "id"])
            .replace(),
    ],
    stables: &["id"],
    delete_before_replace: true,
};

const ARITY: usize = 3;

/// Project membership handler.
#[derive(Debug)]
pub struct ProjectMemberHandler;

struct Binding {
    project: String,
    member: String,
    permission: String,
}

impl Binding {
    fn from_inputs(inputs: &Value) -> Result<Self, ProviderError> {
        Ok(Self {
            project: require_id(inputs, "project_name")?,
            member: require_id(inputs, "member_id")?,
            permission: require_id(inputs, "permission_id")?,
        })
    }

    fn parse(id: &str) -> Result<Self, ProviderError> {
        let id = BindingId::parse(id, ARITY)?;
        match id.parts() {
            [project, member, permission] => Ok(Self {
                project: project.clone(),
                member: member.clone(),
                permission: permission.clone(),
            }),
            _ => Err(ProviderError::InvalidIdentifier(id.stringify())),
        }
    }

    fn id(&self) -> String {
        BindingId::new([
            self.project.as_str(),
            self.member.as_str(),
            self.permission.as_str(),
        ])
        .stringify()
    }

    fn collection(&self, client: &Client) -> String {
        client.workspace_path(&format!("/projects/{}/members", self.project))
    }

    fn path(&self, client: &Client) -> String {
        format!("{}/{}", self.collection(client), self.member)
    }

    fn enrich(&self, outputs: Value) -> Value {
        let outputs = with_context(outputs, &["project_name"], Value::from(self.project.as_str()));
        let outputs = with_context(outputs, &["member_id"], id_value(&self.member));
        with_context(outputs, &["permission_set", "id"], id_value(&self.permission))
    }
}

#[async_trait]
impl ResourceHandler for ProjectMemberHandler {
    fn kind(&self) -> Kind {
        Kind::ProjectMember
    }

    fn rules(&self) -> &'static DiffRules {
        &RULES
    }

    fn base_schema(&self) -> ResourceSchema {
        ResourceSchema::new("Membership of a workspace member in a project.")
            .with_input("project_name", Attribute::required_string())
            .with_input("member_id", Attribute::required_int())
            .with_input(
                "permission_id",
                Attribute::required_int().with_description("Permission set granted in the project."),
            )
            .with_output("email", Attribute::computed_string())
            .with_output("name", Attribute::computed_string())
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let binding = Binding::from_inputs(inputs)?;
        let body = json!({
            "id": id_value(&binding.member),
            "permission_set": {"id": id_value(&binding.permission)},
        });
        let response = client.post(&binding.collection(client), &body).await?;
        Ok(CreateResult::new(binding.id(), binding.enrich(response)))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        let binding = Binding::parse(id)?;
        let member = client.get(&binding.path(client)).await?;
        Ok(binding.enrich(member))
    }

    /// Every input replaces the binding, so there is nothing to send.
    async fn update(
        &self,
        client: &Client,
        id: &str,
        olds: &Value,
        _news: &Value,
    ) -> Result<Value, ProviderError> {
        self.read(client, id, olds).await
    }

    async fn delete(&self, client: &Client, id: &str, _props: &Value) -> Result<(), ProviderError> {
        let binding = Binding::parse(id)?;
        client.delete(&binding.path(client)).await
    }

    fn inputs_from_outputs(&self, outputs: &Value) -> Value {
        let mut inputs = match RULES.derive_inputs(outputs) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for field in ["project_name", "member_id"] {
            if let Some(value) = get_path(outputs, &[field]) {
                inputs.insert(field.to_string(), value.clone());
            }
        }
        Value::Object(inputs)
    }
}
