//! Group membership bindings.

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

/// Group membership diff table. Both ends are identity.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("group_id").replace(),
        FieldRule::new("member_id").replace(),
    ],
    stables: &["id"],
    delete_before_replace: true,
};

const ARITY: usize = 2;

/// Group membership handler.
#[derive(Debug)]
pub struct GroupMemberHandler;

/// The two ends of a membership.
struct Binding {
    group: String,
    member: String,
}

impl Binding {
    fn parse(id: &str) -> Result<Self, ProviderError> {
        let id = BindingId::parse(id, ARITY)?;
        match id.parts() {
            [group, member] => Ok(Self {
                group: group.clone(),
                member: member.clone(),
            }),
            _ => Err(ProviderError::InvalidIdentifier(id.stringify())),
        }
    }

    fn id(&self) -> String {
        BindingId::new([self.group.as_str(), self.member.as_str()]).stringify()
    }

    fn path(&self, client: &Client) -> String {
        client.workspace_path(&format!("/groups/{}/members/{}", self.group, self.member))
    }

    fn enrich(&self, outputs: Value) -> Value {
        let outputs = with_context(outputs, &["group_id"], id_value(&self.group));
        with_context(outputs, &["member_id"], id_value(&self.member))
    }
}

#[async_trait]
impl ResourceHandler for GroupMemberHandler {
    fn kind(&self) -> Kind {
        Kind::GroupMember
    }

    fn rules(&self) -> &'static DiffRules {
        &RULES
    }

    fn base_schema(&self) -> ResourceSchema {
        ResourceSchema::new("Membership of a workspace member in a group.")
            .with_input("group_id", Attribute::required_int())
            .with_input("member_id", Attribute::required_int())
            .with_output("email", Attribute::computed_string())
            .with_output("name", Attribute::computed_string())
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let group = require_id(inputs, "group_id")?;
        let member = require_id(inputs, "member_id")?;
        let collection = client.workspace_path(&format!("/groups/{}/members", group));
        let response = client
            .post(&collection, &json!({ "id": id_value(&member) }))
            .await?;

        let binding = Binding { group, member };
        Ok(CreateResult::new(binding.id(), binding.enrich(response)))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        let binding = Binding::parse(id)?;
        let member = client.get(&binding.path(client)).await?;
        Ok(binding.enrich(member))
    }

    /// Nothing updates in place; every input change replaces the binding.
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
        let mut inputs = Map::new();
        for field in ["group_id", "member_id"] {
            if let Some(value) = get_path(outputs, &[field]) {
                inputs.insert(field.to_string(), value.clone());
            }
        }
        Value::Object(inputs)
    }
}
