//! Handler for flat REST collections.
//!
//! Groups, permission sets, webhooks, integrations and SSH keys all follow the
//! same shape: `POST` to a collection, then `GET`/`PATCH`/`DELETE` on
//! `<collection>/<id>`. They differ only in path, id field and payload.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{CompositeId, Kind};
use crate::resources::{pick, response_id, ResourceHandler};
use crate::rules::DiffRules;
use crate::schema::ResourceSchema;
use crate::types::CreateResult;

/// Where a collection is rooted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Under `/workspaces/{workspace}`.
    Workspace,
    /// Under `/user`, owned by the token's user.
    User,
}

/// A resource kind backed by one REST collection.
#[derive(Debug)]
pub struct CollectionHandler {
    /// Resource kind.
    pub kind: Kind,
    /// Diff table.
    pub rules: &'static DiffRules,
    /// Path root.
    pub scope: Scope,
    /// Collection path relative to the scope, e.g. `/groups`.
    pub path: &'static str,
    /// Response field holding the object's id.
    pub id_key: &'static str,
    /// Inputs sent on create.
    pub create_fields: &'static [&'static str],
    /// Inputs sent on update.
    pub update_fields: &'static [&'static str],
    /// Schema builder.
    pub schema: fn() -> ResourceSchema,
}

impl CollectionHandler {
    fn collection_path(&self, client: &Client) -> String {
        match self.scope {
            Scope::Workspace => client.workspace_path(self.path),
            Scope::User => format!("/user{}", self.path),
        }
    }

    fn item_path(&self, client: &Client, id: &str) -> Result<String, ProviderError> {
        let id = CompositeId::parse(id)?;
        if id.kind() != Some(self.kind) {
            return Err(ProviderError::InvalidIdentifier(format!(
                "'{}' is not a {} id",
                id, self.kind
            )));
        }
        let local = id.require(self.kind)?;
        Ok(format!("{}/{}", self.collection_path(client), local))
    }
}

#[async_trait]
impl ResourceHandler for CollectionHandler {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn rules(&self) -> &'static DiffRules {
        self.rules
    }

    fn base_schema(&self) -> ResourceSchema {
        (self.schema)()
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let body = pick(inputs, self.create_fields);
        let response = client.post(&self.collection_path(client), &body).await?;
        let local = response_id(&response, self.id_key)?;
        let id = CompositeId::single(self.kind, local);
        Ok(CreateResult::new(id.stringify(), response))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        client.get(&self.item_path(client, id)?).await
    }

    async fn update(
        &self,
        client: &Client,
        id: &str,
        _olds: &Value,
        news: &Value,
    ) -> Result<Value, ProviderError> {
        let body = pick(news, self.update_fields);
        client.patch(&self.item_path(client, id)?, &body).await
    }

    async fn delete(&self, client: &Client, id: &str, _props: &Value) -> Result<(), ProviderError> {
        client.delete(&self.item_path(client, id)?).await
    }
}
