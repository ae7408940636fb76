//! Workspace members.
//!
//! Members are invited by email and cannot be renamed, so a new email means a
//! new member. Admin rights are granted with a follow-up `PATCH` because the
//! invite endpoint ignores them.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{CompositeId, Kind};
use crate::properties::get_path;
use crate::resources::{require_id, response_id, ResourceHandler};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, AttributeFlags, AttributeType, ResourceSchema};
use crate::types::CreateResult;

/// Member diff table.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("email").mapped(&["email"]).replace(),
        FieldRule::new("is_admin").mapped(&["admin"]),
    ],
    stables: &["id"],
    delete_before_replace: true,
};

/// Member handler.
#[derive(Debug)]
pub struct MemberHandler;

fn member_path(client: &Client, id: &str) -> Result<String, ProviderError> {
    let id = CompositeId::parse(id)?;
    let member = id.require(Kind::Member)?;
    Ok(client.workspace_path(&format!("/members/{}", member)))
}

fn is_admin(inputs: &Value) -> Option<bool> {
    get_path(inputs, &["is_admin"]).and_then(Value::as_bool)
}

fn computed_bool() -> Attribute {
    Attribute::new(AttributeType::Bool, AttributeFlags::computed())
}

#[async_trait]
impl ResourceHandler for MemberHandler {
    fn kind(&self) -> Kind {
        Kind::Member
    }

    fn rules(&self) -> &'static DiffRules {
        &RULES
    }

    fn base_schema(&self) -> ResourceSchema {
        ResourceSchema::new("A workspace member, invited by email.")
            .with_input("email", Attribute::required_string())
            .with_input(
                "is_admin",
                Attribute::optional_bool().with_description("Grant workspace administrator rights."),
            )
            .with_output("id", Attribute::computed_int())
            .with_output("name", Attribute::computed_string())
            .with_output("admin", computed_bool())
            .with_output("workspace_owner", computed_bool())
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let email = require_id(inputs, "email")?;
        let mut member = client
            .post(&client.workspace_path("/members"), &json!({ "email": email }))
            .await?;
        let id = CompositeId::single(Kind::Member, response_id(&member, "id")?).stringify();

        if is_admin(inputs) == Some(true) {
            debug!(member = %id, "Promoting member to admin");
            member = client
                .patch(&member_path(client, &id)?, &json!({ "admin": true }))
                .await?;
        }
        Ok(CreateResult::new(id, member))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        client.get(&member_path(client, id)?).await
    }

    async fn update(
        &self,
        client: &Client,
        id: &str,
        _olds: &Value,
        news: &Value,
    ) -> Result<Value, ProviderError> {
        let path = member_path(client, id)?;
        let admin = is_admin(news).unwrap_or(false);
        client.patch(&path, &json!({ "admin": admin })).await
    }

    async fn delete(&self, client: &Client, id: &str, _props: &Value) -> Result<(), ProviderError> {
        client.delete(&member_path(client, id)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBuddyApi;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_email_change_deletes_before_replacing() {
        let olds = json!({"email": "a@example.com", "is_admin": false});
        let news = json!({"email": "b@example.com", "is_admin": false});
        let props = json!({"id": 3, "email": "a@example.com", "admin": false});

        let result = RULES.evaluate(&olds, &news, &props);
        assert_eq!(result.replaces, vec!["email"]);
        assert!(result.delete_before_replace);
    }

    #[test]
    fn test_admin_drift_updates_in_place() {
        let inputs = json!({"email": "a@example.com", "is_admin": true});
        let props = json!({"id": 3, "email": "a@example.com", "admin": false});

        let result = RULES.evaluate(&inputs, &inputs, &props);
        assert!(result.diffs.is_empty());
        assert!(result.replaces.is_empty());
        assert!(result.detailed_diff.contains_key("is_admin"));
    }

    #[tokio::test]
    async fn test_create_promotes_admins() {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");

        let created = MemberHandler
            .create(&client, &json!({"email": "a@example.com", "is_admin": true}))
            .await
            .unwrap();
        assert_eq!(created.id, "member:1");
        assert_eq!(created.outputs["admin"], true);

        let calls = fake.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].body, Some(json!({"email": "a@example.com"})));
        assert_eq!(calls[1].method, "PATCH");
        assert_eq!(calls[1].path, "/workspaces/acme/members/1");
    }

    #[tokio::test]
    async fn test_create_without_admin_skips_patch() {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");

        MemberHandler
            .create(&client, &json!({"email": "a@example.com"}))
            .await
            .unwrap();
        assert_eq!(fake.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");
        fake.insert(
            "/workspaces/acme/members/9",
            json!({"id": 9, "email": "a@example.com", "admin": true}),
        )
        .await;

        let updated = MemberHandler
            .update(&client, "member:9", &json!({}), &json!({"email": "a@example.com"}))
            .await
            .unwrap();
        assert_eq!(updated["admin"], false);

        MemberHandler
            .delete(&client, "member:9", &updated)
            .await
            .unwrap();
        assert!(fake.object("/workspaces/acme/members/9").await.is_none());
    }
}
