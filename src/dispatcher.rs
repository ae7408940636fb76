//! Routes lifecycle calls to per-kind handlers.
//!
//! The engine's Diff call does not carry the inputs it validated during
//! Check, so the dispatcher remembers Check's `olds` per urn and hands them to
//! the diff rules later. Urns are unique per resource instance, which keeps
//! concurrent check/diff pairs for different resources apart. Entries are
//! never evicted: one plugin process serves one deployment.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{type_from_urn, CompositeId, Kind};
use crate::properties::get_path;
use crate::resources::{handler, ResourceHandler};
use crate::types::{CheckResult, CreateResult, DiffResult, ReadResult};
use crate::validation::validate;

/// Payload field that names a resource's kind explicitly.
pub const KIND_FIELD: &str = "kind";

/// Kind-aware router with the urn-keyed olds cache.
#[derive(Debug, Default)]
pub struct Dispatcher {
    olds: RwLock<HashMap<String, Value>>,
}

impl Dispatcher {
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kind of a resource from its payload, falling back to the urn.
    pub fn kind_from_payload(urn: &str, payload: &Value) -> Result<Kind, ProviderError> {
        match get_path(payload, &[KIND_FIELD]).and_then(Value::as_str) {
            Some(slug) => slug.parse(),
            None => Self::kind_from_urn(urn),
        }
    }

    /// Kind of a resource from its id, falling back to the urn for binding ids.
    pub fn kind_from_id(urn: &str, id: &str) -> Result<Kind, ProviderError> {
        if CompositeId::is_composite(id) {
            CompositeId::parse(id)?
                .kind()
                .ok_or_else(|| ProviderError::InvalidIdentifier(id.to_string()))
        } else {
            Self::kind_from_urn(urn)
        }
    }

    fn kind_from_urn(urn: &str) -> Result<Kind, ProviderError> {
        let token = type_from_urn(urn)
            .ok_or_else(|| ProviderError::UnsupportedKind(format!("no type in urn '{}'", urn)))?;
        Kind::from_type_token(token).ok_or_else(|| ProviderError::UnsupportedKind(token.to_string()))
    }

    /// Remember `olds` for `urn`, validate `news` and accept it unchanged.
    pub async fn check(&self, urn: &str, olds: Value, news: Value) -> Result<CheckResult, ProviderError> {
        let kind = Self::kind_from_payload(urn, &news)?;
        let failures = validate(&handler(kind).schema(), &news);
        if !failures.is_empty() {
            debug!(urn, %kind, failures = failures.len(), "Check found invalid inputs");
        }

        self.olds.write().await.insert(urn.to_string(), olds);
        Ok(CheckResult {
            inputs: news,
            failures,
        })
    }

    /// The olds cached for `urn` by the last Check.
    pub async fn cached_olds(&self, urn: &str) -> Option<Value> {
        self.olds.read().await.get(urn).cloned()
    }

    /// Diff `news` against Check's olds and the recorded `props`.
    pub async fn diff(
        &self,
        urn: &str,
        id: &str,
        props: &Value,
        news: &Value,
    ) -> Result<DiffResult, ProviderError> {
        let kind = Self::kind_from_id(urn, id)?;
        let olds = self
            .cached_olds(urn)
            .await
            .ok_or_else(|| ProviderError::NoPriorCheck(urn.to_string()))?;

        let result = handler(kind).rules().evaluate(&olds, news, props);
        debug!(
            urn,
            %kind,
            diffs = ?result.diffs,
            replaces = ?result.replaces,
            "Diff computed"
        );
        Ok(result)
    }

    /// Create a resource. A preview echoes the inputs without an id.
    pub async fn create(
        &self,
        client: &Client,
        urn: &str,
        inputs: &Value,
        preview: bool,
    ) -> Result<CreateResult, ProviderError> {
        let kind = Self::kind_from_payload(urn, inputs)?;
        if preview {
            return Ok(CreateResult::new(String::new(), inputs.clone()));
        }
        let created = handler(kind).create(client, inputs).await?;
        info!(urn, %kind, id = %created.id, "Created resource");
        Ok(created)
    }

    /// Read a resource. `None` means it no longer exists.
    pub async fn read(
        &self,
        client: &Client,
        urn: &str,
        id: &str,
        props: &Value,
    ) -> Result<Option<ReadResult>, ProviderError> {
        let kind = Self::kind_from_id(urn, id)?;
        let handler = handler(kind);
        match handler.read(client, id, props).await {
            Ok(outputs) => Ok(Some(ReadResult {
                id: id.to_string(),
                inputs: handler.inputs_from_outputs(&outputs),
                outputs,
            })),
            Err(err) if err.is_not_found() => {
                info!(urn, id, "Resource no longer exists");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Update a resource in place. A preview echoes `news`.
    pub async fn update(
        &self,
        client: &Client,
        urn: &str,
        id: &str,
        olds: &Value,
        news: &Value,
        preview: bool,
    ) -> Result<Value, ProviderError> {
        let kind = Self::kind_from_id(urn, id)?;
        if preview {
            return Ok(news.clone());
        }
        let outputs = handler(kind).update(client, id, olds, news).await?;
        info!(urn, %kind, id, "Updated resource");
        Ok(outputs)
    }

    /// Delete a resource. One that is already gone counts as deleted.
    pub async fn delete(
        &self,
        client: &Client,
        urn: &str,
        id: &str,
        props: &Value,
    ) -> Result<(), ProviderError> {
        let kind = Self::kind_from_id(urn, id)?;
        match handler(kind).delete(client, id, props).await {
            Ok(()) => {
                info!(urn, %kind, id, "Deleted resource");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                warn!(urn, id, "Resource already deleted");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBuddyApi;
    use crate::types::DiffChanges;
    use serde_json::json;
    use std::sync::Arc;

    fn urn(type_name: &str, name: &str) -> String {
        format!("urn:pulumi:dev::infra::buddy:index:{}::{}", type_name, name)
    }

    fn fake_client() -> (Arc<FakeBuddyApi>, Client) {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");
        (fake, client)
    }

    #[test]
    fn test_kind_from_payload() {
        let group = urn("Group", "devs");
        assert_eq!(
            Dispatcher::kind_from_payload(&group, &json!({"name": "devs"})).unwrap(),
            Kind::Group
        );
        assert_eq!(
            Dispatcher::kind_from_payload(&group, &json!({"kind": "webhook"})).unwrap(),
            Kind::Webhook
        );
        assert!(matches!(
            Dispatcher::kind_from_payload(&group, &json!({"kind": "sandbox"})),
            Err(ProviderError::UnsupportedKind(_))
        ));
        assert!(matches!(
            Dispatcher::kind_from_payload(&urn("Sandbox", "x"), &json!({})),
            Err(ProviderError::UnsupportedKind(_))
        ));
    }

    #[test]
    fn test_kind_from_id() {
        let any = urn("Project", "x");
        assert_eq!(
            Dispatcher::kind_from_id(&any, "project:web/pipeline:3/action:9").unwrap(),
            Kind::Action
        );
        assert_eq!(
            Dispatcher::kind_from_id(&urn("GroupMember", "m"), "1~~~2").unwrap(),
            Kind::GroupMember
        );
        assert!(matches!(
            Dispatcher::kind_from_id(&any, "sandbox:1"),
            Err(ProviderError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_check_caches_olds_and_returns_news() {
        let dispatcher = Dispatcher::new();
        let urn = urn("Group", "devs");

        let result = dispatcher
            .check(&urn, json!({"name": "a"}), json!({"name": "b"}))
            .await
            .unwrap();
        assert_eq!(result.inputs, json!({"name": "b"}));
        assert!(result.failures.is_empty());
        assert_eq!(dispatcher.cached_olds(&urn).await, Some(json!({"name": "a"})));

        dispatcher
            .check(&urn, json!({"name": "c"}), json!({"name": "d"}))
            .await
            .unwrap();
        assert_eq!(dispatcher.cached_olds(&urn).await, Some(json!({"name": "c"})));
    }

    #[tokio::test]
    async fn test_check_reports_failures_but_keeps_news() {
        let dispatcher = Dispatcher::new();
        let news = json!({"description": 3});
        let result = dispatcher
            .check(&urn("Group", "devs"), json!({}), news.clone())
            .await
            .unwrap();
        assert_eq!(result.inputs, news);
        let properties: Vec<&str> = result.failures.iter().map(|f| f.property.as_str()).collect();
        assert_eq!(properties, vec!["description", "name"]);
    }

    #[tokio::test]
    async fn test_diff_without_check_fails() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .diff(&urn("Group", "devs"), "group:1", &json!({}), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoPriorCheck(_)));
    }

    #[tokio::test]
    async fn test_action_rename_scenario() {
        let dispatcher = Dispatcher::new();
        let urn = urn("Action", "upload");
        let news = json!({
            "project_name": "test123 NEW",
            "pipeline_id": 1,
            "name": "test123 NEW",
            "type": "AMAZON_S3",
        });
        let props = json!({
            "project": {"name": "test123"},
            "pipeline": {"id": 1},
            "name": "test123",
            "type": "AMAZON_S3",
        });

        dispatcher.check(&urn, news.clone(), news.clone()).await.unwrap();
        let diff = dispatcher
            .diff(&urn, "project:test123/pipeline:1/action:5", &props, &news)
            .await
            .unwrap();
        assert!(diff.diffs.is_empty());
        assert_eq!(diff.replaces, vec!["name", "project_name"]);
        assert!(!diff.delete_before_replace);
    }

    #[tokio::test]
    async fn test_variable_scenario() {
        let dispatcher = Dispatcher::new();
        let urn = urn("Variable", "env");
        let olds = json!({"project": {"name": "test123"}, "key": "test", "value": "test123"});
        let news = json!({"project_name": "test123 NEW", "key": "test", "value": "test123 NEW"});

        dispatcher.check(&urn, olds.clone(), news.clone()).await.unwrap();
        let diff = dispatcher
            .diff(&urn, "project:test123/variable:2", &olds, &news)
            .await
            .unwrap();
        assert_eq!(diff.diffs, vec!["value", "project_name"]);
        assert_eq!(diff.replaces, vec!["project_name"]);
    }

    #[tokio::test]
    async fn test_group_member_scenario() {
        let dispatcher = Dispatcher::new();
        let urn = urn("GroupMember", "binding");

        dispatcher
            .check(
                &urn,
                json!({"group_id": 1, "member_id": 1}),
                json!({"group_id": 1, "member_id": 2}),
            )
            .await
            .unwrap();
        let diff = dispatcher
            .diff(&urn, "1~~~1", &json!({"id": 1}), &json!({"group_id": 1, "member_id": 2}))
            .await
            .unwrap();
        assert_eq!(diff.changes, DiffChanges::Some);
        assert_eq!(diff.diffs, vec!["member_id"]);
        assert_eq!(diff.replaces, vec!["member_id"]);
        assert!(diff.delete_before_replace);
    }

    #[tokio::test]
    async fn test_concurrent_checks_do_not_collide() {
        let dispatcher = Arc::new(Dispatcher::new());
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let urn = urn("Group", &format!("g{}", i));
                    dispatcher
                        .check(&urn, json!({"name": format!("old{}", i)}), json!({"name": "new"}))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        for i in 0..16 {
            let olds = dispatcher.cached_olds(&urn("Group", &format!("g{}", i))).await;
            assert_eq!(olds, Some(json!({"name": format!("old{}", i)})));
        }
    }

    #[tokio::test]
    async fn test_preview_never_calls_the_api() {
        let dispatcher = Dispatcher::new();
        let (fake, client) = fake_client();
        let urn = urn("Group", "devs");

        let created = dispatcher
            .create(&client, &urn, &json!({"name": "devs"}), true)
            .await
            .unwrap();
        assert_eq!(created.id, "");
        assert_eq!(created.outputs, json!({"name": "devs"}));

        let updated = dispatcher
            .update(&client, &urn, "group:1", &json!({}), &json!({"name": "ops"}), true)
            .await
            .unwrap();
        assert_eq!(updated, json!({"name": "ops"}));
        assert!(fake.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_read_of_vanished_resource_is_none() {
        let dispatcher = Dispatcher::new();
        let (_fake, client) = fake_client();
        let read = dispatcher
            .read(&client, &urn("Group", "devs"), "group:404", &json!({}))
            .await
            .unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_read_reconstructs_inputs() {
        let dispatcher = Dispatcher::new();
        let (fake, client) = fake_client();
        fake.insert(
            "/workspaces/acme/projects/web/pipelines/3",
            json!({"id": 3, "name": "build", "on": "CLICK"}),
        )
        .await;

        let read = dispatcher
            .read(&client, &urn("Pipeline", "build"), "project:web/pipeline:3", &json!({}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.id, "project:web/pipeline:3");
        assert_eq!(
            read.inputs,
            json!({"name": "build", "project_name": "web", "on": "CLICK"})
        );
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_resources() {
        let dispatcher = Dispatcher::new();
        let (fake, client) = fake_client();
        dispatcher
            .delete(&client, &urn("Group", "devs"), "group:8", &json!({}))
            .await
            .unwrap();

        fake.fail_path("/workspaces/acme/groups/9", 403, "forbidden").await;
        let err = dispatcher
            .delete(&client, &urn("Group", "devs"), "group:9", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }
}
