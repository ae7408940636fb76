//! The Buddy provider.
//!
//! [`BuddyProvider`] ties configuration, the dispatcher and the REST client
//! together behind [`ProviderService`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::client::{BuddyApi, Client, HttpBuddyApi};
use crate::config::{ProviderConfig, CONFIG_RULES};
use crate::dispatcher::Dispatcher;
use crate::error::ProviderError;
use crate::identity::{Kind, PACKAGE};
use crate::invoke::{invoke, Function};
use crate::resources::handler;
use crate::schema::PackageSchema;
use crate::server::ProviderService;
use crate::types::{CheckResult, CreateResult, DiffResult, ReadResult, PLUGIN_VERSION};

/// Pulumi resource provider for Buddy.works.
pub struct BuddyProvider {
    dispatcher: Dispatcher,
    client: RwLock<Option<Client>>,
    api: Option<Arc<dyn BuddyApi>>,
}

impl Default for BuddyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BuddyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuddyProvider")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl BuddyProvider {
    /// A provider that talks HTTPS to the configured API.
    pub fn new() -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            client: RwLock::new(None),
            api: None,
        }
    }

    /// A provider that sends every request to `api` instead of over HTTPS.
    pub fn with_api(api: Arc<dyn BuddyApi>) -> Self {
        Self {
            api: Some(api),
            ..Self::new()
        }
    }

    async fn client(&self) -> Result<Client, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }
}

#[async_trait::async_trait]
impl ProviderService for BuddyProvider {
    fn schema(&self) -> PackageSchema {
        let mut schema = PackageSchema::new(PACKAGE, PLUGIN_VERSION);
        for (name, attr) in ProviderConfig::schema() {
            schema = schema.with_config(name, attr);
        }
        for kind in Kind::ALL {
            schema = schema.with_resource(kind.type_token(), handler(kind).schema());
        }
        for function in Function::ALL {
            schema = schema.with_function(function.token(), function.schema());
        }
        schema
    }

    async fn check_config(&self, _urn: &str, _olds: Value, news: Value) -> Result<CheckResult, ProviderError> {
        let failures = ProviderConfig::check(&news);
        Ok(CheckResult {
            inputs: news,
            failures,
        })
    }

    async fn diff_config(&self, _urn: &str, olds: Value, news: Value) -> Result<DiffResult, ProviderError> {
        Ok(CONFIG_RULES.evaluate(&olds, &news, &olds))
    }

    async fn configure(&self, config: Value) -> Result<(), ProviderError> {
        let config = ProviderConfig::from_value(&config)?;
        let api: Arc<dyn BuddyApi> = match &self.api {
            Some(api) => Arc::clone(api),
            None => Arc::new(HttpBuddyApi::new(&config)?),
        };
        info!(workspace = %config.workspace, api_url = %config.api_url, "Provider configured");
        *self.client.write().await = Some(Client::new(api, config.workspace));
        Ok(())
    }

    async fn invoke(&self, token: &str, args: Value) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        invoke(&client, token, &args).await
    }

    async fn check(&self, urn: &str, olds: Value, news: Value) -> Result<CheckResult, ProviderError> {
        self.dispatcher.check(urn, olds, news).await
    }

    async fn diff(&self, urn: &str, id: &str, props: Value, news: Value) -> Result<DiffResult, ProviderError> {
        self.dispatcher.diff(urn, id, &props, &news).await
    }

    async fn create(&self, urn: &str, inputs: Value, preview: bool) -> Result<CreateResult, ProviderError> {
        let client = self.client().await?;
        self.dispatcher.create(&client, urn, &inputs, preview).await
    }

    async fn read(&self, urn: &str, id: &str, props: Value) -> Result<Option<ReadResult>, ProviderError> {
        let client = self.client().await?;
        self.dispatcher.read(&client, urn, id, &props).await
    }

    async fn update(
        &self,
        urn: &str,
        id: &str,
        olds: Value,
        news: Value,
        preview: bool,
    ) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        self.dispatcher
            .update(&client, urn, id, &olds, &news, preview)
            .await
    }

    async fn delete(&self, urn: &str, id: &str, props: Value) -> Result<(), ProviderError> {
        let client = self.client().await?;
        self.dispatcher.delete(&client, urn, id, &props).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_failure_on, assert_no_changes, assert_replaces, assert_updates_in_place,
        FakeBuddyApi, ProviderTester, TestError,
    };
    use serde_json::json;

    fn urn(type_name: &str, name: &str) -> String {
        format!("urn:pulumi:dev::infra::buddy:index:{}::{}", type_name, name)
    }

    async fn configured() -> (Arc<FakeBuddyApi>, ProviderTester<BuddyProvider>) {
        let fake = Arc::new(FakeBuddyApi::new());
        let tester = ProviderTester::new(BuddyProvider::with_api(fake.clone()));
        tester
            .configure(json!({"token": "t", "workspace": "acme"}))
            .await
            .unwrap();
        (fake, tester)
    }

    #[test]
    fn test_schema_lists_every_kind_and_function() {
        let schema = BuddyProvider::new().schema();
        assert_eq!(schema.resources.len(), Kind::ALL.len());
        assert_eq!(schema.functions.len(), Function::ALL.len());
        assert!(schema.config.contains_key("token"));

        let json = schema.to_pulumi_json();
        let project = &json["resources"]["buddy:index:Project"];
        assert_eq!(project["inputProperties"]["name"]["replaceOnChanges"], true);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_refuses_api_calls() {
        let tester = ProviderTester::new(BuddyProvider::new());
        let err = tester
            .create(&urn("Group", "devs"), json!({"name": "devs"}), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_check_config_reports_missing_workspace() {
        let tester = ProviderTester::new(BuddyProvider::new());
        match tester.check_config(json!({"token": "t"})).await {
            Err(TestError::Failures(failures)) => assert_failure_on(&failures, "workspace"),
            other => panic!("expected failures, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_diff_config_replaces_on_workspace_change() {
        let provider = BuddyProvider::new();
        let diff = provider
            .diff_config(
                "",
                json!({"token": "t", "workspace": "acme"}),
                json!({"token": "t", "workspace": "other"}),
            )
            .await
            .unwrap();
        assert_replaces(&diff, &["workspace"]);

        let diff = provider
            .diff_config(
                "",
                json!({"token": "t", "workspace": "acme"}),
                json!({"token": "u", "workspace": "acme"}),
            )
            .await
            .unwrap();
        assert_updates_in_place(&diff);
    }

    #[tokio::test]
    async fn test_group_lifecycle() {
        let (fake, tester) = configured().await;
        let urn = urn("Group", "devs");

        let created = tester
            .lifecycle_create(&urn, json!({"name": "devs"}))
            .await
            .unwrap();
        assert_eq!(created.id, "group:1");

        let (diff, _) = tester
            .lifecycle_update(
                &urn,
                &created.id,
                json!({"name": "devs"}),
                created.outputs.clone(),
                json!({"name": "devs"}),
            )
            .await
            .unwrap();
        assert_no_changes(&diff);

        let (diff, outputs) = tester
            .lifecycle_update(
                &urn,
                &created.id,
                json!({"name": "devs"}),
                created.outputs.clone(),
                json!({"name": "engineers"}),
            )
            .await
            .unwrap();
        assert_updates_in_place(&diff);
        assert_eq!(outputs.unwrap()["name"], "engineers");

        let read = tester
            .read(&urn, &created.id, json!({}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.inputs, json!({"name": "engineers"}));

        tester.delete(&urn, &created.id, read.outputs).await.unwrap();
        assert!(fake.object("/workspaces/acme/groups/1").await.is_none());
        assert!(tester.read(&urn, &created.id, json!({})).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_rename_replaces() {
        let (_fake, tester) = configured().await;
        let urn = urn("Project", "web");

        let created = tester
            .lifecycle_create(&urn, json!({"name": "web", "display_name": "Web"}))
            .await
            .unwrap();
        assert_eq!(created.id, "project:web");

        let (diff, outputs) = tester
            .lifecycle_update(
                &urn,
                &created.id,
                json!({"name": "web", "display_name": "Web"}),
                created.outputs,
                json!({"name": "site", "display_name": "Web"}),
            )
            .await
            .unwrap();
        assert_replaces(&diff, &["name"]);
        assert!(outputs.is_none());
    }

    #[tokio::test]
    async fn test_check_rejects_invalid_inputs() {
        let (_fake, tester) = configured().await;
        let result = tester
            .check_raw(&urn("Webhook", "hook"), json!({}), json!({"events": "PUSH"}))
            .await
            .unwrap();
        assert_failure_on(&result.failures, "events");
        assert_failure_on(&result.failures, "target_url");
    }

    #[tokio::test]
    async fn test_invoke_get_project() {
        let (fake, tester) = configured().await;
        fake.insert(
            "/workspaces/acme/projects/web",
            json!({"name": "web", "display_name": "Web", "status": "ACTIVE"}),
        )
        .await;

        let project = tester
            .invoke("buddy:index:getProject", json!({"name": "web"}))
            .await
            .unwrap();
        assert_eq!(project["display_name"], "Web");
    }
}
