//! Projects.
//!
//! A project is addressed by its `name` (the URL slug), so the name is both
//! the identity and a replacement trigger. Freshly created projects clone
//! their repository in the background; create waits until that settles.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::ProviderError;
use crate::identity::{CompositeId, Kind};
use crate::properties::get_path;
use crate::resources::{pick, require_id, ResourceHandler};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};
use crate::types::CreateResult;

const CREATE_FIELDS: &[&str] = &[
    "name",
    "display_name",
    "access",
    "allow_pull_requests",
    "fetch_submodules",
];
const UPDATE_FIELDS: &[&str] = &[
    "display_name",
    "access",
    "allow_pull_requests",
    "fetch_submodules",
];

/// How many times create polls a project that is still provisioning.
pub const READY_POLL_ATTEMPTS: u32 = 10;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Project diff table.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("name").mapped(&["name"]).replace(),
        FieldRule::new("display_name").mapped(&["display_name"]),
        FieldRule::new("access").mapped(&["access"]),
        FieldRule::new("allow_pull_requests").mapped(&["allow_pull_requests"]),
        FieldRule::new("fetch_submodules").mapped(&["fetch_submodules"]),
    ],
    stables: &["name"],
    delete_before_replace: false,
};

/// Project handler.
#[derive(Debug)]
pub struct ProjectHandler;

fn project_path(client: &Client, id: &str) -> Result<String, ProviderError> {
    let id = CompositeId::parse(id)?;
    let name = id.require(Kind::Project)?;
    Ok(client.workspace_path(&format!("/projects/{}", name)))
}

fn is_provisioning(project: &Value) -> bool {
    match get_path(project, &["status"]).and_then(Value::as_str) {
        None => false,
        Some(status) => !matches!(status, "ACTIVE" | "CLOSED"),
    }
}

#[async_trait]
impl ResourceHandler for ProjectHandler {
    fn kind(&self) -> Kind {
        Kind::Project
    }

    fn rules(&self) -> &'static DiffRules {
        &RULES
    }

    fn base_schema(&self) -> ResourceSchema {
        ResourceSchema::new("A Buddy project.")
            .with_input(
                "name",
                Attribute::required_string().with_description("URL-safe project name."),
            )
            .with_input("display_name", Attribute::required_string())
            .with_input(
                "access",
                Attribute::optional_string().with_description("PRIVATE or PUBLIC."),
            )
            .with_input("allow_pull_requests", Attribute::optional_bool())
            .with_input("fetch_submodules", Attribute::optional_bool())
            .with_output("status", Attribute::computed_string())
            .with_output("html_url", Attribute::computed_string())
            .with_output("create_date", Attribute::computed_string())
    }

    async fn create(&self, client: &Client, inputs: &Value) -> Result<CreateResult, ProviderError> {
        let name = require_id(inputs, "name")?;
        let body = pick(inputs, CREATE_FIELDS);
        let mut project = client
            .post(&client.workspace_path("/projects"), &body)
            .await?;

        let id = CompositeId::single(Kind::Project, &name).stringify();
        let path = project_path(client, &id)?;
        let mut attempts = 0;
        while is_provisioning(&project) {
            attempts += 1;
            if attempts > READY_POLL_ATTEMPTS {
                warn!(project = %name, "Project still provisioning, giving up waiting");
                break;
            }
            debug!(project = %name, attempt = attempts, "Waiting for project to become active");
            tokio::time::sleep(READY_POLL_INTERVAL).await;
            project = client.get(&path).await?;
        }

        Ok(CreateResult::new(id, project))
    }

    async fn read(&self, client: &Client, id: &str, _props: &Value) -> Result<Value, ProviderError> {
        client.get(&project_path(client, id)?).await
    }

    async fn update(
        &self,
        client: &Client,
        id: &str,
        _olds: &Value,
        news: &Value,
    ) -> Result<Value, ProviderError> {
        let body = pick(news, UPDATE_FIELDS);
        client.patch(&project_path(client, id)?, &body).await
    }

    async fn delete(&self, client: &Client, id: &str, _props: &Value) -> Result<(), ProviderError> {
        client.delete(&project_path(client, id)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BuddyApi;
    use crate::testing::FakeBuddyApi;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_rename_replaces_and_name_is_stable() {
        let olds = json!({"name": "demo", "display_name": "Demo"});
        let news = json!({"name": "demo2", "display_name": "Demo"});
        let props = json!({"name": "demo", "display_name": "Demo", "status": "ACTIVE"});

        let result = RULES.evaluate(&olds, &news, &props);
        assert_eq!(result.diffs, vec!["name"]);
        assert_eq!(result.replaces, vec!["name"]);
        assert_eq!(result.stables, vec!["name"]);
    }

    #[test]
    fn test_display_name_updates_in_place() {
        let olds = json!({"name": "demo", "display_name": "Demo"});
        let news = json!({"name": "demo", "display_name": "Demo project"});
        let result = RULES.evaluate(&olds, &news, &olds);
        assert_eq!(result.diffs, vec!["display_name"]);
        assert!(result.replaces.is_empty());
    }

    #[test]
    fn test_is_provisioning() {
        assert!(!is_provisioning(&json!({"name": "demo"})));
        assert!(!is_provisioning(&json!({"status": "ACTIVE"})));
        assert!(!is_provisioning(&json!({"status": "CLOSED"})));
        assert!(is_provisioning(&json!({"status": "CLONING"})));
    }

    /// Reports CLONING until it has been polled twice.
    #[derive(Default)]
    struct SlowCloneApi {
        polls: AtomicU32,
    }

    #[async_trait]
    impl BuddyApi for SlowCloneApi {
        async fn get(&self, _path: &str) -> Result<Value, ProviderError> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if polls < 2 { "CLONING" } else { "ACTIVE" };
            Ok(json!({"name": "demo", "status": status}))
        }

        async fn post(&self, _path: &str, _body: &Value) -> Result<Value, ProviderError> {
            Ok(json!({"name": "demo", "status": "CLONING"}))
        }

        async fn patch(&self, _path: &str, _body: &Value) -> Result<Value, ProviderError> {
            Err(ProviderError::Unimplemented("patch".to_string()))
        }

        async fn delete(&self, _path: &str) -> Result<(), ProviderError> {
            Err(ProviderError::Unimplemented("delete".to_string()))
        }
    }

    #[tokio::test]
    async fn test_create_waits_until_active() {
        let api = Arc::new(SlowCloneApi::default());
        let client = Client::new(api.clone(), "acme");
        let created = ProjectHandler
            .create(&client, &json!({"name": "demo", "display_name": "Demo"}))
            .await
            .unwrap();
        assert_eq!(created.outputs["status"], "ACTIVE");
        assert_eq!(api.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_crud() {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");

        let created = ProjectHandler
            .create(&client, &json!({"name": "demo", "display_name": "Demo"}))
            .await
            .unwrap();
        assert_eq!(created.id, "project:demo");
        assert_eq!(created.outputs["display_name"], "Demo");

        let updated = ProjectHandler
            .update(
                &client,
                &created.id,
                &json!({}),
                &json!({"name": "demo", "display_name": "Renamed"}),
            )
            .await
            .unwrap();
        assert_eq!(updated["display_name"], "Renamed");
        let calls = fake.calls().await;
        assert_eq!(calls[1].method, "PATCH");
        assert_eq!(calls[1].body, Some(json!({"display_name": "Renamed"})));

        ProjectHandler.delete(&client, &created.id, &updated).await.unwrap();
        assert!(ProjectHandler
            .read(&client, &created.id, &json!({}))
            .await
            .unwrap_err()
            .is_not_found());
    }
}
