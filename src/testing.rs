//! Testing utilities for the provider.
//!
//! [`FakeBuddyApi`] is an in-memory stand-in for the Buddy REST API and
//! [`ProviderTester`] drives a `ProviderService` without spinning up a gRPC
//! server.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pulumi_resource_buddy::provider::BuddyProvider;
//! use pulumi_resource_buddy::testing::{FakeBuddyApi, ProviderTester};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let fake = Arc::new(FakeBuddyApi::new());
//! let tester = ProviderTester::new(BuddyProvider::with_api(fake.clone()));
//! tester
//!     .configure(json!({"token": "t", "workspace": "acme"}))
//!     .await
//!     .unwrap();
//!
//! let urn = "urn:pulumi:dev::infra::buddy:index:Group::devs";
//! let created = tester
//!     .lifecycle_create(urn, json!({"name": "devs"}))
//!     .await
//!     .unwrap();
//! assert_eq!(created.id, "group:1");
//! # });
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::client::BuddyApi;
use crate::error::ProviderError;
use crate::properties::value_to_id;
use crate::server::ProviderService;
use crate::types::{CheckFailure, CheckResult, CreateResult, DiffResult, ReadResult};

/// One request seen by [`FakeBuddyApi`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// HTTP method.
    pub method: &'static str,
    /// Request path.
    pub path: String,
    /// JSON body, for `POST` and `PATCH`.
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct FakeState {
    objects: BTreeMap<String, Value>,
    failures: BTreeMap<String, (u16, String)>,
    calls: Vec<ApiCall>,
    next_id: u64,
}

/// In-memory Buddy API.
///
/// Objects are stored under their item path. `POST` assigns the object's key:
/// the body's own `id` when present (membership bindings), `name` for
/// projects, a generated `hash_id` for integrations and a sequential numeric
/// `id` otherwise.
#[derive(Debug, Default)]
pub struct FakeBuddyApi {
    state: Mutex<FakeState>,
}

impl FakeBuddyApi {
    /// An empty API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object at `path`.
    pub async fn insert(&self, path: impl Into<String>, value: Value) {
        self.state.lock().await.objects.insert(path.into(), value);
    }

    /// The object stored at `path`, if any.
    pub async fn object(&self, path: &str) -> Option<Value> {
        self.state.lock().await.objects.get(path).cloned()
    }

    /// Make every request to `path` fail with `status`.
    pub async fn fail_path(&self, path: impl Into<String>, status: u16, message: impl Into<String>) {
        self.state
            .lock()
            .await
            .failures
            .insert(path.into(), (status, message.into()));
    }

    /// Requests seen so far, oldest first.
    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().await.calls.clone()
    }

    async fn record(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        match state.failures.get(path) {
            Some((status, message)) => Err(ProviderError::from_status(*status, message.clone())),
            None => Ok(()),
        }
    }
}

fn not_found(path: &str) -> ProviderError {
    ProviderError::from_status(404, format!("{} not found", path))
}

#[async_trait]
impl BuddyApi for FakeBuddyApi {
    async fn get(&self, path: &str) -> Result<Value, ProviderError> {
        self.record("GET", path, None).await?;
        self.object(path).await.ok_or_else(|| not_found(path))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.record("POST", path, Some(body)).await?;
        let mut state = self.state.lock().await;
        let mut object = match body {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        let key = if let Some(id) = object.get("id").and_then(value_to_id) {
            id
        } else if path.ends_with("/projects") {
            object
                .get("name")
                .and_then(value_to_id)
                .ok_or_else(|| ProviderError::from_status(400, "name is required".to_string()))?
        } else if path.ends_with("/integrations") {
            state.next_id += 1;
            let hash_id = format!("hash{}", state.next_id);
            object.insert("hash_id".to_string(), Value::String(hash_id.clone()));
            hash_id
        } else {
            state.next_id += 1;
            object.insert("id".to_string(), Value::from(state.next_id));
            state.next_id.to_string()
        };

        let item_path = format!("{}/{}", path, key);
        if state.objects.contains_key(&item_path) {
            return Err(ProviderError::from_status(
                409,
                format!("{} already exists", item_path),
            ));
        }
        let object = Value::Object(object);
        state.objects.insert(item_path, object.clone());
        Ok(object)
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.record("PATCH", path, Some(body)).await?;
        let mut state = self.state.lock().await;
        let object = state.objects.get_mut(path).ok_or_else(|| not_found(path))?;
        if let (Some(target), Some(changes)) = (object.as_object_mut(), body.as_object()) {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(object.clone())
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.record("DELETE", path, None).await?;
        let mut state = self.state.lock().await;
        state
            .objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }
}

/// A test harness for provider implementations.
///
/// This wraps a `ProviderService` implementation and provides
/// simplified methods for testing without a gRPC server.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the failures if validation reports any.
    pub async fn check_config(&self, config: Value) -> Result<(), TestError> {
        let result = self
            .provider
            .check_config("", Value::Object(Map::new()), config)
            .await?;
        check_failures(result.failures)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), ProviderError> {
        self.provider.configure(config).await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Check proposed inputs, failing on validation failures.
    pub async fn check(&self, urn: &str, olds: Value, news: Value) -> Result<Value, TestError> {
        let CheckResult { inputs, failures } = self.provider.check(urn, olds, news).await?;
        check_failures(failures)?;
        Ok(inputs)
    }

    /// Check proposed inputs and return the raw result.
    pub async fn check_raw(
        &self,
        urn: &str,
        olds: Value,
        news: Value,
    ) -> Result<CheckResult, ProviderError> {
        self.provider.check(urn, olds, news).await
    }

    /// Diff proposed inputs against recorded state.
    pub async fn diff(
        &self,
        urn: &str,
        id: &str,
        props: Value,
        news: Value,
    ) -> Result<DiffResult, ProviderError> {
        self.provider.diff(urn, id, props, news).await
    }

    /// Create a resource.
    pub async fn create(
        &self,
        urn: &str,
        inputs: Value,
        preview: bool,
    ) -> Result<CreateResult, ProviderError> {
        self.provider.create(urn, inputs, preview).await
    }

    /// Read a resource.
    pub async fn read(
        &self,
        urn: &str,
        id: &str,
        props: Value,
    ) -> Result<Option<ReadResult>, ProviderError> {
        self.provider.read(urn, id, props).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        urn: &str,
        id: &str,
        olds: Value,
        news: Value,
        preview: bool,
    ) -> Result<Value, ProviderError> {
        self.provider.update(urn, id, olds, news, preview).await
    }

    /// Delete a resource.
    pub async fn delete(&self, urn: &str, id: &str, props: Value) -> Result<(), ProviderError> {
        self.provider.delete(urn, id, props).await
    }

    /// Call a function.
    pub async fn invoke(&self, token: &str, args: Value) -> Result<Value, ProviderError> {
        self.provider.invoke(token, args).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run the engine's create sequence: check → create.
    pub async fn lifecycle_create(&self, urn: &str, inputs: Value) -> Result<CreateResult, TestError> {
        let inputs = self.check(urn, Value::Object(Map::new()), inputs).await?;
        Ok(self.create(urn, inputs, false).await?)
    }

    /// Run the engine's update sequence: check → diff → update.
    ///
    /// `olds` are the previous inputs and `props` the recorded outputs.
    /// Returns the diff and, when the diff allows an in-place update, the new
    /// outputs.
    pub async fn lifecycle_update(
        &self,
        urn: &str,
        id: &str,
        olds: Value,
        props: Value,
        news: Value,
    ) -> Result<(DiffResult, Option<Value>), TestError> {
        let news = self.check(urn, olds.clone(), news).await?;
        let diff = self.diff(urn, id, props.clone(), news.clone()).await?;
        if diff.requires_replace() || diff.detailed_diff.is_empty() {
            return Ok((diff, None));
        }
        let outputs = self.update(urn, id, props, news, false).await?;
        Ok((diff, Some(outputs)))
    }
}

/// Error type for test operations that may fail with check failures.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed validation.
    Failures(Vec<CheckFailure>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Failures(failures) => {
                writeln!(f, "Check failed with {} failure(s):", failures.len())?;
                for failure in failures {
                    writeln!(f, "  {}: {}", failure.property, failure.reason)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_failures(failures: Vec<CheckFailure>) -> Result<(), TestError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(TestError::Failures(failures))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a diff found nothing to change.
///
/// # Panics
///
/// Panics if the diff reports any change.
pub fn assert_no_changes(diff: &DiffResult) {
    assert!(
        diff.detailed_diff.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        diff.detailed_diff.len(),
        diff.detailed_diff.keys().collect::<Vec<_>>()
    );
}

/// Assert that a diff replaces the resource because of exactly `fields`.
///
/// # Panics
///
/// Panics if the replace list differs.
pub fn assert_replaces(diff: &DiffResult, fields: &[&str]) {
    assert_eq!(
        diff.replaces, fields,
        "Expected replacement on {:?}, got {:?}",
        fields, diff.replaces
    );
}

/// Assert that a diff updates in place.
///
/// # Panics
///
/// Panics if the diff has no changes or requires replacement.
pub fn assert_updates_in_place(diff: &DiffResult) {
    assert!(
        !diff.detailed_diff.is_empty(),
        "Expected changes, but got none"
    );
    assert!(
        !diff.requires_replace(),
        "Expected an in-place update, but {:?} require replacement",
        diff.replaces
    );
}

/// Assert that check reported a failure on `property`.
///
/// # Panics
///
/// Panics if no failure names the property.
pub fn assert_failure_on(failures: &[CheckFailure], property: &str) {
    assert!(
        failures.iter().any(|f| f.property == property),
        "Expected a failure on '{}', got {:?}",
        property,
        failures.iter().map(|f| &f.property).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fake_assigns_keys() {
        let fake = FakeBuddyApi::new();

        let group = fake.post("/workspaces/acme/groups", &json!({"name": "a"})).await.unwrap();
        assert_eq!(group["id"], 1);

        let project = fake
            .post("/workspaces/acme/projects", &json!({"name": "demo"}))
            .await
            .unwrap();
        assert!(project.get("id").is_none());
        assert!(fake.object("/workspaces/acme/projects/demo").await.is_some());

        let integration = fake
            .post("/workspaces/acme/integrations", &json!({"type": "GIT_HUB"}))
            .await
            .unwrap();
        assert_eq!(integration["hash_id"], "hash2");

        let binding = fake
            .post("/workspaces/acme/groups/1/members", &json!({"id": 9}))
            .await
            .unwrap();
        assert_eq!(binding["id"], 9);
        assert!(fake.object("/workspaces/acme/groups/1/members/9").await.is_some());
    }

    #[tokio::test]
    async fn test_fake_conflicts_and_missing() {
        let fake = FakeBuddyApi::new();
        fake.post("/workspaces/acme/projects", &json!({"name": "demo"}))
            .await
            .unwrap();
        let err = fake
            .post("/workspaces/acme/projects", &json!({"name": "demo"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists(_)));

        assert!(fake.get("/nowhere").await.unwrap_err().is_not_found());
        assert!(fake.patch("/nowhere", &json!({})).await.unwrap_err().is_not_found());
        assert!(fake.delete("/nowhere").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_fake_patch_merges() {
        let fake = FakeBuddyApi::new();
        fake.insert("/workspaces/acme/members/3", json!({"id": 3, "admin": false}))
            .await;
        let patched = fake
            .patch("/workspaces/acme/members/3", &json!({"admin": true}))
            .await
            .unwrap();
        assert_eq!(patched, json!({"id": 3, "admin": true}));
    }

    #[tokio::test]
    async fn test_fake_injected_failure_and_call_log() {
        let fake = FakeBuddyApi::new();
        fake.fail_path("/workspaces/acme/groups", 429, "slow down").await;
        let err = fake
            .post("/workspaces/acme/groups", &json!({"name": "a"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ResourceExhausted(_)));

        let calls = fake.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].body, Some(json!({"name": "a"})));
    }

    #[test]
    fn test_assertion_helpers() {
        let mut diff = DiffResult::no_change();
        assert_no_changes(&diff);

        diff.diffs.push("name".to_string());
        diff.detailed_diff.insert(
            "name".to_string(),
            crate::types::PropertyDiff {
                kind: crate::types::PropertyDiffKind::Update,
                input_diff: true,
            },
        );
        assert_updates_in_place(&diff);

        diff.replaces.push("name".to_string());
        assert_replaces(&diff, &["name"]);

        let failures = vec![CheckFailure::new("email", "missing")];
        assert_failure_on(&failures, "email");
    }

    #[test]
    fn test_error_display() {
        let err = TestError::Failures(vec![CheckFailure::new("name", "Missing required property 'name'")]);
        let rendered = err.to_string();
        assert!(rendered.contains("1 failure"));
        assert!(rendered.contains("name: Missing"));

        let err: TestError = ProviderError::NotFound("gone".to_string()).into();
        assert!(err.to_string().contains("gone"));
    }
}
