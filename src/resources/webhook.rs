//! Workspace webhooks.

use crate::identity::Kind;
use crate::resources::collection::{CollectionHandler, Scope};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, AttributeFlags, AttributeType, ResourceSchema};

const FIELDS: &[&str] = &["events", "target_url", "secret_key", "projects"];

/// Webhook diff table. The secret key is never echoed back, so it is
/// compared between inputs only.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("events").mapped(&["events"]),
        FieldRule::new("target_url").mapped(&["target_url"]),
        FieldRule::new("secret_key"),
        FieldRule::new("projects").mapped(&["projects"]),
    ],
    stables: &["id"],
    delete_before_replace: false,
};

/// Webhook handler.
pub static HANDLER: CollectionHandler = CollectionHandler {
    kind: Kind::Webhook,
    rules: &RULES,
    scope: Scope::Workspace,
    path: "/webhooks",
    id_key: "id",
    create_fields: FIELDS,
    update_fields: FIELDS,
    schema,
};

fn schema() -> ResourceSchema {
    ResourceSchema::new("A webhook notified of workspace events.")
        .with_input(
            "events",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::required(),
            )
            .with_description("Events that trigger the webhook, e.g. PUSH or EXECUTION_FAILED."),
        )
        .with_input("target_url", Attribute::required_string())
        .with_input("secret_key", Attribute::optional_string().sensitive())
        .with_input(
            "projects",
            Attribute::optional_strings().with_description("Project names to limit the webhook to."),
        )
        .with_output("id", Attribute::computed_int())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::resources::ResourceHandler;
    use crate::testing::FakeBuddyApi;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_events_and_url_change_updates_in_place() {
        let olds = json!({"events": ["PUSH"], "target_url": "https://a.example/hook"});
        let news = json!({
            "events": ["PUSH", "EXECUTION_FAILED"],
            "target_url": "https://b.example/hook",
        });
        let props = json!({"id": 8, "events": ["PUSH"], "target_url": "https://a.example/hook"});

        let result = RULES.evaluate(&olds, &news, &props);
        assert_eq!(result.diffs, vec!["events", "target_url"]);
        assert!(result.replaces.is_empty());
    }

    #[test]
    fn test_secret_rotation_is_an_input_diff() {
        let olds = json!({"events": ["PUSH"], "secret_key": "a"});
        let news = json!({"events": ["PUSH"], "secret_key": "b"});
        let result = RULES.evaluate(&olds, &news, &json!({"events": ["PUSH"]}));
        assert_eq!(result.diffs, vec!["secret_key"]);
    }

    #[tokio::test]
    async fn test_create_sends_only_known_fields() {
        let fake = Arc::new(FakeBuddyApi::new());
        let client = Client::new(fake.clone(), "acme");
        HANDLER
            .create(
                &client,
                &json!({"kind": "webhook", "events": ["PUSH"], "target_url": "https://x"}),
            )
            .await
            .unwrap();
        let calls = fake.calls().await;
        assert_eq!(calls[0].path, "/workspaces/acme/webhooks");
        assert_eq!(
            calls[0].body,
            Some(json!({"events": ["PUSH"], "target_url": "https://x"}))
        );
    }
}
