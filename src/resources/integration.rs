//! Third-party integrations.
//!
//! Integrations are addressed by `hash_id` rather than a numeric id, and
//! their credentials are write-only.

use crate::identity::Kind;
use crate::resources::collection::{CollectionHandler, Scope};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};

const FIELDS: &[&str] = &[
    "name",
    "type",
    "scope",
    "token",
    "access_key",
    "secret_key",
    "username",
    "password",
];

/// Integration diff table.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("name").mapped(&["name"]),
        FieldRule::new("type").mapped(&["type"]).replace(),
        FieldRule::new("scope").mapped(&["scope"]),
        FieldRule::new("token"),
        FieldRule::new("access_key"),
        FieldRule::new("secret_key"),
        FieldRule::new("username"),
        FieldRule::new("password"),
    ],
    stables: &["hash_id"],
    delete_before_replace: false,
};

/// Integration handler.
pub static HANDLER: CollectionHandler = CollectionHandler {
    kind: Kind::Integration,
    rules: &RULES,
    scope: Scope::Workspace,
    path: "/integrations",
    id_key: "hash_id",
    create_fields: FIELDS,
    update_fields: FIELDS,
    schema,
};

fn schema() -> ResourceSchema {
    ResourceSchema::new("A connection to a third-party service.")
        .with_input("name", Attribute::required_string())
        .with_input(
            "type",
            Attribute::required_string().with_description("Service type, e.g. GIT_HUB or AMAZON."),
        )
        .with_input(
            "scope",
            Attribute::optional_string()
                .with_description("PRIVATE, WORKSPACE, ADMIN, GROUP or PROJECT."),
        )
        .with_input("token", Attribute::optional_string().sensitive())
        .with_input("access_key", Attribute::optional_string().sensitive())
        .with_input("secret_key", Attribute::optional_string().sensitive())
        .with_input("username", Attribute::optional_string())
        .with_input("password", Attribute::optional_string().sensitive())
        .with_output("hash_id", Attribute::computed_string())
}
