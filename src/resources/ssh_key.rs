//! SSH keys of the token's user.

use crate::identity::Kind;
use crate::resources::collection::{CollectionHandler, Scope};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};

/// SSH key diff table. New key material means a new key, and the old key
/// has to go first.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("title").mapped(&["title"]),
        FieldRule::new("content").mapped(&["content"]).replace(),
    ],
    stables: &["id"],
    delete_before_replace: true,
};

/// SSH key handler.
pub static HANDLER: CollectionHandler = CollectionHandler {
    kind: Kind::SshKey,
    rules: &RULES,
    scope: Scope::User,
    path: "/keys",
    id_key: "id",
    create_fields: &["title", "content"],
    update_fields: &["title"],
    schema,
};

fn schema() -> ResourceSchema {
    ResourceSchema::new("A public SSH key of the authenticated user.")
        .with_input("title", Attribute::optional_string())
        .with_input(
            "content",
            Attribute::required_string().with_description("Public key in OpenSSH format."),
        )
        .with_output("id", Attribute::computed_int())
}
