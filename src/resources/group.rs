//! Workspace groups.

use crate::identity::Kind;
use crate::resources::collection::{CollectionHandler, Scope};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};

/// Group diff table. Renames update in place.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("name").mapped(&["name"]),
        FieldRule::new("description").mapped(&["description"]),
    ],
    stables: &["id"],
    delete_before_replace: false,
};

/// Group handler.
pub static HANDLER: CollectionHandler = CollectionHandler {
    kind: Kind::Group,
    rules: &RULES,
    scope: Scope::Workspace,
    path: "/groups",
    id_key: "id",
    create_fields: &["name", "description"],
    update_fields: &["name", "description"],
    schema,
};

fn schema() -> ResourceSchema {
    ResourceSchema::new("A group of workspace members.")
        .with_input("name", Attribute::required_string())
        .with_input("description", Attribute::optional_string())
        .with_output("id", Attribute::computed_int())
        .with_output("url", Attribute::computed_string())
        .with_output("html_url", Attribute::computed_string())
}
