//! Permission sets.

use crate::identity::Kind;
use crate::resources::collection::{CollectionHandler, Scope};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::{Attribute, ResourceSchema};

const FIELDS: &[&str] = &[
    "name",
    "description",
    "pipeline_access_level",
    "repository_access_level",
    "sandbox_access_level",
    "project_team_access_level",
];

/// Permission set diff table. Every field updates in place.
pub const RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("name").mapped(&["name"]),
        FieldRule::new("description").mapped(&["description"]),
        FieldRule::new("pipeline_access_level").mapped(&["pipeline_access_level"]),
        FieldRule::new("repository_access_level").mapped(&["repository_access_level"]),
        FieldRule::new("sandbox_access_level").mapped(&["sandbox_access_level"]),
        FieldRule::new("project_team_access_level").mapped(&["project_team_access_level"]),
    ],
    stables: &["id"],
    delete_before_replace: false,
};

/// Permission set handler.
pub static HANDLER: CollectionHandler = CollectionHandler {
    kind: Kind::Permission,
    rules: &RULES,
    scope: Scope::Workspace,
    path: "/permissions",
    id_key: "id",
    create_fields: FIELDS,
    update_fields: FIELDS,
    schema,
};

fn access_level(description: &str) -> Attribute {
    Attribute::optional_string().with_description(description)
}

fn schema() -> ResourceSchema {
    ResourceSchema::new("A permission set assigning access levels to project members.")
        .with_input("name", Attribute::required_string())
        .with_input("description", Attribute::optional_string())
        .with_input(
            "pipeline_access_level",
            access_level("DENIED, READ_ONLY, RUN_ONLY or READ_WRITE."),
        )
        .with_input(
            "repository_access_level",
            access_level("DENIED, READ_ONLY or READ_WRITE."),
        )
        .with_input(
            "sandbox_access_level",
            access_level("DENIED, READ_ONLY or READ_WRITE."),
        )
        .with_input(
            "project_team_access_level",
            access_level("READ_ONLY or MANAGE."),
        )
        .with_output("id", Attribute::computed_int())
        .with_output("type", Attribute::computed_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_level_change_updates_in_place() {
        let olds = json!({"name": "dev", "pipeline_access_level": "READ_ONLY"});
        let news = json!({"name": "dev", "pipeline_access_level": "RUN_ONLY"});
        let props = json!({"id": 2, "name": "dev", "pipeline_access_level": "READ_ONLY"});

        let result = RULES.evaluate(&olds, &news, &props);
        assert_eq!(result.diffs, vec!["pipeline_access_level"]);
        assert!(result.replaces.is_empty());
    }

    #[test]
    fn test_server_defaults_do_not_diff() {
        let bag = json!({"name": "dev"});
        let props = json!({"id": 2, "name": "dev", "sandbox_access_level": "DENIED"});
        let result = RULES.evaluate(&bag, &bag, &props);
        assert!(result.detailed_diff.is_empty());
    }
}
