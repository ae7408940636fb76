//! Declarative diff tables.
//!
//! Every resource kind describes which of its fields matter as a `const`
//! [`DiffRules`] table. The table is the single source of truth for diffing,
//! for the schema's `replaceOnChanges` markers and for rebuilding inputs from
//! recorded outputs on Read.

use serde_json::{Map, Value};

use crate::differ::Differ;
use crate::properties::{get_path, set_path_if_absent};
use crate::types::DiffResult;

/// One field comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Input field name.
    pub field: &'static str,
    /// Where the same value lives in recorded state, if anywhere.
    pub mapped: Option<&'static [&'static str]>,
    /// Whether a change forces replacement.
    pub replace: bool,
}

impl FieldRule {
    /// A rule that compares `field` between the checked olds and the news only.
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            mapped: None,
            replace: false,
        }
    }

    /// Also compare against recorded state at `path`.
    pub const fn mapped(self, path: &'static [&'static str]) -> Self {
        Self {
            mapped: Some(path),
            ..self
        }
    }

    /// Changes to this field force replacement.
    pub const fn replace(self) -> Self {
        Self {
            replace: true,
            ..self
        }
    }
}

/// A kind's complete diff specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRules {
    /// Field comparisons, in reporting order.
    pub rules: &'static [FieldRule],
    /// Fields reported as stable.
    pub stables: &'static [&'static str],
    /// Whether replacement deletes before it creates.
    pub delete_before_replace: bool,
}

impl DiffRules {
    /// Run the table through a [`Differ`].
    pub fn evaluate(&self, olds: &Value, news: &Value, props: &Value) -> DiffResult {
        let mut differ = Differ::new(olds, news, props);
        for rule in self.rules {
            differ.diff(&[rule.field], rule.mapped, rule.replace);
        }
        differ
            .add_stable(self.stables.iter().copied())
            .set_delete_before_replace(self.delete_before_replace)
            .to_response()
    }

    /// Names of the fields whose change forces replacement.
    pub fn replace_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules
            .iter()
            .filter(|rule| rule.replace)
            .map(|rule| rule.field)
    }

    /// Rebuild user inputs from recorded outputs.
    ///
    /// Only mapped fields can be recovered; secrets the API never echoes
    /// stay absent.
    pub fn derive_inputs(&self, outputs: &Value) -> Value {
        let mut inputs = Value::Object(Map::new());
        for rule in self.rules {
            if let Some(path) = rule.mapped {
                if let Some(value) = get_path(outputs, path) {
                    set_path_if_absent(&mut inputs, &[rule.field], value.clone());
                }
            }
        }
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiffChanges, PropertyDiffKind};
    use serde_json::json;

    const RULES: DiffRules = DiffRules {
        rules: &[
            FieldRule::new("name").mapped(&["name"]).replace(),
            FieldRule::new("project_name")
                .mapped(&["project", "name"])
                .replace(),
            FieldRule::new("description").mapped(&["description"]),
            FieldRule::new("secret"),
        ],
        stables: &["id"],
        delete_before_replace: false,
    };

    #[test]
    fn test_builder() {
        let rule = FieldRule::new("email").mapped(&["email"]).replace();
        assert_eq!(rule.field, "email");
        assert_eq!(rule.mapped, Some(&["email"][..]));
        assert!(rule.replace);

        let rule = FieldRule::new("pipeline_id").mapped(&["pipeline", "id"]);
        assert_eq!(rule.mapped, Some(&["pipeline", "id"][..]));
        assert!(!rule.replace);
    }

    #[test]
    fn test_evaluate_no_change() {
        let bag = json!({"name": "a", "project_name": "p", "description": "d"});
        let props = json!({"name": "a", "project": {"name": "p"}, "description": "d"});
        let result = RULES.evaluate(&bag, &bag, &props);
        assert_eq!(result.changes, DiffChanges::None);
        assert!(result.replaces.is_empty());
        assert_eq!(result.stables, vec!["id"]);
    }

    #[test]
    fn test_evaluate_reports_in_rule_order() {
        let olds = json!({"name": "a", "description": "x", "secret": "s1"});
        let news = json!({"secret": "s2", "description": "y", "name": "b"});
        let result = RULES.evaluate(&olds, &news, &json!({}));
        assert_eq!(result.diffs, vec!["name", "description", "secret"]);
        assert_eq!(result.replaces, vec!["name"]);
    }

    #[test]
    fn test_evaluate_ignores_unlisted_fields() {
        let olds = json!({"name": "a", "color": "red"});
        let news = json!({"name": "a", "color": "blue"});
        let result = RULES.evaluate(&olds, &news, &json!({"name": "a"}));
        assert_eq!(result.changes, DiffChanges::None);
    }

    #[test]
    fn test_evaluate_drift_only_in_recorded_state() {
        let bag = json!({"project_name": "new"});
        let props = json!({"project": {"name": "old"}});
        let result = RULES.evaluate(&bag, &bag, &props);
        assert!(result.diffs.is_empty());
        assert_eq!(result.replaces, vec!["project_name"]);
        assert_eq!(
            result.detailed_diff["project_name"].kind,
            PropertyDiffKind::UpdateReplace
        );
    }

    #[test]
    fn test_replace_fields() {
        let fields: Vec<_> = RULES.replace_fields().collect();
        assert_eq!(fields, vec!["name", "project_name"]);
    }

    #[test]
    fn test_derive_inputs() {
        let outputs = json!({
            "id": 4,
            "name": "api",
            "project": {"name": "demo"},
            "description": null,
            "secret": "never echoed",
        });
        let inputs = RULES.derive_inputs(&outputs);
        assert_eq!(inputs, json!({"name": "api", "project_name": "demo"}));
    }
}
