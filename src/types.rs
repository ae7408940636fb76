//! Convenience types for provider implementations.
//!
//! These types provide a more ergonomic API over the raw protobuf types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::generated::{diff_response, property_diff};
use crate::properties::value_to_struct;

/// Overall verdict of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffChanges {
    /// No compared field changed.
    None,
    /// At least one compared field changed.
    Some,
}

/// How a single property changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyDiffKind {
    /// The property was added.
    Add,
    /// The property was added and forces replacement.
    AddReplace,
    /// The property was removed.
    Delete,
    /// The property was removed and forces replacement.
    DeleteReplace,
    /// The property changed value.
    Update,
    /// The property changed value and forces replacement.
    UpdateReplace,
}

impl PropertyDiffKind {
    /// Classify a change from presence of the old and new values.
    pub fn classify(had_old: bool, has_new: bool, replace: bool) -> Self {
        match (had_old, has_new, replace) {
            (false, _, false) => Self::Add,
            (false, _, true) => Self::AddReplace,
            (true, false, false) => Self::Delete,
            (true, false, true) => Self::DeleteReplace,
            (true, true, false) => Self::Update,
            (true, true, true) => Self::UpdateReplace,
        }
    }

    /// Whether this change forces replacement.
    pub fn is_replace(self) -> bool {
        matches!(
            self,
            Self::AddReplace | Self::DeleteReplace | Self::UpdateReplace
        )
    }
}

impl From<PropertyDiffKind> for property_diff::Kind {
    fn from(kind: PropertyDiffKind) -> Self {
        match kind {
            PropertyDiffKind::Add => Self::Add,
            PropertyDiffKind::AddReplace => Self::AddReplace,
            PropertyDiffKind::Delete => Self::Delete,
            PropertyDiffKind::DeleteReplace => Self::DeleteReplace,
            PropertyDiffKind::Update => Self::Update,
            PropertyDiffKind::UpdateReplace => Self::UpdateReplace,
        }
    }
}

/// Detailed change of one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDiff {
    /// What kind of change.
    pub kind: PropertyDiffKind,
    /// True when the change originates in user inputs rather than recorded state.
    pub input_diff: bool,
}

/// Result of diffing one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Overall verdict.
    pub changes: DiffChanges,
    /// Changed input fields, in rule order.
    pub diffs: Vec<String>,
    /// Fields whose change forces replacement, in rule order.
    pub replaces: Vec<String>,
    /// Fields the engine may treat as stable.
    pub stables: Vec<String>,
    /// Whether replacement must delete the old resource first.
    pub delete_before_replace: bool,
    /// Per-field change detail.
    pub detailed_diff: BTreeMap<String, PropertyDiff>,
}

impl DiffResult {
    /// A diff that reports nothing changed.
    pub fn no_change() -> Self {
        Self {
            changes: DiffChanges::None,
            diffs: Vec::new(),
            replaces: Vec::new(),
            stables: Vec::new(),
            delete_before_replace: false,
            detailed_diff: BTreeMap::new(),
        }
    }

    /// Whether the engine will replace rather than update.
    pub fn requires_replace(&self) -> bool {
        !self.replaces.is_empty()
    }
}

impl From<DiffResult> for crate::generated::DiffResponse {
    fn from(result: DiffResult) -> Self {
        let changes = match result.changes {
            DiffChanges::None => diff_response::DiffChanges::DiffNone,
            DiffChanges::Some => diff_response::DiffChanges::DiffSome,
        };
        Self {
            replaces: result.replaces,
            stables: result.stables,
            delete_before_replace: result.delete_before_replace,
            changes: changes as i32,
            diffs: result.diffs,
            detailed_diff: result
                .detailed_diff
                .into_iter()
                .map(|(field, diff)| {
                    (
                        field,
                        crate::generated::PropertyDiff {
                            kind: property_diff::Kind::from(diff.kind) as i32,
                            input_diff: diff.input_diff,
                        },
                    )
                })
                .collect(),
            has_detailed_diff: true,
        }
    }
}

/// A property that failed validation during Check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    /// Property path.
    pub property: String,
    /// Human-readable reason.
    pub reason: String,
}

impl CheckFailure {
    /// Create a check failure.
    pub fn new(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

impl From<CheckFailure> for crate::generated::CheckFailure {
    fn from(failure: CheckFailure) -> Self {
        Self {
            property: failure.property,
            reason: failure.reason,
        }
    }
}

/// Result of Check or CheckConfig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Inputs the engine should use.
    pub inputs: serde_json::Value,
    /// Validation failures; empty when the inputs are acceptable.
    pub failures: Vec<CheckFailure>,
}

impl CheckResult {
    /// Accept `inputs` unchanged.
    pub fn accept(inputs: serde_json::Value) -> Self {
        Self {
            inputs,
            failures: Vec::new(),
        }
    }
}

impl From<CheckResult> for crate::generated::CheckResponse {
    fn from(result: CheckResult) -> Self {
        Self {
            inputs: Some(value_to_struct(&result.inputs)),
            failures: result.failures.into_iter().map(Into::into).collect(),
        }
    }
}

/// A freshly created resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResult {
    /// Durable id.
    pub id: String,
    /// Output properties.
    pub outputs: serde_json::Value,
}

impl CreateResult {
    /// Create a result.
    pub fn new(id: impl Into<String>, outputs: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            outputs,
        }
    }
}

/// A resource as read back from the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Durable id.
    pub id: String,
    /// Output properties.
    pub outputs: serde_json::Value,
    /// Inputs reconstructed from the outputs.
    pub inputs: serde_json::Value,
}

/// Plugin version reported by GetPluginInfo.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_kinds() {
        assert_eq!(PropertyDiffKind::classify(false, true, false), PropertyDiffKind::Add);
        assert_eq!(
            PropertyDiffKind::classify(false, true, true),
            PropertyDiffKind::AddReplace
        );
        assert_eq!(PropertyDiffKind::classify(true, false, false), PropertyDiffKind::Delete);
        assert_eq!(
            PropertyDiffKind::classify(true, false, true),
            PropertyDiffKind::DeleteReplace
        );
        assert_eq!(PropertyDiffKind::classify(true, true, false), PropertyDiffKind::Update);
        assert!(PropertyDiffKind::classify(true, true, true).is_replace());
        assert!(!PropertyDiffKind::Update.is_replace());
    }

    #[test]
    fn test_diff_result_to_proto() {
        let mut result = DiffResult::no_change();
        result.changes = DiffChanges::Some;
        result.diffs.push("email".to_string());
        result.replaces.push("email".to_string());
        result.delete_before_replace = true;
        result.detailed_diff.insert(
            "email".to_string(),
            PropertyDiff {
                kind: PropertyDiffKind::UpdateReplace,
                input_diff: true,
            },
        );

        let proto: crate::generated::DiffResponse = result.into();
        assert_eq!(proto.changes, diff_response::DiffChanges::DiffSome as i32);
        assert_eq!(proto.replaces, vec!["email".to_string()]);
        assert!(proto.delete_before_replace);
        assert!(proto.has_detailed_diff);
        let detail = proto.detailed_diff["email"];
        assert_eq!(detail.kind, property_diff::Kind::UpdateReplace as i32);
        assert!(detail.input_diff);
    }

    #[test]
    fn test_no_change_to_proto() {
        let proto: crate::generated::DiffResponse = DiffResult::no_change().into();
        assert_eq!(proto.changes, diff_response::DiffChanges::DiffNone as i32);
        assert!(proto.diffs.is_empty());
    }

    #[test]
    fn test_check_result_to_proto() {
        let result = CheckResult {
            inputs: serde_json::json!({"name": "demo"}),
            failures: vec![CheckFailure::new("email", "Missing required property 'email'")],
        };
        let proto: crate::generated::CheckResponse = result.into();
        assert_eq!(proto.failures.len(), 1);
        assert_eq!(proto.failures[0].property, "email");
        assert!(proto.inputs.unwrap().fields.contains_key("name"));
    }
}
