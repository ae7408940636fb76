//! The diff engine.
//!
//! A [`Differ`] compares three property bags for one resource:
//!
//! - `olds`: the properties cached by the preceding Check call,
//! - `news`: the proposed inputs for this apply,
//! - `props`: the state recorded at the previous successful apply.
//!
//! Each [`Differ::diff`] call compares one field. A mismatch between `olds`
//! and `news` is an input diff and lands in `diffs`. When those agree and a
//! mapped path is given, `props` at that path is compared against `news` as
//! well; a mismatch there is recorded in the detailed diff only. Either kind
//! of mismatch on a replace-triggering field lands in `replaces`.
//!
//! ```
//! use pulumi_resource_buddy::differ::Differ;
//! use pulumi_resource_buddy::types::DiffChanges;
//! use serde_json::json;
//!
//! let olds = json!({"email": "a@example.com", "admin": false});
//! let news = json!({"email": "b@example.com", "admin": false});
//! let props = json!({"id": 3});
//!
//! let result = Differ::new(&olds, &news, &props)
//!     .diff(&["email"], None, true)
//!     .diff(&["admin"], Some(&["admin"]), false)
//!     .set_delete_before_replace(true)
//!     .to_response();
//!
//! assert_eq!(result.changes, DiffChanges::Some);
//! assert_eq!(result.replaces, vec!["email"]);
//! assert!(result.delete_before_replace);
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use crate::properties::{get_path, values_equal};
use crate::types::{DiffChanges, DiffResult, PropertyDiff, PropertyDiffKind};

/// Accumulates field comparisons for one resource.
#[derive(Debug)]
pub struct Differ<'a> {
    olds: &'a Value,
    news: &'a Value,
    props: &'a Value,
    diffs: Vec<String>,
    replaces: Vec<String>,
    stables: Vec<String>,
    delete_before_replace: bool,
    detailed: BTreeMap<String, PropertyDiff>,
}

impl<'a> Differ<'a> {
    /// Start a diff over the three property bags.
    pub fn new(olds: &'a Value, news: &'a Value, props: &'a Value) -> Self {
        Self {
            olds,
            news,
            props,
            diffs: Vec::new(),
            replaces: Vec::new(),
            stables: Vec::new(),
            delete_before_replace: false,
            detailed: BTreeMap::new(),
        }
    }

    /// Compare the field at `path`.
    ///
    /// `mapped` navigates `props` for the secondary comparison. Absent path
    /// segments resolve to null and never fail.
    pub fn diff(&mut self, path: &[&str], mapped: Option<&[&str]>, replace: bool) -> &mut Self {
        let field = path.join(".");
        let old = get_path(self.olds, path);
        let new = get_path(self.news, path);

        if !values_equal(old, new) {
            let kind = PropertyDiffKind::classify(old.is_some(), new.is_some(), replace);
            self.record(field, kind, true, replace);
        } else if let Some(mapped) = mapped {
            let recorded = get_path(self.props, mapped);
            if new.is_some() && !values_equal(recorded, new) {
                let kind = PropertyDiffKind::classify(recorded.is_some(), true, replace);
                self.record(field, kind, false, replace);
            }
        }
        self
    }

    fn record(&mut self, field: String, kind: PropertyDiffKind, input_diff: bool, replace: bool) {
        if input_diff {
            push_unique(&mut self.diffs, &field);
        }
        if replace {
            push_unique(&mut self.replaces, &field);
        }
        self.detailed.insert(field, PropertyDiff { kind, input_diff });
    }

    /// Set whether replacement must delete before it creates.
    pub fn set_delete_before_replace(&mut self, value: bool) -> &mut Self {
        self.delete_before_replace = value;
        self
    }

    /// Mark fields as stable.
    pub fn add_stable<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            push_unique(&mut self.stables, field.as_ref());
        }
        self
    }

    /// Finalize the verdict. Does not consume or modify the differ.
    pub fn to_response(&self) -> DiffResult {
        let changes = if self.detailed.is_empty() {
            DiffChanges::None
        } else {
            DiffChanges::Some
        };
        DiffResult {
            changes,
            diffs: self.diffs.clone(),
            replaces: self.replaces.clone(),
            stables: self.stables.clone(),
            delete_before_replace: self.delete_before_replace,
            detailed_diff: self.detailed.clone(),
        }
    }
}

fn push_unique(list: &mut Vec<String>, field: &str) {
    if !list.iter().any(|f| f == field) {
        list.push(field.to_string());
    }
}
