//! Provider configuration.
//!
//! Settings arrive from the engine's `Configure` call, either as
//! `buddy:config:<key>` variables or as the provider's `args` struct. Keys the
//! program does not set fall back to the `BUDDY_*` environment variables.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::properties::{get_path, is_unknown};
use crate::rules::{DiffRules, FieldRule};
use crate::schema::Attribute;
use crate::types::CheckFailure;

/// Base URL of the public Buddy API.
pub const DEFAULT_API_URL: &str = "https://api.buddy.works";

/// Per-request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const VARIABLE_PREFIX: &str = "buddy:config:";

/// Config changes that force the engine to replace every resource.
pub const CONFIG_RULES: DiffRules = DiffRules {
    rules: &[
        FieldRule::new("workspace").replace(),
        FieldRule::new("api_url").replace(),
        FieldRule::new("token"),
    ],
    stables: &[],
    delete_before_replace: false,
};

struct Setting {
    key: &'static str,
    alias: Option<&'static str>,
    env: Option<&'static str>,
}

const TOKEN: Setting = Setting {
    key: "token",
    alias: None,
    env: Some("BUDDY_TOKEN"),
};
const WORKSPACE: Setting = Setting {
    key: "workspace",
    alias: None,
    env: Some("BUDDY_WORKSPACE"),
};
const API_URL: Setting = Setting {
    key: "api_url",
    alias: Some("apiUrl"),
    env: Some("BUDDY_API_URL"),
};
const REQUEST_TIMEOUT: Setting = Setting {
    key: "request_timeout_secs",
    alias: Some("requestTimeoutSecs"),
    env: None,
};

/// Resolved provider settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Personal access token sent as a bearer token.
    pub token: String,
    /// Workspace domain every resource lives in.
    pub workspace: String,
    /// API base URL.
    pub api_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("workspace", &self.workspace)
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve settings from a config bag, falling back to the process environment.
    pub fn from_value(config: &Value) -> Result<Self, ProviderError> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings from a config bag with an explicit environment lookup.
    pub fn resolve<F>(config: &Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let failures = Self::check_with(config, &env);
        if !failures.is_empty() {
            let reasons: Vec<String> = failures.into_iter().map(|f| f.reason).collect();
            return Err(ProviderError::Configuration(reasons.join("; ")));
        }

        let token = lookup(config, &TOKEN, &env).unwrap_or_default();
        let workspace = lookup(config, &WORKSPACE, &env).unwrap_or_default();
        let api_url = lookup(config, &API_URL, &env)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let request_timeout_secs = match lookup(config, &REQUEST_TIMEOUT, &env) {
            Some(raw) => raw.parse().map_err(|_| {
                ProviderError::Configuration(format!(
                    "request_timeout_secs must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            token,
            workspace,
            api_url,
            request_timeout_secs,
        })
    }

    /// Report settings that are missing from both the bag and the environment.
    pub fn check(config: &Value) -> Vec<CheckFailure> {
        Self::check_with(config, &|name: &str| std::env::var(name).ok())
    }

    fn check_with<F>(config: &Value, env: &F) -> Vec<CheckFailure>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut failures = Vec::new();
        for setting in [&TOKEN, &WORKSPACE] {
            if lookup(config, setting, env).is_none() {
                let hint = setting
                    .env
                    .map(|name| format!(" (or set {})", name))
                    .unwrap_or_default();
                failures.push(CheckFailure::new(
                    setting.key,
                    format!("Missing required configuration '{}'{}", setting.key, hint),
                ));
            }
        }
        failures
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Config variables as described in the package schema.
    pub fn schema() -> BTreeMap<String, Attribute> {
        let mut attrs = BTreeMap::new();
        attrs.insert(
            "token".to_string(),
            Attribute::optional_string()
                .sensitive()
                .with_description("Buddy personal access token. Falls back to BUDDY_TOKEN."),
        );
        attrs.insert(
            "workspace".to_string(),
            Attribute::optional_string()
                .with_description("Workspace domain. Falls back to BUDDY_WORKSPACE."),
        );
        attrs.insert(
            "api_url".to_string(),
            Attribute::optional_string()
                .with_description("API base URL. Falls back to BUDDY_API_URL.")
                .with_default(Value::String(DEFAULT_API_URL.to_string())),
        );
        attrs.insert(
            "request_timeout_secs".to_string(),
            Attribute::optional_int()
                .with_description("Timeout for a single API request, in seconds.")
                .with_default(Value::from(DEFAULT_REQUEST_TIMEOUT_SECS)),
        );
        attrs
    }
}

/// Merge `Configure` variables and args into one config bag.
///
/// Variables win over args for the same key.
pub fn merge_configure_inputs(variables: &HashMap<String, String>, args: Value) -> Value {
    let mut merged = match args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (name, value) in variables {
        let key = name.strip_prefix(VARIABLE_PREFIX).unwrap_or(name);
        merged.insert(key.to_string(), Value::String(value.clone()));
    }
    Value::Object(merged)
}

fn lookup<F>(config: &Value, setting: &Setting, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let keys = std::iter::once(setting.key).chain(setting.alias);
    for key in keys {
        match get_path(config, &[key]) {
            Some(value) if is_unknown(value) => return Some(String::new()),
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    setting
        .env
        .and_then(|name| env(name))
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::UNKNOWN_SENTINEL;
    use crate::types::DiffChanges;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_from_bag() {
        let config = ProviderConfig::resolve(
            &json!({"token": "t0k", "workspace": "acme", "apiUrl": "https://buddy.local/"}),
            no_env,
        )
        .unwrap();
        assert_eq!(config.token, "t0k");
        assert_eq!(config.workspace, "acme");
        assert_eq!(config.api_url, "https://buddy.local");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_resolve_env_fallback() {
        let env = |name: &str| match name {
            "BUDDY_TOKEN" => Some("from-env".to_string()),
            "BUDDY_WORKSPACE" => Some("env-ws".to_string()),
            _ => None,
        };
        let config = ProviderConfig::resolve(&json!({"workspace": "acme"}), env).unwrap();
        assert_eq!(config.token, "from-env");
        assert_eq!(config.workspace, "acme");
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_resolve_missing_settings() {
        let err = ProviderConfig::resolve(&json!({}), no_env).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().contains("token"));
        assert!(err.message().contains("workspace"));
    }

    #[test]
    fn test_resolve_timeout_from_string_variable() {
        let config = ProviderConfig::resolve(
            &json!({"token": "t", "workspace": "w", "request_timeout_secs": "5"}),
            no_env,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(5));

        let err = ProviderConfig::resolve(
            &json!({"token": "t", "workspace": "w", "request_timeout_secs": "soon"}),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_check_reports_missing_keys() {
        let failures = ProviderConfig::check_with(&json!({"token": "t"}), &no_env);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].property, "workspace");
        assert!(failures[0].reason.contains("BUDDY_WORKSPACE"));
    }

    #[test]
    fn test_check_accepts_unknowns() {
        let failures = ProviderConfig::check_with(
            &json!({"token": UNKNOWN_SENTINEL, "workspace": UNKNOWN_SENTINEL}),
            &no_env,
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig::resolve(
            &json!({"token": "super-secret", "workspace": "acme"}),
            no_env,
        )
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("acme"));
    }

    #[test]
    fn test_merge_configure_inputs() {
        let mut variables = HashMap::new();
        variables.insert("buddy:config:workspace".to_string(), "acme".to_string());
        variables.insert("token".to_string(), "t".to_string());
        let merged = merge_configure_inputs(
            &variables,
            json!({"workspace": "ignored", "apiUrl": "https://buddy.local"}),
        );
        assert_eq!(
            merged,
            json!({"workspace": "acme", "token": "t", "apiUrl": "https://buddy.local"})
        );
    }

    #[test]
    fn test_config_rules() {
        let olds = json!({"workspace": "a", "token": "t1"});
        let news = json!({"workspace": "b", "token": "t2"});
        let result = CONFIG_RULES.evaluate(&olds, &news, &olds);
        assert_eq!(result.changes, DiffChanges::Some);
        assert_eq!(result.diffs, vec!["workspace", "token"]);
        assert_eq!(result.replaces, vec!["workspace"]);
    }
}
