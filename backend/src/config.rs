//! Publish configuration.
//!
//! Read once at startup, before any upload, from the environment (after
//! `.env` has been loaded):
//!
//! | Variable         | Fallback            | Required |
//! |------------------|---------------------|----------|
//! | `API_TOKEN`      | `CANVAS_API_TOKEN`  | yes      |
//! | `BASE_URL`       | `CANVAS_URL`        | yes      |
//! | `ACCOUNT_ID`     | `CANVAS_ACCOUNT_ID` | yes      |
//! | `SELECTED_TERMS` |                     | no       |

use serde::Serialize;
use std::env;
use std::fmt;

use crate::error::ConfigError;

/// Credentials and scope for the SIS import endpoint.
#[derive(Clone, Serialize)]
pub struct PublishConfig {
    #[serde(skip_serializing)]
    pub api_token: String,
    /// Host, with or without scheme.
    pub base_url: String,
    pub account_id: String,
    /// Terms whose partitions are uploaded. Empty means none.
    pub selected_terms: Vec<String>,
}

impl fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishConfig")
            .field("api_token", &"***")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field("selected_terms", &self.selected_terms)
            .finish()
    }
}

impl PublishConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str, fallback: Option<&str>| {
            let value = |n: &str| lookup(n).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            value(name).or_else(|| fallback.and_then(value))
        };

        let api_token = get("API_TOKEN", Some("CANVAS_API_TOKEN")).ok_or(ConfigError::Missing("API_TOKEN"))?;
        let base_url = get("BASE_URL", Some("CANVAS_URL")).ok_or(ConfigError::Missing("BASE_URL"))?;
        let account_id =
            get("ACCOUNT_ID", Some("CANVAS_ACCOUNT_ID")).ok_or(ConfigError::Missing("ACCOUNT_ID"))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() || base_url.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                name: "BASE_URL",
                message: format!("'{}' is not a host", base_url),
            });
        }

        Ok(Self {
            api_token,
            base_url,
            account_id,
            selected_terms: get("SELECTED_TERMS", None)
                .map(|raw| parse_terms(&raw))
                .unwrap_or_default(),
        })
    }

    /// Replace the selected terms when `terms` is non-empty.
    pub fn with_terms(mut self, terms: Vec<String>) -> Self {
        if !terms.is_empty() {
            self.selected_terms = terms;
        }
        self
    }
}

/// Split a comma-separated term list, dropping blanks and repeats.
pub fn parse_terms(raw: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_primary_variables() {
        let config = PublishConfig::from_lookup(lookup(&[
            ("API_TOKEN", "secret"),
            ("BASE_URL", "school.instructure.com/"),
            ("ACCOUNT_ID", "1"),
            ("SELECTED_TERMS", "BPS_DP24, T2,,T2"),
        ]))
        .unwrap();

        assert_eq!(config.api_token, "secret");
        assert_eq!(config.base_url, "school.instructure.com");
        assert_eq!(config.selected_terms, vec!["BPS_DP24", "T2"]);
    }

    #[test]
    fn test_legacy_fallbacks() {
        let config = PublishConfig::from_lookup(lookup(&[
            ("API_TOKEN", ""),
            ("CANVAS_API_TOKEN", "legacy"),
            ("CANVAS_URL", "lms.example.org"),
            ("CANVAS_ACCOUNT_ID", "7"),
        ]))
        .unwrap();

        assert_eq!(config.api_token, "legacy");
        assert_eq!(config.account_id, "7");
        assert!(config.selected_terms.is_empty());
    }

    #[test]
    fn test_missing_required() {
        let err = PublishConfig::from_lookup(lookup(&[("API_TOKEN", "x"), ("BASE_URL", "h")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ACCOUNT_ID")));
    }

    #[test]
    fn test_invalid_host() {
        let err = PublishConfig::from_lookup(lookup(&[
            ("API_TOKEN", "x"),
            ("BASE_URL", "not a host"),
            ("ACCOUNT_ID", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BASE_URL", .. }));
    }

    #[test]
    fn test_cli_terms_override_env() {
        let config = PublishConfig::from_lookup(lookup(&[
            ("API_TOKEN", "x"),
            ("BASE_URL", "h"),
            ("ACCOUNT_ID", "1"),
            ("SELECTED_TERMS", "T1"),
        ]))
        .unwrap();

        assert_eq!(config.clone().with_terms(vec![]).selected_terms, vec!["T1"]);
        assert_eq!(config.with_terms(vec!["T9".into()]).selected_terms, vec!["T9"]);
    }

    #[test]
    fn test_debug_hides_token() {
        let config = PublishConfig::from_lookup(lookup(&[
            ("API_TOKEN", "secret"),
            ("BASE_URL", "h"),
            ("ACCOUNT_ID", "1"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
