//! Runtime configuration for sitewalk clients.
//!
//! Remote credentials come from a JSON config file and/or environment
//! variables; environment values win. A missing or incomplete remote section
//! is valid and simply leaves the client in local-only mode.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "SITEWALK_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SITEWALK_SUPABASE_ANON_KEY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SITEWALK_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
/// Anon keys shorter than this are placeholders, not credentials
const MIN_ANON_KEY_LEN: usize = 20;

/// Remote store credentials.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_anon_key",
                &self.supabase_anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl RemoteConfig {
    /// Read remote settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read remote settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            supabase_url: normalize_text_option(lookup(ENV_SUPABASE_URL)),
            supabase_anon_key: normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)),
            request_timeout_secs: lookup(ENV_REQUEST_TIMEOUT_SECS)
                .and_then(|value| value.trim().parse().ok()),
        }
    }

    /// Fill unset fields from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            supabase_url: normalize_text_option(self.supabase_url)
                .or_else(|| normalize_text_option(fallback.supabase_url)),
            supabase_anon_key: normalize_text_option(self.supabase_anon_key)
                .or_else(|| normalize_text_option(fallback.supabase_anon_key)),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
        }
    }

    /// URL and anon key, only when both look like real credentials.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let url = self.supabase_url.as_deref().map(str::trim)?;
        let key = self.supabase_anon_key.as_deref().map(str::trim)?;
        (is_http_url(url) && key.len() > MIN_ANON_KEY_LEN).then_some((url, key))
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

/// Tuning for sync passes and the reachability probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Delay after the first failed upload of a record
    pub backoff_base_secs: u64,
    /// Upper bound for the per-record retry delay
    pub backoff_max_secs: u64,
    /// How often the reachability probe checks the remote
    pub probe_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            backoff_base_secs: 2,
            backoff_max_secs: 300,
            probe_interval_secs: 30,
        }
    }
}

impl SyncSettings {
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub const fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

/// Contents of the `sitewalk.json` config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl AppConfig {
    /// Load the config file; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Let environment-provided remote settings override the file.
    #[must_use]
    pub fn with_remote_overrides(mut self, overrides: RemoteConfig) -> Self {
        self.remote = overrides.or(self.remote);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    const KEY: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.anon";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn credentials_require_http_url_and_real_key() {
        let config = RemoteConfig::from_lookup(lookup(&[
            (ENV_SUPABASE_URL, "https://demo.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, KEY),
        ]));
        assert_eq!(config.credentials(), Some(("https://demo.supabase.co", KEY)));

        let short_key = RemoteConfig::from_lookup(lookup(&[
            (ENV_SUPABASE_URL, "https://demo.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "short"),
        ]));
        assert!(!short_key.is_configured());

        let bad_url = RemoteConfig::from_lookup(lookup(&[
            (ENV_SUPABASE_URL, "demo.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, KEY),
        ]));
        assert!(!bad_url.is_configured());

        assert!(!RemoteConfig::default().is_configured());
    }

    #[test]
    fn request_timeout_defaults_and_parses() {
        assert_eq!(
            RemoteConfig::default().request_timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        let config = RemoteConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_SECS, " 7 ")]));
        assert_eq!(config.request_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn env_overrides_file_values() {
        let file = AppConfig::parse(&format!(
            r#"{{"remote":{{"supabase_url":"https://file.supabase.co","supabase_anon_key":"{KEY}"}}}}"#
        ))
        .unwrap();
        let env = RemoteConfig::from_lookup(lookup(&[(ENV_SUPABASE_URL, "https://env.supabase.co")]));

        let merged = file.with_remote_overrides(env);
        assert_eq!(
            merged.remote.credentials(),
            Some(("https://env.supabase.co", KEY))
        );
        assert_eq!(merged.sync, SyncSettings::default());
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let error = AppConfig::parse(r#"{"remote":{},"unexpected":true}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = AppConfig::load_from_path(&tmp.path().join("missing.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn debug_redacts_anon_key() {
        let config = RemoteConfig {
            supabase_anon_key: Some(KEY.to_string()),
            ..RemoteConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(KEY));
        assert!(rendered.contains("[REDACTED]"));
    }
}
