//! Client configuration.

use std::time::Duration;

use reqwest::Url;

use crate::error::{ClientResult, Error};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default database schema.
pub const DEFAULT_SCHEMA: &str = "public";

/// Default realtime heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Realtime protocol version sent on connect.
pub const REALTIME_VSN: &str = "1.0.0";

/// Environment variables holding the project URL, in lookup order.
pub const URL_VARS: [&str; 2] = ["SUPABASE_URL", "VITE_SUPABASE_URL"];

/// Environment variables holding the anon key, in lookup order.
pub const ANON_KEY_VARS: [&str; 2] = ["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"];

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: String,

    /// Public anon key, sent as `apikey` on every request.
    pub anon_key: String,

    /// Bearer token for a signed-in user. Falls back to the anon key.
    pub access_token: Option<String>,

    /// Database schema the tables live in.
    pub schema: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Interval between realtime heartbeats.
    pub heartbeat_interval: Duration,
}

impl ClientConfig {
    /// Create a configuration for a project URL and anon key.
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: None,
            schema: DEFAULT_SCHEMA.to_string(),
            timeout: DEFAULT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// Read the URL and anon key from the environment.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };

        match (first(&URL_VARS), first(&ANON_KEY_VARS)) {
            (Some(url), Some(key)) => Ok(Self::new(url, key)),
            _ => Err(Error::Config("missing Supabase environment variables".to_string())),
        }
    }

    /// Set the bearer token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Set the realtime heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Token sent in the `Authorization` header.
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    /// REST endpoint for a table.
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    /// Realtime websocket endpoint.
    ///
    /// `http` maps to `ws` and `https` to `wss`.
    pub fn realtime_url(&self) -> ClientResult<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid project url '{}': {}", self.url, e)))?;

        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config(format!("unsupported url scheme in '{}'", self.url)))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", REALTIME_VSN);

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("https://abc.supabase.co/", "anon")
            .with_access_token("jwt")
            .with_timeout(Duration::from_secs(5))
            .with_schema("dccu")
            .with_heartbeat_interval(Duration::from_secs(10));

        assert_eq!(config.url, "https://abc.supabase.co");
        assert_eq!(config.bearer(), "jwt");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.schema, "dccu");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(
            config.rest_url("movies"),
            "https://abc.supabase.co/rest/v1/movies"
        );
    }

    #[test]
    fn test_bearer_defaults_to_anon_key() {
        let config = ClientConfig::new("http://localhost:54321", "anon");
        assert_eq!(config.bearer(), "anon");
        assert_eq!(config.schema, DEFAULT_SCHEMA);
    }

    #[test]
    fn test_from_lookup_prefers_plain_names() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://a.supabase.co"),
            ("VITE_SUPABASE_URL", "https://b.supabase.co"),
            ("VITE_SUPABASE_ANON_KEY", "vite-key"),
        ]))
        .unwrap();

        assert_eq!(config.url, "https://a.supabase.co");
        assert_eq!(config.anon_key, "vite-key");
    }

    #[test]
    fn test_from_lookup_missing() {
        let err = ClientConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://a.supabase.co")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: missing Supabase environment variables"
        );

        assert!(ClientConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", " "),
            ("SUPABASE_ANON_KEY", "key"),
        ]))
        .is_err());
    }

    #[test]
    fn test_realtime_url() {
        let url = ClientConfig::new("https://abc.supabase.co", "anon")
            .realtime_url()
            .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let local = ClientConfig::new("http://127.0.0.1:54321", "k")
            .realtime_url()
            .unwrap();
        assert_eq!(local.scheme(), "ws");
        assert_eq!(local.port(), Some(54321));
    }

    #[test]
    fn test_realtime_url_invalid() {
        assert!(ClientConfig::new("not a url", "k").realtime_url().is_err());
    }
}
