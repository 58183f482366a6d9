//! Hosted backend over PostgREST and Realtime.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

use dccu_proto::TableName;

use super::{realtime, Backend, ChangeFeed};
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult, ClientResult, Error};

/// Accept header asking PostgREST for a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// PostgREST code for "zero rows where one was expected".
const NO_ROWS_CODE: &str = "PGRST116";

/// Backend talking to a Supabase project.
pub struct SupabaseBackend {
    config: ClientConfig,
    http: reqwest::Client,
}

impl SupabaseBackend {
    /// Build a backend from a configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.anon_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.bearer()))?,
        );
        headers.insert("Accept-Profile", header_value(&config.schema)?);
        headers.insert("Content-Profile", header_value(&config.schema)?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn table_url(&self, table: TableName) -> String {
        self.config.rest_url(table.as_str())
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }
}

impl std::fmt::Debug for SupabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseBackend")
            .field("url", &self.config.url)
            .field("schema", &self.config.schema)
            .finish()
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn select_all(&self, table: TableName) -> BackendResult<Vec<Value>> {
        let request = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*"), ("order", "created_at.desc")]);

        let rows = self.send(request).await?.json::<Vec<Value>>().await?;
        tracing::trace!(table = %table, rows = rows.len(), "select completed");
        Ok(rows)
    }

    async fn insert(&self, table: TableName, draft: Value) -> BackendResult<Value> {
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&draft);

        Ok(self.send(request).await?.json::<Value>().await?)
    }

    async fn update(&self, table: TableName, id: &str, patch: Value) -> BackendResult<Value> {
        let request = self
            .http
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&patch);

        Ok(self.send(request).await?.json::<Value>().await?)
    }

    async fn delete(&self, table: TableName, id: &str) -> BackendResult<()> {
        let request = self
            .http
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{}", id))]);

        self.send(request).await?;
        Ok(())
    }

    async fn subscribe(&self, table: TableName) -> BackendResult<ChangeFeed> {
        realtime::subscribe(&self.config, table).await
    }
}

fn header_value(value: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Config("header value contains invalid characters".to_string()))
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Map a non-success response to a backend error.
fn status_error(status: u16, body: &str) -> BackendError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();

    if parsed.code.as_deref() == Some(NO_ROWS_CODE) {
        return BackendError::NotFound;
    }

    let message = match (parsed.message, parsed.details) {
        (Some(message), Some(details)) => format!("{} ({})", message, details),
        (Some(message), None) => message,
        (None, _) if !body.trim().is_empty() => body.trim().to_string(),
        (None, _) => format!("http status {}", status),
    };

    BackendError::Status {
        status,
        code: parsed.code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_is_not_found() {
        let body = r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned","details":"The result contains 0 rows"}"#;
        assert!(matches!(status_error(406, body), BackendError::NotFound));
    }

    #[test]
    fn test_postgrest_error_body() {
        let body = r#"{"code":"42501","message":"permission denied for table movies","details":null}"#;
        match status_error(401, body) {
            BackendError::Status {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 401);
                assert_eq!(code.as_deref(), Some("42501"));
                assert_eq!(message, "permission denied for table movies");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_plain_and_empty_bodies() {
        match status_error(502, "Bad Gateway") {
            BackendError::Status { message, code, .. } => {
                assert_eq!(message, "Bad Gateway");
                assert!(code.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }

        match status_error(500, "") {
            BackendError::Status { message, .. } => assert_eq!(message, "http status 500"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_backend_builds_from_config() {
        let backend =
            SupabaseBackend::new(ClientConfig::new("https://abc.supabase.co", "anon")).unwrap();
        assert_eq!(
            backend.table_url(TableName::Technologies),
            "https://abc.supabase.co/rest/v1/technologies"
        );
    }

    #[test]
    fn test_invalid_header_rejected() {
        let config = ClientConfig::new("https://abc.supabase.co", "bad\nkey");
        assert!(SupabaseBackend::new(config).is_err());
    }
}
