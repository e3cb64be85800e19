//! Supabase PostgREST client for the jobs table.
//!
//! Rows are addressed with PostgREST filters (`?id=eq.<value>`). Inserts are
//! upserts on the primary key so resubmitting a job id updates its row.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};

/// Record store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Service role key, sent as `apikey` and bearer token
    pub service_key: String,
    pub table: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            table: "jobs".to_string(),
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| StoreError::config("SUPABASE_URL must be set"))?;
        let service_key = std::env::var("SUPABASE_SERVICE_KEY")
            .or_else(|_| std::env::var("SUPABASE_KEY"))
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| StoreError::config("SUPABASE_SERVICE_KEY must be set"))?;

        let timeout_secs: u64 = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        let mut config = Self::new(base_url, service_key);
        config.table = std::env::var("SUPABASE_JOBS_TABLE").unwrap_or_else(|_| "jobs".to_string());
        config.timeout = Duration::from_secs(timeout_secs);
        config.retry = RetryConfig::from_env();
        Ok(config)
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// PostgREST row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl AsRef<str>) -> Self {
        Self {
            conditions: vec![(column.into(), format!("eq.{}", value.as_ref()))],
        }
    }

    /// Add another `column = value` condition.
    pub fn and_eq(mut self, column: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.conditions
            .push((column.into(), format!("eq.{}", value.as_ref())));
        self
    }

    fn query(&self) -> &[(String, String)] {
        &self.conditions
    }
}

/// Supabase REST client.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    config: StoreConfig,
    table_url: String,
}

impl SupabaseClient {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vmix-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        let table_url = format!("{}/rest/v1/{}", config.base_url, config.table);
        Ok(Self {
            http,
            config,
            table_url,
        })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env()?)
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    /// Insert `row`, merging into any existing row with the same primary key.
    pub async fn upsert<T, R>(&self, row: &T) -> StoreResult<Vec<R>>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.execute("upsert", move || async move {
            let response = self
                .authorized(self.http.post(&self.table_url))
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(row)
                .send()
                .await?;
            Self::parse_rows(response).await
        })
        .await
    }

    /// Update the columns in `fields` on every row matching `filter`.
    pub async fn patch<T, R>(&self, filter: &Filter, fields: &T) -> StoreResult<Vec<R>>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.execute("patch", move || async move {
            let response = self
                .authorized(self.http.patch(&self.table_url))
                .query(filter.query())
                .header("Prefer", "return=representation")
                .json(fields)
                .send()
                .await?;
            Self::parse_rows(response).await
        })
        .await
    }

    /// Fetch every row matching `filter`.
    pub async fn select<R>(&self, filter: &Filter) -> StoreResult<Vec<R>>
    where
        R: DeserializeOwned,
    {
        self.execute("select", move || async move {
            let response = self
                .authorized(self.http.get(&self.table_url))
                .query(&[("select", "*")])
                .query(filter.query())
                .send()
                .await?;
            Self::parse_rows(response).await
        })
        .await
    }

    /// Cheap reachability check for readiness probes.
    pub async fn ping(&self) -> StoreResult<()> {
        let response = self
            .authorized(self.http.get(&self.table_url))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(status, response).await)
        }
    }

    async fn execute<T, F, Fut>(&self, operation: &'static str, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let span = info_span!("store_request", operation, table = %self.config.table);
        let start = Instant::now();
        let result = with_retry(&self.config.retry, operation, op)
            .instrument(span)
            .await;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, start.elapsed().as_secs_f64());
        result
    }

    async fn parse_rows<R: DeserializeOwned>(response: Response) -> StoreResult<Vec<R>> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from_response(status, response).await);
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        debug!(bytes = body.len(), "Store response");
        serde_json::from_slice(&body).map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    async fn error_from_response(status: StatusCode, response: Response) -> StoreError {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        match (status, retry_after) {
            (StatusCode::TOO_MANY_REQUESTS, Some(secs)) => StoreError::RateLimited(secs * 1000),
            _ => StoreError::from_http_status(status.as_u16(), body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use serial_test::serial;
    use wiremock::matchers::{body_json, header, headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SupabaseClient {
        let config = StoreConfig::new(server.uri(), "service-key").with_retry(RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        });
        SupabaseClient::new(config).unwrap()
    }

    #[test]
    #[serial]
    fn test_config_requires_url() {
        std::env::remove_var("SUPABASE_URL");
        assert!(matches!(StoreConfig::from_env(), Err(StoreError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("SUPABASE_URL", "https://proj.supabase.co/");
        std::env::set_var("SUPABASE_SERVICE_KEY", "k");
        std::env::remove_var("SUPABASE_JOBS_TABLE");
        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://proj.supabase.co");
        assert_eq!(config.table, "jobs");
        std::env::remove_var("SUPABASE_URL");
        std::env::remove_var("SUPABASE_SERVICE_KEY");
    }

    #[test]
    fn test_filter_query() {
        let filter = Filter::eq("id", "job-1").and_eq("kind", "compose");
        assert_eq!(
            filter.query(),
            &[
                ("id".to_string(), "eq.job-1".to_string()),
                ("kind".to_string(), "eq.compose".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_upsert_sends_merge_header_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/jobs"))
            .and(header("apikey", "service-key"))
            .and(header("Authorization", "Bearer service-key"))
            .and(headers("Prefer", vec!["resolution=merge-duplicates", "return=representation"]))
            .and(body_json(json!({"id": "j1", "status": "processing_started"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!([{"id": "j1", "status": "processing_started"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .upsert(&json!({"id": "j1", "status": "processing_started"}))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_patch_uses_eq_filter() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/jobs"))
            .and(query_param("id", "eq.j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "j1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .patch(&Filter::eq("id", "j1"), &json!({"status": "completed"}))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "j1");
    }

    #[tokio::test]
    async fn test_select_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/jobs"))
            .and(query_param("id", "eq.missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .select(&Filter::eq("id", "missing"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server)
            .select::<Value>(&Filter::eq("id", "j1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ServerError(503, _)));
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("column \"foo\" does not exist"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .upsert::<_, Value>(&json!({"foo": 1}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        assert!(client(&server).ping().await.is_ok());
    }
}
