//! PostgREST client for the clinic booking backend
//!
//! Table access for the `appointments` and `doctors` tables:
//!
//! - Query API (`select`, `insert`, `upsert`, `update`, `delete`)
//! - `eq` filtering, ordering and limits
//! - Single-object reads (`single`)
//! - Conditional updates: an `update` only touches rows matching every
//!   filter, and reports the rows it changed

use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Error code PostgREST returns when a single-object read matched no row
/// (or more than one).
pub const NO_ROWS_CODE: &str = "PGRST116";

/// PostgREST APIエラーの詳細情報
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

// エラー詳細を整形して表示するための Display 実装
impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// エラー型
#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError { message: String, status: StatusCode },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// PostgREST / Postgres error code, when the server sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            PostgrestError::ApiError { details, .. } => details.code.as_deref(),
            _ => None,
        }
    }

    /// True for the "JSON object requested, multiple (or no) rows returned"
    /// error of a `single()` read.
    pub fn is_no_rows(&self) -> bool {
        self.code() == Some(NO_ROWS_CODE)
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PostgrestError::ApiError { status, .. }
            | PostgrestError::UnparsedApiError { status, .. } => Some(*status),
            PostgrestError::NetworkError(e) => e.status(),
            _ => None,
        }
    }
}

fn api_error(status: StatusCode, error_text: String) -> PostgrestError {
    match serde_json::from_str::<PostgrestApiErrorDetails>(&error_text) {
        Ok(details) => PostgrestError::ApiError { details, status },
        Err(_) => PostgrestError::UnparsedApiError {
            message: error_text,
            status,
        },
    }
}

/// ソート方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// How `upsert` treats a row that collides with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateResolution {
    /// Overwrite the existing row with the new values.
    Merge,
    /// Keep the existing row untouched.
    Ignore,
}

impl DuplicateResolution {
    fn prefer(&self) -> &'static str {
        match self {
            DuplicateResolution::Merge => "resolution=merge-duplicates",
            DuplicateResolution::Ignore => "resolution=ignore-duplicates",
        }
    }
}

/// PostgREST クライアント
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    base_url: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
}

impl PostgrestClient {
    /// 新しい PostgREST クライアントを作成
    pub fn new(
        base_url: &str,
        api_key: &str,
        table: &str,
        http_client: Client,
    ) -> Result<Self, PostgrestError> {
        let client = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            http_client,
            headers: HeaderMap::new(),
            query_params: Vec::new(),
        };
        client
            .with_header("apikey", api_key)?
            .with_header("Content-Type", "application/json")
    }

    /// ヘッダーを追加
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value for {}", key))
        })?;

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// 認証トークンを設定
    pub fn with_auth(self, token: &str) -> Result<Self, PostgrestError> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    fn set_param(mut self, key: &str, value: String) -> Self {
        self.query_params.retain(|(k, _)| k != key);
        self.query_params.push((key.to_string(), value));
        self
    }

    /// 取得するカラムを指定
    pub fn select(self, columns: &str) -> Self {
        self.set_param("select", columns.to_string())
    }

    /// 等価フィルター
    ///
    /// Several `eq` calls on different columns combine with AND.
    pub fn eq(self, column: &str, value: &str) -> Self {
        self.set_param(column, format!("eq.{}", value))
    }

    /// ソート順を指定
    pub fn order(self, column: &str, order: SortOrder) -> Self {
        let order_str = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        self.set_param("order", format!("{}.{}", column, order_str))
    }

    /// 取得件数を制限
    pub fn limit(self, count: usize) -> Self {
        self.set_param("limit", count.to_string())
    }

    /// Columns of the unique constraint an `upsert` resolves against.
    pub fn on_conflict(self, columns: &str) -> Self {
        self.set_param("on_conflict", columns.to_string())
    }

    // URLを構築
    fn build_url(&self) -> Result<Url, PostgrestError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, self.table))?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        extra_headers: HeaderMap,
        body: Option<Value>,
    ) -> Result<reqwest::Response, PostgrestError> {
        let url = self.build_url()?;
        debug!("{} {}", method, url);

        let mut headers = self.headers.clone();
        headers.extend(extra_headers);

        let mut request = self.http_client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(PostgrestError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(api_error(status, error_text));
        }

        Ok(response)
    }

    /// データを取得
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, PostgrestError> {
        self.send(Method::GET, HeaderMap::new(), None)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Fetches exactly one row. Zero or several matches fail with an error
    /// for which [`PostgrestError::is_no_rows`] is true.
    pub async fn single<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/vnd.pgrst.object+json"),
        );

        self.send(Method::GET, headers, None)
            .await?
            .json::<T>()
            .await
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    async fn write<T: Serialize>(
        &self,
        method: Method,
        values: Option<&T>,
        prefer: &str,
    ) -> Result<Value, PostgrestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_str(prefer)
                .map_err(|_| PostgrestError::InvalidParameters(prefer.to_string()))?,
        );
        let body = values.map(serde_json::to_value).transpose()?;

        let response = self.send(method, headers, body).await?;

        // Read the body as text first to handle empty (204) responses
        let body_text = response.text().await.map_err(|e| {
            PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
        })?;

        if body_text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&body_text)
                .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
        }
    }

    /// データを挿入
    pub async fn insert<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        self.write(Method::POST, Some(&values), "return=representation")
            .await
    }

    /// Inserts, resolving collisions on the `on_conflict` columns (or the
    /// primary key) as `resolution` says. With [`DuplicateResolution::Ignore`]
    /// an existing row comes back as an empty representation.
    pub async fn upsert<T: Serialize>(
        &self,
        values: T,
        resolution: DuplicateResolution,
    ) -> Result<Value, PostgrestError> {
        let prefer = format!("return=representation,{}", resolution.prefer());
        self.write(Method::POST, Some(&values), &prefer).await
    }

    /// データを更新
    ///
    /// Only rows matching the filters are changed; the changed rows are
    /// returned, so an empty array means nothing matched.
    pub async fn update<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        self.write(Method::PATCH, Some(&values), "return=representation")
            .await
    }

    /// データを削除
    pub async fn delete(&self) -> Result<Value, PostgrestError> {
        self.write::<Value>(Method::DELETE, None, "return=representation")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, table: &str) -> PostgrestClient {
        PostgrestClient::new(&server.uri(), "fake-key", table, reqwest::Client::new()).unwrap()
    }

    #[tokio::test]
    async fn select_with_filter_and_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("select", "*"))
            .and(query_param("order", "name.asc"))
            .and(header("apikey", "fake-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "Dr. A" },
                { "id": 2, "name": "Dr. B" }
            ])))
            .mount(&mock_server)
            .await;

        let data = client(&mock_server, "doctors")
            .select("*")
            .order("name", SortOrder::Ascending)
            .execute::<Value>()
            .await
            .unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data[0].get("name").and_then(Value::as_str), Some("Dr. A"));
    }

    #[tokio::test]
    async fn single_reports_no_rows() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", "eq.7"))
            .and(header("accept", "application/vnd.pgrst.object+json"))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned",
                "details": "The result contains 0 rows",
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server, "appointments")
            .select("*")
            .eq("id", "7")
            .single::<Value>()
            .await
            .unwrap_err();

        assert!(err.is_no_rows());
        assert_eq!(err.status(), Some(StatusCode::NOT_ACCEPTABLE));
    }

    #[tokio::test]
    async fn upsert_sends_conflict_target_and_resolution() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("on_conflict", "user_id"))
            .and(body_json(json!({ "user_id": "u1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server, "appointments")
            .on_conflict("user_id")
            .upsert(json!({ "user_id": "u1" }), DuplicateResolution::Ignore)
            .await
            .unwrap();

        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn conditional_update_filters_on_every_column() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", "eq.3"))
            .and(query_param("version", "eq.4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 3, "version": 5 }
            ])))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server, "appointments")
            .eq("id", "3")
            .eq("version", "4")
            .update(json!({ "version": 5 }))
            .await
            .unwrap();

        assert_eq!(result[0]["version"], json!(5));
    }

    #[tokio::test]
    async fn empty_write_response_is_null() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server, "appointments")
            .eq("id", "1")
            .delete()
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn unparsed_error_keeps_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server, "doctors")
            .execute::<Value>()
            .await
            .unwrap_err();

        match err {
            PostgrestError::UnparsedApiError { message, status } => {
                assert_eq!(message, "bad gateway");
                assert_eq!(status, StatusCode::BAD_GATEWAY);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn later_filter_on_same_column_replaces_earlier() {
        let c = PostgrestClient::new("http://localhost", "k", "t", reqwest::Client::new())
            .unwrap()
            .eq("id", "1")
            .eq("id", "2");
        let url = c.build_url().unwrap();
        assert_eq!(url.query(), Some("id=eq.2"));
    }

    #[test]
    fn error_details_display() {
        let details = PostgrestApiErrorDetails {
            code: Some("23505".into()),
            message: Some("duplicate key".into()),
            details: None,
            hint: None,
        };
        assert_eq!(details.to_string(), "Code: 23505, Message: duplicate key");
    }
}
