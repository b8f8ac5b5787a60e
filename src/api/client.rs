//! HTTP client for the climate and user-management API.
//!
//! Climate fetches retry on HTTP 503 with a fixed delay; every other
//! non-2xx status fails immediately with the status and server message.

use crate::api::error::extract_message;
use crate::api::query::{DocumentFilters, TemperatureFilters};
use crate::api::{ApiError, Session};
use crate::models::{parse_date, Document, TemperatureSample, User};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Unit reported when a sample carries none.
pub const DEFAULT_UNIT: &str = "°C";

/// Connection and retry settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, without the `/api/v1` prefix.
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Extra attempts after an initial 503.
    pub retries: usize,
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
            retries: 3,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

impl From<&crate::config::ApiConfig> for ClientConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Body for account creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body for account updates.
#[derive(Debug, Clone, Serialize)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest<'a> {
    new_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    documents: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TemperatureResponse {
    #[serde(default)]
    results: Vec<RawSample>,
}

#[derive(Debug, Deserialize)]
struct RawSample {
    #[serde(default)]
    date: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    unit: Option<String>,
}

/// Client for the remote API.
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        info!("Initializing API client for {}", config.base_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Fetch documents matching `filters`.
    pub async fn fetch_documents(
        &self,
        session: &Session,
        filters: &DocumentFilters,
    ) -> Result<Vec<Document>, ApiError> {
        let url = self.url("/climate/documents");
        let pairs = filters.query_pairs();
        debug!("GET {} {:?}", url, pairs);

        let response = self
            .send_with_retry(|| {
                self.http_client
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, session.bearer())
                    .query(&pairs)
            })
            .await?;

        let body: DocumentsResponse = read_json(response).await?;
        let documents = documents_from_value(body.documents.unwrap_or(Value::Null));
        info!("Fetched {} documents", documents.len());

        Ok(documents)
    }

    /// Fetch temperature samples matching `filters`.
    pub async fn fetch_temperature(
        &self,
        session: &Session,
        filters: &TemperatureFilters,
    ) -> Result<Vec<TemperatureSample>, ApiError> {
        let url = self.url("/climate/temperature");
        let pairs = filters.query_pairs();
        debug!("GET {} {:?}", url, pairs);

        let response = self
            .send_with_retry(|| {
                self.http_client
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, session.bearer())
                    .query(&pairs)
            })
            .await?;

        let body: TemperatureResponse = read_json(response).await?;
        let samples: Vec<TemperatureSample> =
            body.results.into_iter().filter_map(sample_from_raw).collect();
        info!("Fetched {} temperature samples", samples.len());

        Ok(samples)
    }

    /// Exchange credentials for a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = self
            .http_client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password });

        let response = self.send_checked(request).await?;
        let body: LoginResponse = read_json(response).await?;

        Ok(Session::new(body.token, body.user))
    }

    /// The signed-in user's profile.
    pub async fn profile(&self, session: &Session) -> Result<User, ApiError> {
        let request = self.authorized(session, self.http_client.get(self.url("/users/profile")));
        let response = self.send_checked(request).await?;
        let value: Value = read_json(response).await?;

        // Some deployments wrap the profile in {"user": ...}
        let user = value.get("user").cloned().unwrap_or(value);
        serde_json::from_value(user).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn list_users(&self, session: &Session) -> Result<Vec<User>, ApiError> {
        session.require_super_admin()?;
        let request = self.authorized(session, self.http_client.get(self.url("/users/all")));
        let response = self.send_checked(request).await?;
        let body: UsersResponse = read_json(response).await?;
        Ok(body.users)
    }

    pub async fn create_user(&self, session: &Session, user: &NewUser) -> Result<Value, ApiError> {
        session.require_super_admin()?;
        let request = self.authorized(
            session,
            self.http_client.post(self.url("/users/register")).json(user),
        );
        read_json(self.send_checked(request).await?).await
    }

    pub async fn update_user(
        &self,
        session: &Session,
        id: &str,
        update: &UserUpdate,
    ) -> Result<Value, ApiError> {
        session.require_super_admin()?;
        let request = self.authorized(
            session,
            self.http_client
                .put(self.url(&format!("/users/{}", id)))
                .json(update),
        );
        read_json(self.send_checked(request).await?).await
    }

    pub async fn delete_user(&self, session: &Session, id: &str) -> Result<Value, ApiError> {
        session.require_super_admin()?;
        let request = self.authorized(
            session,
            self.http_client.delete(self.url(&format!("/users/{}", id))),
        );
        read_json(self.send_checked(request).await?).await
    }

    pub async fn change_password(
        &self,
        session: &Session,
        id: &str,
        new_password: &str,
    ) -> Result<Value, ApiError> {
        session.require_super_admin()?;
        let request = self.authorized(
            session,
            self.http_client
                .post(self.url(&format!("/users/{}/change-password", id)))
                .json(&ChangePasswordRequest { new_password }),
        );
        read_json(self.send_checked(request).await?).await
    }

    fn authorized(&self, session: &Session, request: RequestBuilder) -> RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, session.bearer())
    }

    /// Send a request built by `build`, retrying on 503.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let response = self.send(build()).await?;

            if response.status() != StatusCode::SERVICE_UNAVAILABLE {
                return check_status(response).await;
            }

            if attempt > self.config.retries {
                warn!("Service still unavailable after {} attempts", attempt);
                return Err(ApiError::ServiceUnavailable { attempts: attempt });
            }

            warn!(
                "Service unavailable (attempt {}/{}), retrying in {}ms",
                attempt,
                self.config.retries + 1,
                self.config.retry_delay.as_millis()
            );
            tokio::time::sleep(self.config.retry_delay).await;
            attempt += 1;
        }
    }

    async fn send_checked(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.send(request).await?;
        check_status(response).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.config.timeout_seconds)
            } else if e.is_connect() {
                ApiError::Connect(self.config.base_url.clone())
            } else {
                ApiError::Network(e)
            }
        })
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Http {
        status: status.as_u16(),
        message: extract_message(&body),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return serde_json::from_str("null").map_err(|e| ApiError::Decode(e.to_string()));
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Documents from either an id-keyed object or a plain array.
///
/// Entries that are not document-shaped are skipped.
fn documents_from_value(value: Value) -> Vec<Document> {
    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        Value::Null => Vec::new(),
        other => {
            warn!("Unexpected documents payload: {}", other);
            Vec::new()
        }
    };

    entries
        .into_iter()
        .filter(|(_, v)| v.is_object())
        .filter_map(|(key, v)| match serde_json::from_value::<Document>(v) {
            Ok(mut doc) => {
                if doc.id.is_empty() {
                    doc.id = key.unwrap_or_default();
                }
                Some(doc)
            }
            Err(e) => {
                warn!("Skipping malformed document {:?}: {}", key, e);
                None
            }
        })
        .collect()
}

fn sample_from_raw(raw: RawSample) -> Option<TemperatureSample> {
    let Some(date) = parse_date(&raw.date) else {
        warn!("Skipping temperature sample with unparseable date {:?}", raw.date);
        return None;
    };

    let value = match &raw.value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite());
    let Some(value) = value else {
        warn!("Skipping temperature sample on {} with value {}", date, raw.value);
        return None;
    };

    Some(TemperatureSample {
        date,
        value,
        unit: raw.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 server answering with canned responses, one per connection.
    struct StubServer {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        async fn start(responses: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&requests);

            tokio::spawn(async move {
                for (status, body) in responses {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let request = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request);

                    let reply = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self {
                url: format!("http://{}", addr),
                requests,
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn client_for(server: &StubServer) -> ApiClient {
        ApiClient::new(ClientConfig {
            base_url: server.url.clone(),
            timeout_seconds: 5,
            retries: 3,
            retry_delay: Duration::from_millis(10),
        })
        .unwrap()
    }

    fn session() -> Session {
        Session::new("secret-token", None)
    }

    fn admin_session() -> Session {
        Session::new(
            "admin-token",
            Some(User {
                id: "1".to_string(),
                name: "Root".to_string(),
                email: "root@example.org".to_string(),
                role: Role::SuperAdmin,
                created_at: None,
            }),
        )
    }

    fn temperature_filters() -> TemperatureFilters {
        TemperatureFilters {
            location_id: "CITY:US370001".to_string(),
            datatype: "TMAX".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            units: Some("metric".to_string()),
        }
    }

    const TEMPERATURE_BODY: &str = r#"{"results": [
        {"date": "2024-01-02T00:00:00", "value": 4.5, "unit": "C"},
        {"date": "2024-01-03T00:00:00", "value": "6.0"},
        {"date": "garbage", "value": 1.0},
        {"date": "2024-01-04", "value": null}
    ]}"#;

    #[tokio::test]
    async fn test_fetch_temperature_parses_and_sends_query() {
        let server = StubServer::start(vec![(200, TEMPERATURE_BODY)]).await;
        let client = client_for(&server);

        let samples = client
            .fetch_temperature(&session(), &temperature_filters())
            .await
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, 4.5);
        assert_eq!(samples[0].unit, "C");
        assert_eq!(samples[1].value, 6.0);
        assert_eq!(samples[1].unit, DEFAULT_UNIT);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = requests[0].to_lowercase();
        assert!(request.starts_with("get /api/v1/climate/temperature?"));
        assert!(request.contains("locationid=city%3aus370001"));
        assert!(request.contains("datatypeid=tmax"));
        assert!(request.contains("startdate=2024-01-01"));
        assert!(request.contains("enddate=2024-03-31"));
        assert!(request.contains("units=metric"));
        assert!(request.contains("authorization: bearer secret-token"));
    }

    #[tokio::test]
    async fn test_fetch_temperature_skips_non_finite_values() {
        let body = r#"{"results": [
            {"date": "2024-01-02", "value": "NaN"},
            {"date": "2024-01-03", "value": "inf"},
            {"date": "2024-01-04", "value": "-Infinity"},
            {"date": "2024-01-05", "value": "7.25"}
        ]}"#;
        let server = StubServer::start(vec![(200, body)]).await;
        let client = client_for(&server);

        let samples = client
            .fetch_temperature(&session(), &temperature_filters())
            .await
            .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 7.25);
        assert!(samples.iter().all(|s| s.value.is_finite()));
    }

    #[tokio::test]
    async fn test_retries_on_503_then_succeeds() {
        let server = StubServer::start(vec![
            (503, r#"{"message": "busy"}"#),
            (503, r#"{"message": "busy"}"#),
            (200, TEMPERATURE_BODY),
        ])
        .await;
        let client = client_for(&server);

        let samples = client
            .fetch_temperature(&session(), &temperature_filters())
            .await;

        tokio_test::assert_ok!(&samples);
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let server = StubServer::start(vec![(503, "{}"); 5]).await;
        let client = client_for(&server);

        let result = client
            .fetch_temperature(&session(), &temperature_filters())
            .await;

        assert!(matches!(
            result,
            Err(ApiError::ServiceUnavailable { attempts: 4 })
        ));
        assert_eq!(server.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let server = StubServer::start(vec![
            (401, r#"{"message": "Invalid token"}"#),
            (200, TEMPERATURE_BODY),
        ])
        .await;
        let client = client_for(&server);

        let result = client
            .fetch_temperature(&session(), &temperature_filters())
            .await;

        match result {
            Err(ApiError::Http { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid token");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_documents_keyed_by_id() {
        let body = r#"{"total": 3, "documents": {
            "D1": {"docdt": "2021-05-01T00:00:00Z", "display_title": "Climate risk report", "teratopic": "risk"},
            "D2": {"id": "X2", "docdt": "2021-08-01", "display_title": "GDP growth"},
            "facets": 7
        }}"#;
        let server = StubServer::start(vec![(200, body)]).await;
        let client = client_for(&server);

        let filters = DocumentFilters {
            topic: Some("climate change".to_string()),
            region: Some("WLD".to_string()),
            start_year: Some(2019),
            end_year: Some(2024),
        };
        let mut docs = client.fetch_documents(&session(), &filters).await.unwrap();
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "D1");
        assert_eq!(docs[1].id, "X2");

        let request = server.requests()[0].clone();
        assert!(request.contains("topic=climate+change"));
        assert!(request.contains("admreg_exact=WLD"));
        assert!(request.contains("startYear=2019"));
        assert!(request.contains("endYear=2024"));
    }

    #[tokio::test]
    async fn test_fetch_documents_array_and_missing() {
        let server = StubServer::start(vec![
            (200, r#"{"documents": [{"id": "A", "display_title": "One"}]}"#),
            (200, r#"{"total": 0}"#),
        ])
        .await;
        let client = client_for(&server);

        let docs = client
            .fetch_documents(&session(), &DocumentFilters::default())
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);

        let empty = client
            .fetch_documents(&session(), &DocumentFilters::default())
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_login_builds_session() {
        let server = StubServer::start(vec![(
            200,
            r#"{"token": "jwt", "user": {"id": "7", "name": "Ada", "email": "ada@example.org", "role": "super_admin"}}"#,
        )])
        .await;
        let client = client_for(&server);

        let session = client.login("ada@example.org", "pw").await.unwrap();
        assert_eq!(session.token, "jwt");
        assert!(session.is_super_admin());

        let request = server.requests()[0].clone();
        assert!(request.starts_with("POST /api/v1/auth/login"));
        assert!(request.contains(r#""email":"ada@example.org""#));
    }

    #[tokio::test]
    async fn test_user_management_requires_super_admin() {
        let server = StubServer::start(vec![]).await;
        let client = client_for(&server);

        let result = client.list_users(&session()).await;
        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(ApiError::Forbidden)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_list_users_and_change_password() {
        let server = StubServer::start(vec![
            (
                200,
                r#"{"users": [{"_id": "a1", "name": "Ada", "email": "ada@example.org", "createdAt": "2024-01-01"}]}"#,
            ),
            (200, r#"{"message": "Password updated"}"#),
        ])
        .await;
        let client = client_for(&server);
        let admin = admin_session();

        let users = client.list_users(&admin).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "a1");

        client.change_password(&admin, "a1", "n3w").await.unwrap();

        let requests = server.requests();
        assert!(requests[0].starts_with("GET /api/v1/users/all"));
        assert!(requests[1].starts_with("POST /api/v1/users/a1/change-password"));
        assert!(requests[1].contains(r#""newPassword":"n3w""#));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(ClientConfig {
            base_url: format!("http://{}", addr),
            timeout_seconds: 5,
            retries: 0,
            retry_delay: Duration::from_millis(1),
        })
        .unwrap();

        let result = client
            .fetch_documents(&session(), &DocumentFilters::default())
            .await;
        assert!(matches!(result, Err(ApiError::Connect(_))));
    }
}
