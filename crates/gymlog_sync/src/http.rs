//! HTTP remote.
//!
//! The HTTP library is abstracted behind [`HttpClient`] so the remote can run
//! over reqwest, hyper or a test double. Bodies are JSON.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::{CredentialProvider, RemoteApi};
use async_trait::async_trait;
use gymlog_model::{DeleteRequest, ModifyRequest, StagedChange, StagedPayload, UserChanges};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest response body quoted in an error.
const MAX_ERROR_BODY: usize = 512;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Header name and value pairs.
    pub headers: Vec<(String, String)>,
    /// Body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    pub fn json_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self.header("Content-Type", "application/json")
    }

    /// Looks up a header, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name and value pairs.
    pub headers: Vec<(String, String)>,
    /// Body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with a status and body and no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// HTTP client abstraction.
///
/// Only transport failures are errors; any status the server sends back,
/// including 4xx and 5xx, is an `Ok` response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and waits for the full response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Maps a response status onto the sync error taxonomy.
pub fn classify(response: &HttpResponse) -> SyncResult<()> {
    match response.status {
        s if (200..300).contains(&s) => Ok(()),
        409 => Err(SyncError::VersionConflict),
        503 => Err(SyncError::WriteLockBusy {
            retry_after: response
                .header("Retry-After")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        }),
        401 | 403 => Err(SyncError::Unauthenticated),
        status => {
            let mut message = String::from_utf8_lossy(&response.body).into_owned();
            if message.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                message.truncate(end);
            }
            Err(SyncError::ServerError { status, message })
        }
    }
}

/// [`RemoteApi`] over HTTP with bearer authentication.
pub struct HttpRemote<C, P> {
    base_url: String,
    timeout: Duration,
    client: C,
    credentials: P,
}

impl<C: HttpClient, P: CredentialProvider> HttpRemote<C, P> {
    /// Creates a remote for the server named in `config`.
    pub fn new(config: &SyncConfig, client: C, credentials: P) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: config.timeout,
            client,
            credentials,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        let token = self.credentials.access_token().await?;
        let request = request.header("Authorization", format!("Bearer {token}"));
        let method = request.method;
        let url = request.url.clone();

        let response = tokio::time::timeout(self.timeout, self.client.send(request))
            .await
            .map_err(|_| SyncError::transport_retryable(format!("{url}: timed out")))?
            .map_err(|e| SyncError::transport_retryable(format!("{url}: {e}")))?;

        debug!(?method, %url, status = response.status, "request finished");
        if let Err(err) = classify(&response) {
            if !matches!(err, SyncError::VersionConflict) {
                warn!(?method, %url, status = response.status, "request rejected");
            }
            return Err(err);
        }
        Ok(response)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> SyncResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| SyncError::Protocol(format!("encode request: {e}")))
}

fn modify_body<T: Serialize>(version: u64, item: &T) -> SyncResult<Vec<u8>> {
    to_json(&ModifyRequest { version, item })
}

#[async_trait]
impl<C: HttpClient, P: CredentialProvider> RemoteApi for HttpRemote<C, P> {
    async fn changes_since(&self, version: u64) -> SyncResult<UserChanges> {
        let request = HttpRequest::new(HttpMethod::Get, self.url(&format!("user?since={version}")));
        let response = self.execute(request).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Protocol(format!("decode changes: {e}")))
    }

    async fn upload(&self, change: &StagedChange) -> SyncResult<()> {
        let url = self.url(&change.payload.route());
        let version = change.version;
        let body = match &change.payload {
            StagedPayload::MeasurementSet { value, .. } => value
                .as_value()
                .map(|item| modify_body(version, item))
                .transpose()?,
            StagedPayload::Workout { value, .. } => value
                .as_value()
                .map(|item| modify_body(version, item))
                .transpose()?,
            StagedPayload::Exercise { value, .. } => value
                .as_value()
                .map(|item| modify_body(version, item))
                .transpose()?,
        };
        let request = match body {
            Some(body) => HttpRequest::new(HttpMethod::Put, url).json_body(body),
            None => HttpRequest::new(HttpMethod::Delete, url)
                .json_body(to_json(&DeleteRequest { version })?),
        };
        self.execute(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymlog_model::{Staged, Uuid, Workout};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Scripted {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<HttpResponse, String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for Scripted {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.seen.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err("no response scripted".into()))
        }
    }

    struct Token(Option<&'static str>);

    #[async_trait]
    impl CredentialProvider for Token {
        async fn access_token(&self) -> SyncResult<String> {
            self.0.map(str::to_string).ok_or(SyncError::Unauthenticated)
        }

        async fn logout(&self) -> SyncResult<()> {
            Ok(())
        }
    }

    fn remote(responses: Vec<Result<HttpResponse, String>>) -> HttpRemote<Scripted, Token> {
        HttpRemote::new(
            &SyncConfig::new("https://gym.example/"),
            Scripted::new(responses),
            Token(Some("t0k")),
        )
    }

    fn workout_change(deleted: bool) -> (Uuid, StagedChange) {
        let id = Uuid::new_v4();
        let value = if deleted {
            Staged::Deleted
        } else {
            Staged::Value(Workout::new(id).with_notes("legs"))
        };
        (
            id,
            StagedChange::new(
                7,
                StagedPayload::Workout {
                    workout_id: id,
                    value,
                },
            ),
        )
    }

    #[test]
    fn status_classification() {
        assert!(classify(&HttpResponse::new(204, "")).is_ok());
        assert!(matches!(
            classify(&HttpResponse::new(409, "")),
            Err(SyncError::VersionConflict)
        ));
        assert!(matches!(
            classify(&HttpResponse::new(401, "")),
            Err(SyncError::Unauthenticated)
        ));
        assert!(matches!(
            classify(&HttpResponse::new(403, "")),
            Err(SyncError::Unauthenticated)
        ));
        let busy = classify(&HttpResponse::new(503, "").with_header("retry-after", " 12 "));
        assert_eq!(
            busy.unwrap_err().retry_after(),
            Some(Duration::from_secs(12))
        );
        let busy = classify(&HttpResponse::new(503, ""));
        assert!(matches!(
            busy,
            Err(SyncError::WriteLockBusy { retry_after: None })
        ));
        let long = "é".repeat(MAX_ERROR_BODY);
        match classify(&HttpResponse::new(500, long)) {
            Err(SyncError::ServerError { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.len() <= MAX_ERROR_BODY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn pull_sends_bearer_token_and_decodes() {
        let remote = remote(vec![Ok(HttpResponse::new(200, r#"{"version": 12}"#))]);
        let changes = remote.changes_since(4).await.unwrap();
        assert_eq!(changes, UserChanges::at_version(12));

        let seen = remote.client.seen.lock();
        assert_eq!(seen[0].method, HttpMethod::Get);
        assert_eq!(seen[0].url, "https://gym.example/user?since=4");
        assert_eq!(seen[0].header_value("authorization"), Some("Bearer t0k"));
    }

    #[tokio::test]
    async fn upsert_is_a_put_with_version_and_item() {
        let remote = remote(vec![Ok(HttpResponse::new(200, ""))]);
        let (id, change) = workout_change(false);
        remote.upload(&change).await.unwrap();

        let seen = remote.client.seen.lock();
        assert_eq!(seen[0].method, HttpMethod::Put);
        assert_eq!(seen[0].url, format!("https://gym.example/user/workout/{id}"));
        let body: serde_json::Value =
            serde_json::from_slice(seen[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["version"], 7);
        assert_eq!(body["item"]["notes"], "legs");
    }

    #[tokio::test]
    async fn delete_carries_only_the_version() {
        let remote = remote(vec![Ok(HttpResponse::new(200, ""))]);
        let (_, change) = workout_change(true);
        remote.upload(&change).await.unwrap();

        let seen = remote.client.seen.lock();
        assert_eq!(seen[0].method, HttpMethod::Delete);
        let body: serde_json::Value =
            serde_json::from_slice(seen[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "version": 7 }));
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let remote = remote(vec![
            Ok(HttpResponse::new(409, "")),
            Err("connection refused".into()),
            Ok(HttpResponse::new(200, "not json")),
        ]);
        let (_, change) = workout_change(false);
        assert!(matches!(
            remote.upload(&change).await,
            Err(SyncError::VersionConflict)
        ));
        assert!(matches!(
            remote.upload(&change).await,
            Err(SyncError::Transport { retryable: true, .. })
        ));
        assert!(matches!(
            remote.changes_since(0).await,
            Err(SyncError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn missing_token_stops_before_sending() {
        let remote = HttpRemote::new(
            &SyncConfig::new("https://gym.example"),
            Scripted::new(vec![]),
            Token(None),
        );
        assert!(remote.changes_since(0).await.unwrap_err().is_unauthenticated());
        assert!(remote.client.seen.lock().is_empty());
    }
}
