//! HTTP client for the Splunk views collection.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dashsync_reconcile::{AccessPolicy, ReadStatus, RemoteError, RemoteResource};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Errors building a [`ViewsClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid views URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("views URL '{0}' cannot carry path segments")]
    UnsupportedUrl(String),

    #[error("failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Credentials sent with every request.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// HTTP basic authentication.
    Basic { username: String, password: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Settings for a [`ViewsClient`].
#[derive(Debug, Clone)]
pub struct ViewsClientConfig {
    /// Views collection URL, e.g.
    /// `https://127.0.0.1:8089/servicesNS/nobody/search/data/ui/views`.
    pub base_url: String,

    pub auth: Option<Auth>,

    /// Accept self-signed certificates on the management port.
    pub insecure: bool,

    pub timeout: Duration,
}

impl ViewsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            insecure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`RemoteResource`] over the Splunk views REST endpoints.
#[derive(Debug, Clone)]
pub struct ViewsClient {
    client: reqwest::Client,
    base: Url,
    auth: Option<Auth>,
}

impl ViewsClient {
    /// Create a new client.
    pub fn new(config: ViewsClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            ClientError::InvalidUrl {
                url: config.base_url.clone(),
                reason: e.to_string(),
            }
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::UnsupportedUrl(config.base_url));
        }

        if config.insecure {
            warn!(url = %base, "TLS certificate verification disabled");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            client,
            base,
            auth: config.auth,
        })
    }

    /// The views collection URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build `{base}/{segments..}`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(Auth::Bearer(token)) => request.bearer_auth(token),
            Some(Auth::Basic { username, password }) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        self.authorize(request).send().await.map_err(classify_send_error)
    }

    /// Send a form POST and require a 2xx answer.
    async fn post_form(&self, url: Url, form: &[(&str, &str)]) -> Result<(), RemoteError> {
        debug!(url = %url, "POST");
        let response = self.send(self.client.post(url).form(form)).await?;
        expect_success(response).await
    }
}

#[async_trait]
impl RemoteResource for ViewsClient {
    async fn read(&self, name: &str) -> Result<ReadStatus, RemoteError> {
        let url = self.url(&[name]);
        debug!(url = %url, "GET");

        let response = self.send(self.client.get(url)).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(ReadStatus::NotFound);
        }
        if status.is_success() {
            let body = response.text().await.ok();
            return Ok(ReadStatus::Found { body });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    async fn create(&self, name: &str, definition: &str) -> Result<(), RemoteError> {
        self.post_form(self.url(&[]), &[("name", name), ("eai:data", definition)])
            .await
    }

    async fn update(&self, name: &str, definition: &str) -> Result<(), RemoteError> {
        self.post_form(self.url(&[name]), &[("eai:data", definition)])
            .await
    }

    async fn set_policy(&self, name: &str, policy: &AccessPolicy) -> Result<(), RemoteError> {
        let read = policy.read.join(",");
        let write = policy.write.join(",");
        self.post_form(
            self.url(&[name, "acl"]),
            &[
                ("sharing", policy.sharing.as_str()),
                ("owner", policy.owner.as_str()),
                ("perms.read", read.as_str()),
                ("perms.write", write.as_str()),
            ],
        )
        .await
    }

    async fn refresh(&self) -> Result<(), RemoteError> {
        let url = self.url(&["_reload"]);
        debug!(url = %url, "GET");
        let response = self.send(self.client.get(url)).await?;
        expect_success(response).await
    }
}

async fn expect_success(response: Response) -> Result<(), RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

/// Map a non-2xx status to a retry class.
///
/// 408, 429 and 5xx are worth retrying; any other status means the request
/// itself was refused.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = format!("{}: {}", status, truncate(body.trim(), MAX_ERROR_BODY));
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        RemoteError::transient(message)
    } else {
        RemoteError::permanent(Some(status.as_u16()), message)
    }
}

fn classify_send_error(e: reqwest::Error) -> RemoteError {
    if e.is_builder() {
        RemoteError::permanent(None, e.to_string())
    } else {
        RemoteError::transient(e.to_string())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn client(base: &str) -> ViewsClient {
        ViewsClient::new(ViewsClientConfig::new(base)).unwrap()
    }

    #[test]
    fn test_url_building() {
        let c = client("https://127.0.0.1:8089/servicesNS/nobody/search/data/ui/views/");

        assert_eq!(
            c.url(&["ops"]).as_str(),
            "https://127.0.0.1:8089/servicesNS/nobody/search/data/ui/views/ops"
        );
        assert_eq!(
            c.url(&["ops", "acl"]).as_str(),
            "https://127.0.0.1:8089/servicesNS/nobody/search/data/ui/views/ops/acl"
        );
        assert_eq!(
            c.url(&[]).as_str(),
            "https://127.0.0.1:8089/servicesNS/nobody/search/data/ui/views"
        );
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let c = client("https://splunk.example.com:8089/servicesNS/nobody/search/data/ui/views");
        assert!(c.url(&["a b/c"]).as_str().ends_with("/views/a%20b%2Fc"));
    }

    #[test]
    fn test_invalid_urls_rejected() {
        assert!(matches!(
            ViewsClient::new(ViewsClientConfig::new("not a url")),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ViewsClient::new(ViewsClientConfig::new("mailto:admin@example.com")),
            Err(ClientError::UnsupportedUrl(_))
        ));
    }

    #[rstest]
    #[case(StatusCode::REQUEST_TIMEOUT, true)]
    #[case(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, true)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case(StatusCode::BAD_REQUEST, false)]
    #[case(StatusCode::UNAUTHORIZED, false)]
    #[case(StatusCode::FORBIDDEN, false)]
    #[case(StatusCode::CONFLICT, false)]
    fn test_status_classification(#[case] status: StatusCode, #[case] transient: bool) {
        let err = classify_status(status, "body");
        assert_eq!(err.is_transient(), transient);
        if !transient {
            assert_eq!(
                err,
                RemoteError::permanent(Some(status.as_u16()), format!("{status}: body"))
            );
        }
    }

    #[test]
    fn test_error_body_truncated() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let err = classify_status(StatusCode::BAD_REQUEST, &body);
        let RemoteError::Permanent { message, .. } = err else {
            panic!("expected permanent error");
        };
        assert!(message.ends_with("..."));
        assert!(message.len() < MAX_ERROR_BODY + 32);
    }

    #[test]
    fn test_auth_debug_redacts_secrets() {
        let bearer = format!("{:?}", Auth::Bearer("s3cr3t".to_string()));
        let basic = format!(
            "{:?}",
            Auth::Basic {
                username: "admin".to_string(),
                password: "changeme".to_string(),
            }
        );
        assert!(!bearer.contains("s3cr3t"));
        assert!(basic.contains("admin"));
        assert!(!basic.contains("changeme"));
    }
}
