use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::config::ClientConfig;
use crate::error::StreamError;
use crate::protocol::chat::ErrorEnvelope;

/// Response body of an open stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

const ORGANIZATION_HEADER: HeaderName = HeaderName::from_static("openai-organization");
const ERROR_MESSAGE_MAX_LEN: usize = 500;

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    connect_timeout: Duration,
    timeout: Duration,
    use_env_proxy: bool,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, StreamError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout);

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| StreamError::Transport(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| StreamError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Pooled HTTP transport that opens streaming chat-completion requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with connection pooling and timeouts from the given config.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Transport`] if the proxy URL is rejected or the
    /// client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, StreamError> {
        let pool_idle_timeout = if config.pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(config.pool_idle_timeout())
        };
        let client = build_reqwest_client(
            config.pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            config.connect_timeout(),
            config.timeout(),
            config.use_env_proxy,
            config.proxy.as_deref(),
        )?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST `body` as JSON and return the response body as a byte stream.
    ///
    /// Non-success statuses are read in full and returned as
    /// [`StreamError::Upstream`], carrying the decoded provider error object
    /// when the body has one.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Transport`] when the request cannot be sent and
    /// [`StreamError::Upstream`] for non-2xx responses.
    pub async fn open_stream(
        &self,
        url: &str,
        bearer: &str,
        organization: Option<&str>,
        body: Bytes,
    ) -> Result<ByteStream, StreamError> {
        let headers = build_stream_headers(bearer, organization)?;
        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|err| StreamError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_bytes = response
                .bytes()
                .await
                .map_err(|e| StreamError::Transport(format!("Failed to read error body: {e}")))?;
            tracing::debug!(status = status.as_u16(), "upstream rejected stream request");
            return Err(upstream_error(status.as_u16(), &body_bytes));
        }

        tracing::debug!(status = status.as_u16(), url, "upstream stream opened");
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from))
            .boxed())
    }
}

fn build_stream_headers(
    bearer: &str,
    organization: Option<&str>,
) -> Result<HeaderMap, StreamError> {
    let mut headers = HeaderMap::with_capacity(4);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    let mut auth = HeaderValue::try_from(format!("Bearer {bearer}"))
        .map_err(|_| StreamError::Config("api_key contains invalid header characters".into()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    if let Some(organization) = organization.filter(|org| !org.is_empty()) {
        let value = HeaderValue::try_from(organization).map_err(|_| {
            StreamError::Config("organization contains invalid header characters".into())
        })?;
        headers.insert(ORGANIZATION_HEADER, value);
    }
    Ok(headers)
}

/// Build an upstream error from a non-2xx response body.
///
/// Uses `error.message` from a provider error envelope when present, otherwise
/// the body text, capped at 500 bytes.
fn upstream_error(status: u16, body: &[u8]) -> StreamError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => StreamError::Upstream {
            status,
            message: truncate(&envelope.error.message),
            body: Some(envelope.error),
        },
        Err(_) => StreamError::Upstream {
            status,
            message: truncate(String::from_utf8_lossy(body).trim()),
            body: None,
        },
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= ERROR_MESSAGE_MAX_LEN {
        return text.to_string();
    }
    let mut end = ERROR_MESSAGE_MAX_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_from_envelope() {
        let body = br#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#;
        let StreamError::Upstream {
            status,
            message,
            body,
        } = upstream_error(401, body)
        else {
            panic!("expected upstream error");
        };
        assert_eq!(status, 401);
        assert_eq!(message, "Incorrect API key provided");
        assert_eq!(body.unwrap().code.as_deref(), Some("invalid_api_key"));
    }

    #[test]
    fn test_upstream_error_raw_body() {
        let err = upstream_error(502, b"  Bad Gateway\n");
        assert!(matches!(
            err,
            StreamError::Upstream { status: 502, ref message, body: None } if message == "Bad Gateway"
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let long = "é".repeat(400);
        let out = truncate(&long);
        assert!(out.ends_with("..."));
        assert!(out.len() <= ERROR_MESSAGE_MAX_LEN + 3);
    }

    #[test]
    fn test_stream_headers() {
        let headers = build_stream_headers("sk-test", Some("org-1")).unwrap();
        assert_eq!(headers[ACCEPT], "text/event-stream");
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers["openai-organization"], "org-1");

        let headers = build_stream_headers("sk-test", None).unwrap();
        assert!(!headers.contains_key("openai-organization"));
        assert!(build_stream_headers("sk\ntest", None).is_err());
    }

    #[test]
    fn test_transport_builds_with_proxy() {
        let mut config = ClientConfig::new("sk-test");
        config.proxy = Some("http://127.0.0.1:3128".to_string());
        assert!(HttpTransport::new(&config).is_ok());
    }
}
