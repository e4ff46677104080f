use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::{Result, ClientError};
use super::{RequestOptions, RetryPolicy};

/// Header carrying the client-generated request id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Structured error body returned by the shuro API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// reqwest-backed transport for the shuro API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    default_retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("shuro-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;

        Ok(Self::with_client(
            client,
            &config.base_url,
            RetryPolicy::new(config.retry_count, config.retry_delay()),
        ))
    }

    pub fn with_client(client: Client, base_url: &str, default_retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Only GET requests are retried unless the caller asks otherwise
    fn policy_for(&self, options: &RequestOptions) -> RetryPolicy {
        match options.retry {
            Some(policy) => policy,
            None if options.method == Method::GET => self.default_retry,
            None => RetryPolicy::none(),
        }
    }

    fn build_request(&self, url: &str, options: &RequestOptions, request_id: Uuid) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(options.method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id.to_string());

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.json_body {
            request = request.json(body);
        }

        request
    }

    /// Perform one request/response cycle, retrying transient statuses.
    ///
    /// Resolves with the decoded body on 2xx. Fails with `ClientError::Api`
    /// on other statuses or once retries are exhausted, and with
    /// `ClientError::Cancelled` as soon as `cancel` fires.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!(
            "request",
            %request_id,
            method = %options.method,
            path = %path
        );

        self.execute(path, options, cancel, request_id)
            .instrument(span)
            .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
        cancel: &CancellationToken,
        request_id: Uuid,
    ) -> Result<T> {
        let policy = self.policy_for(&options);
        let url = self.format_url(path);
        let mut retries = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            debug!("Sending {} {}", options.method, url);
            let request = self.build_request(&url, &options, request_id);
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                response = request.send() => response?,
            };

            let status = response.status();
            if status.is_success() {
                let body = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    body = response.bytes() => body?,
                };
                // A response that arrives after cancellation must not be applied
                if cancel.is_cancelled() {
                    return Err(ClientError::Cancelled);
                }
                debug!("Received {} ({} bytes)", status, body.len());
                return decode_body(&body);
            }

            if policy.should_retry(status, retries) {
                retries += 1;
                let delay = policy.delay_for(retries);
                warn!(
                    "Transient status {} from {}, retry {}/{} in {:?}",
                    status, url, retries, policy.retry_count, delay
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }

            let text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            let detail = extract_detail(status, &text);
            debug!("Request failed with {}: {}", status, detail);
            return Err(ClientError::Api { status, detail });
        }
    }
}

/// Empty bodies (e.g. 204) decode as JSON `null`
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Error text for display: `{"detail": ...}` when present, else the raw
/// body, else the status reason.
pub fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorBody { detail: Some(detail) }) = serde_json::from_str::<ErrorBody>(body) {
        let rendered = render_detail(&detail);
        if !rendered.is_empty() {
            return rendered;
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status.canonical_reason().unwrap_or("Unknown error").to_string()
}

fn render_detail(detail: &Value) -> String {
    match detail {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        // Validation errors: [{"loc": [...], "msg": "...", "type": "..."}]
        Value::Array(items) => items
            .iter()
            .map(|item| match item.get("msg").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => render_detail(item),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => detail.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_from_string() {
        let detail = extract_detail(StatusCode::NOT_FOUND, r#"{"detail":"Project not found"}"#);
        assert_eq!(detail, "Project not found");
    }

    #[test]
    fn test_extract_detail_from_validation_errors() {
        let body = r#"{"detail":[{"loc":["body","source_url"],"msg":"field required","type":"value_error.missing"},{"loc":["body"],"msg":"bad language"}]}"#;
        assert_eq!(
            extract_detail(StatusCode::UNPROCESSABLE_ENTITY, body),
            "field required; bad language"
        );
    }

    #[test]
    fn test_extract_detail_falls_back_to_body_then_reason() {
        assert_eq!(extract_detail(StatusCode::BAD_GATEWAY, "upstream down\n"), "upstream down");
        assert_eq!(extract_detail(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
        assert_eq!(extract_detail(StatusCode::BAD_GATEWAY, r#"{"detail":null}"#), r#"{"detail":null}"#);
    }

    #[test]
    fn test_decode_empty_body_as_null() {
        let _: () = decode_body(b"").unwrap();
        let none: Option<u32> = decode_body(b"  \n").unwrap();
        assert_eq!(none, None);
        let value: Vec<u32> = decode_body(b"[1,2]").unwrap();
        assert_eq!(value, vec![1, 2]);
    }

    #[test]
    fn test_policy_defaults_by_method() {
        let transport = HttpTransport::with_client(
            Client::new(),
            "http://localhost:8000/",
            RetryPolicy::new(3, std::time::Duration::from_millis(5)),
        );
        assert_eq!(transport.base_url(), "http://localhost:8000");
        assert_eq!(transport.format_url("/projects"), "http://localhost:8000/api/projects");
        assert_eq!(transport.policy_for(&RequestOptions::get()).retry_count, 3);
        assert_eq!(transport.policy_for(&RequestOptions::delete()), RetryPolicy::none());
        let forced = RequestOptions::delete().with_retry(RetryPolicy::new(1, std::time::Duration::ZERO));
        assert_eq!(transport.policy_for(&forced).retry_count, 1);
    }
}
