// HTTP transport for the shuro API
//
// One request/response cycle per call:
// - Http: reqwest-backed transport with JSON encoding/decoding and cancellation
// - Retry: retryable status set and linear backoff schedule

pub mod http;
pub mod retry;

pub use http::*;
pub use retry::*;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Per-request options
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// JSON body sent with the request
    pub json_body: Option<Value>,
    /// Query string parameters
    pub query: Vec<(String, String)>,
    /// Overrides the transport default (GET: configured policy, others: no retry)
    pub retry: Option<RetryPolicy>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            json_body: None,
            query: Vec::new(),
            retry: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post<B: Serialize>(body: &B) -> Result<Self> {
        Self::new(Method::POST).with_json(body)
    }

    pub fn put<B: Serialize>(body: &B) -> Result<Self> {
        Self::new(Method::PUT).with_json(body)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.json_body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}
