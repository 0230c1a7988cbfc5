// crates/pai-mcp-dlc/src/transport.rs
// ============================================================================
// Module: Signed Transport
// Description: Shared signed HTTPS executor for Alibaba Cloud APIs.
// Purpose: Sign, send, size-limit, and decode every outbound API call.
// Dependencies: reqwest, serde_json, time, url
// ============================================================================

//! ## Overview
//! [`AcsTransport`] owns one `reqwest` client and the access key. Each
//! [`AcsCall`] is signed with ACS3-HMAC-SHA256, sent without following
//! redirects, read under a byte limit, and decoded as JSON. Error bodies of
//! the form `{Code, Message}` become [`AcsError::Remote`].
//! Security posture: responses are untrusted; bodies are size-capped and
//! never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use reqwest::Method;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::signing::AcsCredentials;
use crate::signing::SignableRequest;
use crate::signing::acs_timestamp;
use crate::signing::authorization;
use crate::signing::canonical_query;
use crate::signing::encode_path;
use crate::signing::sha256_hex;
use crate::signing::signature_nonce;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default response size limit in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Types
// ============================================================================

/// One API call.
#[derive(Debug, Clone)]
pub struct AcsCall {
    /// HTTP method.
    pub method: Method,
    /// Unencoded request path; segments are percent-encoded when sent.
    pub path: String,
    /// Query parameters.
    pub query: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<Value>,
    /// API action name (`x-acs-action`).
    pub action: &'static str,
    /// API version (`x-acs-version`).
    pub version: &'static str,
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcsError {
    /// Client construction or endpoint failure.
    #[error("acs config error: {0}")]
    Config(String),
    /// Request never produced a response.
    #[error("acs transport error: {0}")]
    Transport(String),
    /// Service returned an error status.
    #[error("acs error {code} (http {status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Service error code.
        code: String,
        /// Service error message.
        message: String,
    },
    /// Response exceeded the configured limit.
    #[error("acs response exceeds size limit ({actual} > {limit})")]
    ResponseTooLarge {
        /// Bytes read before aborting.
        actual: usize,
        /// Allowed maximum.
        limit: usize,
    },
    /// Response body was not valid JSON.
    #[error("acs response invalid: {0}")]
    InvalidResponse(String),
}

/// Signed HTTPS executor.
pub struct AcsTransport {
    /// HTTP client.
    client: Client,
    /// Signing key.
    credentials: AcsCredentials,
    /// Response size limit.
    max_response_bytes: usize,
}

impl AcsTransport {
    /// Builds a transport with the given timeout and response limit.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::Config`] when the HTTP client cannot be built.
    pub fn new(
        credentials: AcsCredentials,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self, AcsError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| AcsError::Config(err.to_string()))?;
        Ok(Self {
            client,
            credentials,
            max_response_bytes,
        })
    }

    /// Signs and sends `call` to `base`, returning the decoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError`] on transport failure, an error status, an
    /// oversized body, or a non-JSON body.
    pub async fn send(&self, base: &Url, call: AcsCall) -> Result<Value, AcsError> {
        let mut url = base.clone();
        url.set_path(&encode_path(&call.path));
        let query = canonical_query(&call.query);
        url.set_query(if query.is_empty() { None } else { Some(&query) });
        let body = match &call.body {
            Some(body) => {
                serde_json::to_vec(body).map_err(|err| AcsError::InvalidResponse(err.to_string()))?
            }
            None => Vec::new(),
        };
        let headers = self.signed_headers(&url, &call, &body)?;
        let mut request = self.client.request(call.method.clone(), url).headers(headers);
        if call.body.is_some() {
            request = request.body(body);
        }
        let response = request.send().await.map_err(|err| AcsError::Transport(err.to_string()))?;
        let status = response.status();
        let bytes = read_body_with_limit(response, self.max_response_bytes).await?;
        if !status.is_success() {
            return Err(remote_error(status.as_u16(), &bytes));
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&bytes).map_err(|err| AcsError::InvalidResponse(err.to_string()))
    }

    /// Builds the signed header set for one request.
    fn signed_headers(&self, url: &Url, call: &AcsCall, body: &[u8]) -> Result<HeaderMap, AcsError> {
        let host = url.host_str().ok_or_else(|| AcsError::Config("endpoint has no host".to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let mut signed = BTreeMap::from([
            ("host".to_string(), host),
            ("x-acs-action".to_string(), call.action.to_string()),
            ("x-acs-version".to_string(), call.version.to_string()),
            ("x-acs-date".to_string(), acs_timestamp(OffsetDateTime::now_utc())),
            ("x-acs-signature-nonce".to_string(), signature_nonce()),
            ("x-acs-content-sha256".to_string(), sha256_hex(body)),
        ]);
        if call.body.is_some() {
            signed.insert("content-type".to_string(), "application/json".to_string());
        }
        if let Some(token) = &self.credentials.security_token {
            signed.insert("x-acs-security-token".to_string(), token.clone());
        }
        let auth = authorization(&self.credentials, &SignableRequest {
            method: call.method.as_str(),
            path: &call.path,
            query: &call.query,
            headers: &signed,
            body,
        });
        let mut headers = HeaderMap::new();
        for (name, value) in signed.into_iter().filter(|(name, _)| name != "host") {
            headers.insert(header_name(&name)?, header_value(&value)?);
        }
        headers.insert(reqwest::header::AUTHORIZATION, header_value(&auth)?);
        headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a header name.
fn header_name(name: &str) -> Result<HeaderName, AcsError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|err| AcsError::Config(err.to_string()))
}

/// Parses a header value.
fn header_value(value: &str) -> Result<HeaderValue, AcsError> {
    HeaderValue::from_str(value).map_err(|err| AcsError::Config(err.to_string()))
}

/// Decodes an error body into [`AcsError::Remote`].
fn remote_error(status: u16, bytes: &[u8]) -> AcsError {
    let parsed: Option<Value> = serde_json::from_slice(bytes).ok();
    let field = |name: &str| {
        parsed.as_ref().and_then(|body| body.get(name)).and_then(Value::as_str).map(str::to_string)
    };
    let code = field("Code").unwrap_or_else(|| format!("Http{status}"));
    let message = field("Message")
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).trim().chars().take(512).collect());
    AcsError::Remote {
        status,
        code,
        message,
    }
}

/// Reads a response body, aborting once it exceeds `limit` bytes.
async fn read_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, AcsError> {
    let mut body = Vec::new();
    let mut total: usize = 0;
    while let Some(chunk) = response.chunk().await.map_err(|err| AcsError::Transport(err.to_string()))?
    {
        let next_total = total.checked_add(chunk.len()).ok_or(AcsError::ResponseTooLarge {
            actual: usize::MAX,
            limit,
        })?;
        if next_total > limit {
            return Err(AcsError::ResponseTooLarge {
                actual: next_total,
                limit,
            });
        }
        body.extend_from_slice(&chunk);
        total = next_total;
    }
    Ok(body)
}
