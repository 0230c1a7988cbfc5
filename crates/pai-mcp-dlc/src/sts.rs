// crates/pai-mcp-dlc/src/sts.rs
// ============================================================================
// Module: STS Identity Client
// Description: IdentityResolver implementation over STS GetCallerIdentity.
// Purpose: Resolve the account and user behind the configured access key.
// Dependencies: async-trait, pai-mcp-core, reqwest, url
// ============================================================================

//! ## Overview
//! Calls the RPC-style `GetCallerIdentity` action on `sts.aliyuncs.com`.
//! A response missing the account id, user id, or identity type is an
//! [`IdentityError::Incomplete`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use pai_mcp_core::CallerIdentity;
use pai_mcp_core::IdentityError;
use pai_mcp_core::IdentityResolver;
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::signing::AcsCredentials;
use crate::transport::AcsCall;
use crate::transport::AcsError;
use crate::transport::AcsTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// STS API version.
pub const STS_API_VERSION: &str = "2015-04-01";

/// Global STS endpoint.
pub const STS_ENDPOINT: &str = "https://sts.aliyuncs.com";

// ============================================================================
// SECTION: Client
// ============================================================================

/// STS client.
pub struct StsClient {
    /// Signed executor.
    transport: AcsTransport,
    /// Service base URL.
    base: Url,
}

impl StsClient {
    /// Builds a client, optionally against a non-default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::Config`] when the endpoint or HTTP client is
    /// invalid.
    pub fn new(
        credentials: AcsCredentials,
        endpoint_override: Option<Url>,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self, AcsError> {
        let base = match endpoint_override {
            Some(url) => url,
            None => Url::parse(STS_ENDPOINT).map_err(|err| AcsError::Config(err.to_string()))?,
        };
        Ok(Self {
            transport: AcsTransport::new(credentials, timeout, max_response_bytes)?,
            base,
        })
    }
}

#[async_trait]
impl IdentityResolver for StsClient {
    async fn resolve_caller_identity(&self) -> Result<CallerIdentity, IdentityError> {
        let response = self
            .transport
            .send(&self.base, AcsCall {
                method: Method::POST,
                path: "/".to_string(),
                query: BTreeMap::new(),
                body: None,
                action: "GetCallerIdentity",
                version: STS_API_VERSION,
            })
            .await
            .map_err(|err| match err {
                AcsError::Remote {
                    code,
                    message,
                    ..
                } => IdentityError::Remote {
                    code,
                    message,
                },
                other => IdentityError::Transport(other.to_string()),
            })?;
        parse_caller_identity(&response)
    }
}

/// Decodes a `GetCallerIdentity` response.
///
/// # Errors
///
/// Returns [`IdentityError::Incomplete`] when a required field is missing.
pub fn parse_caller_identity(response: &Value) -> Result<CallerIdentity, IdentityError> {
    let field = |name: &str| {
        response
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| IdentityError::Incomplete(format!("response is missing {name}")))
    };
    Ok(CallerIdentity {
        account_id: field("AccountId")?,
        user_id: field("UserId")?,
        identity_type: field("IdentityType")?,
        arn: field("Arn").ok(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use pai_mcp_core::IdentityError;
    use serde_json::json;

    use super::parse_caller_identity;

    #[test]
    fn identity_requires_core_fields() {
        let identity = parse_caller_identity(&json!({
            "AccountId": "1001",
            "UserId": "2002",
            "IdentityType": "RAMUser",
            "Arn": "acs:ram::1001:user/alice"
        }))
        .unwrap();
        assert_eq!(identity.user_id, "2002");
        assert_eq!(identity.arn.as_deref(), Some("acs:ram::1001:user/alice"));

        let missing = parse_caller_identity(&json!({ "AccountId": "1001", "IdentityType": "RAMUser" }));
        assert!(matches!(missing, Err(IdentityError::Incomplete(message)) if message.contains("UserId")));
    }
}
