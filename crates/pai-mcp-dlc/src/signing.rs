// crates/pai-mcp-dlc/src/signing.rs
// ============================================================================
// Module: ACS3 Request Signing
// Description: ACS3-HMAC-SHA256 canonical requests and authorization headers.
// Purpose: Authenticate outbound calls to Alibaba Cloud APIs.
// Dependencies: rand, sha2, time
// ============================================================================

//! ## Overview
//! Every outbound request is signed over its method, path, sorted query,
//! sorted lowercase headers, and the SHA-256 of its body. The signature is
//! HMAC-SHA256 keyed by the access key secret over
//! `"ACS3-HMAC-SHA256\n" + hex(sha256(canonical_request))`.
//! Security posture: the secret never leaves this module in clear text and
//! [`AcsCredentials`] redacts itself in debug output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signature algorithm name.
pub const SIGNATURE_ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// SHA-256 block size in bytes.
const HMAC_BLOCK_SIZE: usize = 64;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Access key material.
#[derive(Clone, PartialEq, Eq)]
pub struct AcsCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Access key secret.
    pub access_key_secret: String,
    /// Session token for temporary credentials.
    pub security_token: Option<String>,
}

impl fmt::Debug for AcsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request parts covered by the signature.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    /// HTTP method in upper case.
    pub method: &'a str,
    /// Unencoded request path.
    pub path: &'a str,
    /// Query parameters.
    pub query: &'a BTreeMap<String, String>,
    /// Headers to sign, keyed by lowercase name.
    pub headers: &'a BTreeMap<String, String>,
    /// Request body.
    pub body: &'a [u8],
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Builds the canonical request and the signed-header list.
#[must_use]
pub fn canonical_request(request: &SignableRequest<'_>) -> (String, String) {
    let mut canonical_headers = String::new();
    for (name, value) in request.headers {
        canonical_headers.push_str(name);
        canonical_headers.push(':');
        canonical_headers.push_str(value.trim());
        canonical_headers.push('\n');
    }
    let signed_headers = request.headers.keys().cloned().collect::<Vec<_>>().join(";");
    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        encode_path(request.path),
        canonical_query(request.query),
        canonical_headers,
        signed_headers,
        sha256_hex(request.body),
    );
    (canonical, signed_headers)
}

/// Returns the `Authorization` header value for `request`.
#[must_use]
pub fn authorization(credentials: &AcsCredentials, request: &SignableRequest<'_>) -> String {
    let (canonical, signed_headers) = canonical_request(request);
    let string_to_sign = format!("{SIGNATURE_ALGORITHM}\n{}", sha256_hex(canonical.as_bytes()));
    let signature =
        hex_encode(&hmac_sha256(credentials.access_key_secret.as_bytes(), string_to_sign.as_bytes()));
    format!(
        "{SIGNATURE_ALGORITHM} Credential={},SignedHeaders={signed_headers},Signature={signature}",
        credentials.access_key_id
    )
}

/// Encodes query parameters sorted by key.
#[must_use]
pub fn canonical_query(query: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<(String, String)> =
        query.iter().map(|(key, value)| (percent_encode(key), percent_encode(value))).collect();
    pairs.sort();
    pairs.into_iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&")
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
#[must_use]
pub fn percent_encode(value: &str) -> String {
    /// Uppercase hex digits.
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push('%');
            out.push(char::from(HEX[usize::from(byte >> 4)]));
            out.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }
    out
}

/// Encodes each path segment, keeping the separators.
#[must_use]
pub fn encode_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(percent_encode).collect::<Vec<_>>().join("/")
}

/// Formats a UTC timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn acs_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Returns a fresh random signature nonce.
#[must_use]
pub fn signature_nonce() -> String {
    hex_encode(&rand::random::<[u8; 16]>())
}

// ============================================================================
// SECTION: Primitives
// ============================================================================

/// Returns the lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_encode(&Sha256::digest(bytes))
}

/// Computes HMAC-SHA256 (RFC 2104).
#[must_use]
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut block = [0_u8; HMAC_BLOCK_SIZE];
    if key.len() > HMAC_BLOCK_SIZE {
        let digest = Sha256::digest(key);
        block[.. digest.len()].copy_from_slice(&digest);
    } else {
        block[.. key.len()].copy_from_slice(key);
    }
    let mut inner = Sha256::new();
    inner.update(block.map(|byte| byte ^ 0x36));
    inner.update(message);
    let inner_digest = inner.finalize();
    let mut outer = Sha256::new();
    outer.update(block.map(|byte| byte ^ 0x5c));
    outer.update(inner_digest);
    outer.finalize().into()
}

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    /// Lowercase hex digits.
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
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
        clippy::use_debug,
        reason = "Test-only assertions."
    )]

    use std::collections::BTreeMap;

    use time::macros::datetime;

    use super::AcsCredentials;
    use super::SignableRequest;
    use super::acs_timestamp;
    use super::authorization;
    use super::canonical_query;
    use super::canonical_request;
    use super::hex_encode;
    use super::hmac_sha256;
    use super::percent_encode;
    use super::sha256_hex;

    #[test]
    fn hmac_matches_rfc4231_case_two() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex_encode(&mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_hashes_long_keys_first() {
        let key = [0xaa_u8; 131];
        let mac = hmac_sha256(&key, b"Test Using Larger Than Block-Size Key - Hash Key First");
        assert_eq!(
            hex_encode(&mac),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    #[test]
    fn empty_body_hash_is_sha256_of_nothing() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn percent_encoding_follows_rfc3986() {
        assert_eq!(percent_encode("a b*~-_."), "a%20b%2A~-_.");
        assert_eq!(percent_encode("alice-"), "alice-");
        assert_eq!(percent_encode("/"), "%2F");
    }

    #[test]
    fn query_is_sorted_and_encoded() {
        let query = BTreeMap::from([
            ("ShowOwn".to_string(), "true".to_string()),
            ("DisplayName".to_string(), "alice train".to_string()),
        ]);
        assert_eq!(canonical_query(&query), "DisplayName=alice%20train&ShowOwn=true");
    }

    #[test]
    fn canonical_request_layout_is_stable() {
        let query = BTreeMap::from([("MaxLines".to_string(), "10".to_string())]);
        let headers = BTreeMap::from([
            ("host".to_string(), "pai-dlc.cn-hangzhou.aliyuncs.com".to_string()),
            ("x-acs-action".to_string(), "GetPodLogs".to_string()),
        ]);
        let request = SignableRequest {
            method: "GET",
            path: "/api/v1/jobs/dlc-1/pods/p 0/logs",
            query: &query,
            headers: &headers,
            body: b"",
        };
        let (canonical, signed) = canonical_request(&request);
        assert_eq!(signed, "host;x-acs-action");
        let expected = format!(
            "GET\n/api/v1/jobs/dlc-1/pods/p%200/logs\nMaxLines=10\nhost:pai-dlc.cn-hangzhou.\
             aliyuncs.com\nx-acs-action:GetPodLogs\n\nhost;x-acs-action\n{}",
            sha256_hex(b"")
        );
        assert_eq!(canonical, expected);
    }

    #[test]
    fn authorization_header_names_key_and_headers() {
        let credentials = AcsCredentials {
            access_key_id: "LTAI-test".to_string(),
            access_key_secret: "secret".to_string(),
            security_token: None,
        };
        let query = BTreeMap::new();
        let headers = BTreeMap::from([("host".to_string(), "sts.aliyuncs.com".to_string())]);
        let request = SignableRequest {
            method: "POST",
            path: "/",
            query: &query,
            headers: &headers,
            body: b"",
        };
        let header = authorization(&credentials, &request);
        assert!(header.starts_with("ACS3-HMAC-SHA256 Credential=LTAI-test,SignedHeaders=host,"));
        let signature = header.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert_eq!(header, authorization(&credentials, &request));
        assert!(!format!("{credentials:?}").contains("secret\""));
    }

    #[test]
    fn timestamp_is_utc_seconds() {
        assert_eq!(acs_timestamp(datetime!(2026-03-04 05:06:07.5 +08:00)), "2026-03-03T21:06:07Z");
    }
}
