// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Bearer-token claims shared by `agor-gateway` (which mints the CLI/browser
//! tokens and verifies every request) and `agor-scheduler` (which mints a
//! short-lived token per spawned executor). Both sides hold the same
//! `AGOR_TOKEN_SECRET`, so minting and verifying never have to live in the
//! same process — only the secret does.
//!
//! Tokens are `base64url(header).base64url(payload).base64url(hmac)`, the
//! same three-part shape as a JWT but with a fixed header and no algorithm
//! negotiation: one scheme, HMAC-SHA256, nothing to downgrade.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use agor_model::{AgorError, EntityId, ErrorKind};

type HmacSha256 = Hmac<Sha256>;

/// Role carried by a token. `Operator` is a full CLI/browser session;
/// `Executor` is the short-lived token a spawned subprocess presents back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Executor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: EntityId,
    pub role: Role,
    /// Unix seconds. Checked with a strict `<=` against the verifier's clock.
    pub exp: i64,
}

const HEADER: &str = "agor.hs256.v1";

/// Signs `claims` with `secret`, returning the three-part token string.
pub fn sign(secret: &[u8], claims: &Claims) -> Result<String, AgorError> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| AgorError::with_source(ErrorKind::Internal, "encoding claims", e))?;
    let header = URL_SAFE_NO_PAD.encode(HEADER.as_bytes());
    let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
    let signing_input = format!("{header}.{payload_b64}");
    let sig = mac_of(secret, signing_input.as_bytes())?;
    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig)))
}

/// Verifies `token` against `secret` and the current time, returning the
/// claims on success. Rejects a mismatched header, a bad signature, or a
/// token past its `exp`.
pub fn verify(secret: &[u8], token: &str, now_unix: i64) -> Result<Claims, AgorError> {
    let mut parts = token.split('.');
    let (header_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(AgorError::new(ErrorKind::Auth, "malformed token")),
    };

    let header = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| AgorError::new(ErrorKind::Auth, "malformed token header"))?;
    if header != HEADER.as_bytes() {
        return Err(AgorError::new(ErrorKind::Auth, "unsupported token header"));
    }

    let signing_input = format!("{header_b64}.{payload_b64}");
    let expected = mac_of(secret, signing_input.as_bytes())?;
    let given = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AgorError::new(ErrorKind::Auth, "malformed token signature"))?;
    if expected.len() != given.len() || expected.ct_eq(&given).unwrap_u8() != 1 {
        return Err(AgorError::new(ErrorKind::Auth, "token signature mismatch"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AgorError::new(ErrorKind::Auth, "malformed token payload"))?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|_| AgorError::new(ErrorKind::Auth, "malformed token claims"))?;

    if claims.exp <= now_unix {
        return Err(AgorError::new(ErrorKind::Auth, "token expired"));
    }

    Ok(claims)
}

fn mac_of(secret: &[u8], data: &[u8]) -> Result<Vec<u8>, AgorError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AgorError::with_source(ErrorKind::Internal, "constructing HMAC key", e))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let claims = Claims { sub: EntityId::new(), role: Role::Operator, exp: 1_000_000_100 };
        let token = sign(b"secret", &claims).unwrap();
        let verified = verify(b"secret", &token, 1_000_000_000).unwrap();
        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.role, Role::Operator);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims { sub: EntityId::new(), role: Role::Executor, exp: 1_000_000_100 };
        let token = sign(b"secret", &claims).unwrap();
        let err = verify(b"other-secret", &token, 1_000_000_000).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims { sub: EntityId::new(), role: Role::Operator, exp: 1_000_000_000 };
        let token = sign(b"secret", &claims).unwrap();
        let err = verify(b"secret", &token, 1_000_000_001).unwrap_err();
        assert_eq!(err.message, "token expired");
    }

    #[test]
    fn malformed_token_is_rejected() {
        let err = verify(b"secret", "not-a-token", 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let claims = Claims { sub: EntityId::new(), role: Role::Operator, exp: 1_000_000_100 };
        let token = sign(b"secret", &claims).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = "ZXZpbA"; // base64url("evil"), truncated on purpose to alter the payload
        let tampered = parts.join(".");
        let err = verify(b"secret", &tampered, 1_000_000_000).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
    }
}
