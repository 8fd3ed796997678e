//! Credentials accepted on the collection trigger.
//!
//! Two mechanisms, either of which admits a request:
//! - a scheduler-signed JWT (HS256) in `Upstash-Signature`, verified against
//!   the current or the next signing key so keys can rotate without downtime;
//! - a static `Authorization: Bearer <token>` header.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

pub const SIGNATURE_HEADER: &str = "Upstash-Signature";
const SIGNATURE_ISSUER: &str = "Upstash";

type HmacSha256 = Hmac<Sha256>;

#[derive(Deserialize)]
struct JwtHeader {
    alg: String,
}

#[derive(Deserialize)]
struct SignatureClaims {
    iss: String,
    exp: i64,
    #[serde(default)]
    nbf: Option<i64>,
    body: String,
}

#[derive(Debug, Clone, Default)]
pub struct TriggerAuth {
    signing_keys: Vec<String>,
    bearer_token: Option<String>,
}

impl TriggerAuth {
    /// Empty keys and tokens count as unset.
    pub fn new(current_key: Option<String>, next_key: Option<String>, bearer_token: Option<String>) -> Self {
        let signing_keys = [current_key, next_key]
            .into_iter()
            .flatten()
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            signing_keys,
            bearer_token: bearer_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.signing_keys.is_empty() || self.bearer_token.is_some()
    }

    /// Accepts the request if either credential checks out.
    ///
    /// `signature` and `authorization` are the raw header values, `body` the
    /// raw request body, `now_secs` the current Unix time.
    pub fn authorize(
        &self,
        signature: Option<&str>,
        authorization: Option<&str>,
        body: &[u8],
        now_secs: i64,
    ) -> Result<(), AuthError> {
        if !self.is_configured() {
            return Err(AuthError::NotConfigured);
        }

        let mut failure = AuthError::Missing;

        if let Some(token) = signature.filter(|_| !self.signing_keys.is_empty()) {
            match self.verify_signature(token, body, now_secs) {
                Ok(()) => return Ok(()),
                Err(e) => failure = e,
            }
        }

        if let (Some(header), Some(expected)) = (authorization, &self.bearer_token) {
            let presented = header.strip_prefix("Bearer ").unwrap_or_default().trim();
            if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
                return Ok(());
            }
            if failure == AuthError::Missing {
                failure = AuthError::Token;
            }
        }

        Err(failure)
    }

    fn verify_signature(&self, token: &str, body: &[u8], now_secs: i64) -> Result<(), AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Signature("malformed token".to_string()));
        };

        let jwt_header: JwtHeader = decode_segment(header)?;
        if jwt_header.alg != "HS256" {
            return Err(AuthError::Signature(format!("unsupported alg {}", jwt_header.alg)));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::Signature(e.to_string()))?;
        let signing_input = &token[..header.len() + 1 + payload.len()];

        let verified = self.signing_keys.iter().any(|key| {
            HmacSha256::new_from_slice(key.as_bytes())
                .map(|mut mac| {
                    mac.update(signing_input.as_bytes());
                    mac.verify_slice(&signature).is_ok()
                })
                .unwrap_or(false)
        });
        if !verified {
            return Err(AuthError::Signature("signature mismatch".to_string()));
        }

        let claims: SignatureClaims = decode_segment(payload)?;
        if claims.iss != SIGNATURE_ISSUER {
            return Err(AuthError::Signature(format!("unexpected issuer {}", claims.iss)));
        }
        if claims.exp <= now_secs {
            return Err(AuthError::Signature("token expired".to_string()));
        }
        if claims.nbf.is_some_and(|nbf| nbf > now_secs) {
            return Err(AuthError::Signature("token not yet valid".to_string()));
        }

        let body_hash = URL_SAFE_NO_PAD.encode(Sha256::digest(body));
        if claims.body.trim_end_matches('=') != body_hash {
            return Err(AuthError::Signature("body hash mismatch".to_string()));
        }

        Ok(())
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let raw = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::Signature(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| AuthError::Signature(e.to_string()))
}
