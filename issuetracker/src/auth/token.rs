//! Bearer token issuance and validation.
//!
//! Tokens are compact HS256 JWS strings signed with the process secret. The
//! signature is checked before any claim is looked at; only then are the
//! `[iat, exp)` bounds compared against the caller's `now`. Timestamps are whole
//! Unix seconds.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{api::models::users::Role, auth::principal::Principal, config::Config, errors::Error};

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // Subject (username)
    pub roles: Vec<Role>, // Roles at issue time
    pub iat: i64,         // Issued at
    pub exp: i64,         // Expiration time
}

impl Claims {
    pub fn new(principal: &Principal, now: DateTime<Utc>, ttl_secs: i64) -> Self {
        let iat = now.timestamp();
        Self {
            sub: principal.username.clone(),
            roles: principal.roles.iter().copied().collect(),
            iat,
            exp: iat.saturating_add(ttl_secs),
        }
    }
}

/// Why a presented token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not a well-formed token, or the claims do not have the expected shape
    #[error("malformed token")]
    Malformed,
    /// Signed with another key or algorithm, or altered after signing
    #[error("token signature mismatch")]
    SignatureMismatch,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureMismatch,
            // Everything else, including bad base64, bad JSON and missing claims
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and validates tokens with a secret fixed at construction.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").field("ttl_secs", &self.ttl_secs).finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time bounds are checked against an explicit `now` in `validate`
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret_key = config.secret_key.as_ref().ok_or_else(|| Error::Internal {
            operation: "token signing: secret_key is required".to_string(),
        })?;

        Ok(Self::new(secret_key.as_bytes(), config.auth.security.jwt_expiry))
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.max(0) as u64)
    }

    /// Sign a token for `principal`, valid from `now` for the configured TTL.
    pub fn issue(&self, principal: &Principal, now: DateTime<Utc>) -> Result<String, Error> {
        let claims = Claims::new(principal, now, self.ttl_secs);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| Error::Internal {
            operation: format!("sign token: {e}"),
        })
    }

    /// Check a presented token and return its claims unchanged.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        let now = now.timestamp();
        if now < claims.iat {
            return Err(TokenError::NotYetValid);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const TTL: Duration = Duration::from_secs(3600);

    fn alice() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            roles: BTreeSet::from([Role::User]),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, TTL)
    }

    /// Replace the character at `idx` with a different base64url character.
    fn flip_char(token: &str, idx: usize) -> String {
        let mut chars: Vec<char> = token.chars().collect();
        chars[idx] = if chars[idx] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_issue_then_validate_returns_claims() {
        let codec = codec();
        let now = at(1_700_000_000);
        let principal = Principal {
            roles: BTreeSet::from([Role::User, Role::Admin]),
            ..alice()
        };

        let token = codec.issue(&principal, now).unwrap();
        let claims = codec.validate(&token, now).unwrap();

        assert_eq!(claims, Claims::new(&principal, now, 3600));
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec![Role::User, Role::Admin]);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_is_compact_jws() {
        let token = codec().issue(&alice(), at(1_700_000_000)).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = codec();
        let issued = 1_700_000_000;
        let token = codec.issue(&alice(), at(issued)).unwrap();

        assert!(codec.validate(&token, at(issued + 3599)).is_ok());
        assert_eq!(codec.validate(&token, at(issued + 3600)), Err(TokenError::Expired));
        assert_eq!(codec.validate(&token, at(issued + 86400)), Err(TokenError::Expired));
    }

    #[test]
    fn test_not_yet_valid() {
        let codec = codec();
        let token = codec.issue(&alice(), at(1_700_000_000)).unwrap();

        assert_eq!(codec.validate(&token, at(1_699_999_999)), Err(TokenError::NotYetValid));
    }

    #[test]
    fn test_single_character_flip_in_payload_or_signature() {
        let codec = codec();
        let now = at(1_700_000_000);
        let token = codec.issue(&alice(), now).unwrap();
        let payload_start = token.find('.').unwrap() + 1;

        for idx in payload_start..token.len() {
            if token.as_bytes()[idx] == b'.' {
                continue;
            }
            let tampered = flip_char(&token, idx);
            assert_eq!(
                codec.validate(&tampered, now),
                Err(TokenError::SignatureMismatch),
                "flipping character {idx} was not detected"
            );
        }
    }

    #[test]
    fn test_forged_claims_rejected() {
        let codec = codec();
        let now = at(1_700_000_000);
        let token = codec.issue(&alice(), now).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        // Re-sign elevated claims with a different key, keep the original header
        let forged_claims = Claims {
            roles: vec![Role::User, Role::Admin],
            exp: now.timestamp() + 10 * 365 * 86400,
            ..codec.validate(&token, now).unwrap()
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &forged_claims,
            &EncodingKey::from_secret(b"attacker-controlled-secret-value!"),
        )
        .unwrap();
        let forged_parts: Vec<&str> = forged.split('.').collect();

        // Forged payload with the genuine signature
        let spliced = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);
        assert_eq!(codec.validate(&spliced, now), Err(TokenError::SignatureMismatch));

        // Forged payload with its own signature
        assert_eq!(codec.validate(&forged, now), Err(TokenError::SignatureMismatch));
    }

    #[test]
    fn test_wrong_secret() {
        let now = at(1_700_000_000);
        let token = TokenCodec::new(b"another-secret-another-secret-00", TTL).issue(&alice(), now).unwrap();

        assert_eq!(codec().validate(&token, now), Err(TokenError::SignatureMismatch));
    }

    #[test]
    fn test_algorithm_swap() {
        let now = at(1_700_000_000);
        let claims = Claims::new(&alice(), now, 3600);
        let token = encode(&Header::new(Algorithm::HS512), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

        assert_eq!(codec().validate(&token, now), Err(TokenError::SignatureMismatch));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec();
        let now = at(1_700_000_000);

        for token in ["", "not-a-token", "a.b", "a.b.c", "!!!.@@@.###"] {
            assert_eq!(codec.validate(token, now), Err(TokenError::Malformed), "token {token:?}");
        }
    }

    #[test]
    fn test_signed_but_wrong_shape_is_malformed() {
        #[derive(Serialize)]
        struct NoExpiry {
            sub: String,
            roles: Vec<Role>,
            iat: i64,
        }

        let now = at(1_700_000_000);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoExpiry {
                sub: "alice".to_string(),
                roles: vec![Role::User],
                iat: now.timestamp(),
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(codec().validate(&token, now), Err(TokenError::Malformed));
    }

    #[test]
    fn test_from_config_requires_secret() {
        let config = Config::default();
        assert!(TokenCodec::from_config(&config).is_err());

        let config = Config {
            secret_key: Some(String::from_utf8(SECRET.to_vec()).unwrap()),
            ..Default::default()
        };
        let codec = TokenCodec::from_config(&config).unwrap();
        assert_eq!(codec.ttl(), config.auth.security.jwt_expiry);
    }
}
