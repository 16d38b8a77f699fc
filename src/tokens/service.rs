use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::generator::generate_hex;
use crate::config::TokenConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("Token expired")]
    Expired,
    #[error("Token signature invalid or token malformed")]
    InvalidSignature,
    #[error("Token lifetime out of range")]
    Lifetime,
}

/// Which secret and lifetime an envelope uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload shared by access and refresh envelopes
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    exp: i64,
    iat: i64,
    /// Random nonce so refresh envelopes issued in the same second differ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    sub: String,
}

/// Claims recovered from a verified envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub user_id: String,
}

/// A freshly signed envelope and the lifetime baked into it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub value: String,
}

struct KeyPair {
    decoding: DecodingKey,
    encoding: EncodingKey,
    /// `None` when the configured lifetime does not fit a `Duration`
    ttl: Option<Duration>,
}

impl KeyPair {
    fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            ttl: i64::try_from(ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds),
        }
    }
}

/// Signs and verifies access and refresh envelopes (HS256) with two
/// independent secrets. Has no side effects; persisting refresh envelopes is
/// the caller's job.
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: KeyPair::new(&config.access_secret, config.access_ttl_seconds),
            refresh: KeyPair::new(&config.refresh_secret, config.refresh_ttl_seconds),
            validation,
        }
    }

    pub fn issue_access(&self, user_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(TokenKind::Access, user_id, Utc::now())
    }

    pub fn issue_refresh(&self, user_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(TokenKind::Refresh, user_id, Utc::now())
    }

    /// Sign an envelope as if it were issued at `now`
    pub(crate) fn issue_at(
        &self,
        kind: TokenKind,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let keys = self.keys(kind);
        let expires_at = keys
            .ttl
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(TokenError::Lifetime)?;
        let claims = Claims {
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: (kind == TokenKind::Refresh).then(|| generate_hex(16)),
            sub: user_id.to_string(),
        };

        let value = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            expires_at,
            issued_at: now,
            value,
        })
    }

    /// Verify an envelope against the secret for `kind`.
    ///
    /// Tampered, malformed, or wrongly-signed envelopes fail with
    /// `InvalidSignature`; correctly signed envelopes past their expiry fail
    /// with `Expired`.
    pub fn verify(&self, envelope: &str, kind: TokenKind) -> Result<VerifiedClaims, TokenError> {
        let keys = self.keys(kind);
        let data = jsonwebtoken::decode::<Claims>(envelope, &keys.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(TokenError::InvalidSignature);
        }

        Ok(VerifiedClaims {
            expires_at: DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::InvalidSignature)?,
            issued_at: DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::InvalidSignature)?,
            user_id: claims.sub,
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_config;

    fn service() -> TokenService {
        TokenService::new(&test_config().tokens)
    }

    #[test]
    fn test_issue_and_verify_access() {
        let tokens = service();

        let issued = tokens.issue_access("user-1").unwrap();
        let claims = tokens.verify(&issued.value, TokenKind::Access).unwrap();

        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.expires_at.timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let tokens = service();

        let a = tokens.issue_refresh("user-1").unwrap();
        let b = tokens.issue_refresh("user-1").unwrap();
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_secrets_are_independent() {
        let tokens = service();

        let access = tokens.issue_access("user-1").unwrap();
        let refresh = tokens.issue_refresh("user-1").unwrap();

        assert!(matches!(
            tokens.verify(&access.value, TokenKind::Refresh),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            tokens.verify(&refresh.value, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let tokens = service();
        let issued = tokens.issue_access("user-1").unwrap();

        // Swap the payload for one claiming a different subject
        let forged = tokens.issue_access("admin").unwrap();
        let mut parts: Vec<&str> = issued.value.split('.').collect();
        let forged_parts: Vec<&str> = forged.value.split('.').collect();
        parts[1] = forged_parts[1];
        let tampered = parts.join(".");

        // Signed with the right secret, but over a different payload
        assert!(matches!(
            tokens.verify(&tampered, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = service();
        assert!(matches!(
            tokens.verify("not-a-token", TokenKind::Access),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_distinct_from_tampered() {
        let tokens = service();
        let issued = tokens
            .issue_at(
                TokenKind::Access,
                "user-1",
                Utc::now() - Duration::hours(2),
            )
            .unwrap();

        assert!(matches!(
            tokens.verify(&issued.value, TokenKind::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let mut config = test_config().tokens;
        config.refresh_ttl_seconds = u64::MAX;
        let tokens = TokenService::new(&config);
        assert!(matches!(
            tokens.issue_refresh("user-1"),
            Err(TokenError::Lifetime)
        ));

        config.refresh_ttl_seconds = 10_000_000_000_000;
        let tokens = TokenService::new(&config);
        assert!(matches!(
            tokens.issue_refresh("user-1"),
            Err(TokenError::Lifetime)
        ));

        // Access tokens are unaffected
        assert!(tokens.issue_access("user-1").is_ok());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let tokens = service();
        let mut other_config = test_config().tokens;
        other_config.access_secret = "someone-else".to_string();
        let other = TokenService::new(&other_config);

        let issued = other.issue_access("user-1").unwrap();
        assert!(matches!(
            tokens.verify(&issued.value, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        ));
    }
}
