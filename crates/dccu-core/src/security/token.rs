//! Signed session tokens.
//!
//! Sessions travel as HS256 JWTs carrying the viewer's codename and
//! clearance level.
//!
//! # JWT Claims
//!
//! ```json
//! {
//!   "sub": "user-123",
//!   "codename": "ORACLE",
//!   "clearance_level": "BETA",
//!   "exp": 1735689600,
//!   "iat": 1735603200
//! }
//! ```

use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use dccu_proto::{ClearanceLevel, Session};

use super::error::{SecurityError, SecurityResult};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user identifier).
    pub sub: String,

    /// Display identifier.
    pub codename: String,

    /// Granted clearance.
    pub clearance_level: ClearanceLevel,

    /// Expiration time (Unix timestamp).
    pub exp: u64,

    /// Issued at time (Unix timestamp).
    #[serde(default)]
    pub iat: Option<u64>,
}

impl SessionClaims {
    /// Convert the claims into a session.
    pub fn into_session(self) -> Session {
        Session::new(self.codename, self.clearance_level)
    }
}

/// Issues and verifies session tokens with a shared HMAC secret.
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionTokens {
    /// Create a token service from an HMAC secret.
    pub fn with_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60;
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Create a token service from an HMAC secret string.
    pub fn with_secret_str(secret: &str) -> Self {
        Self::with_secret(secret.as_bytes())
    }

    /// Load the secret from an environment variable.
    pub fn from_env(env_var: &str) -> Option<Self> {
        std::env::var(env_var)
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| Self::with_secret_str(&s))
    }

    /// Set the expiration leeway in seconds.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.validation.leeway = leeway_secs;
        self
    }

    /// Issue a token for a session, valid for `ttl`.
    pub fn issue(&self, subject: &str, session: &Session, ttl: Duration) -> SecurityResult<String> {
        let now = unix_now();
        let claims = SessionClaims {
            sub: subject.to_string(),
            codename: session.codename.clone(),
            clearance_level: session.level,
            exp: now + ttl.as_secs(),
            iat: Some(now),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SecurityError::TokenIssuance(e.to_string()))
    }

    /// Verify a token and return its claims.
    pub fn verify_claims(&self, token: &str) -> SecurityResult<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            SecurityError::InvalidToken(e.to_string())
        })?;
        Ok(data.claims)
    }

    /// Verify a token and return the session it carries.
    pub fn verify(&self, token: &str) -> SecurityResult<Session> {
        self.verify_claims(token).map(SessionClaims::into_session)
    }
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
