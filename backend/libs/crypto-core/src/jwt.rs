//! Bearer token issuing and validation (HS256)
//!
//! The chat clients and the account service share a single symmetric secret
//! (`JWT_SECRET`). Access tokens are short lived and are the only kind the
//! messaging routes accept; refresh tokens exist so the account service can
//! mint new access tokens without a password round-trip.
//!
//! ## Usage
//!
//! ```rust
//! use crypto_core::jwt::{JwtKeys, TokenKind};
//! use uuid::Uuid;
//!
//! let keys = JwtKeys::from_secret("local-development-secret").unwrap();
//! let user_id = Uuid::new_v4();
//! let token = keys.issue_access_token(user_id, "alice@example.com").unwrap();
//! let claims = keys.validate(&token, TokenKind::Access).unwrap();
//! assert_eq!(claims.user_id().unwrap(), user_id);
//! ```
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 20;
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("jwt secret must not be empty")]
    EmptySecret,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("expected {expected} token, got {found}")]
    WrongKind { expected: &'static str, found: String },

    #[error("failed to sign token: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    fn lifetime(&self) -> Duration {
        match self {
            TokenKind::Access => Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES),
            TokenKind::Refresh => Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
        }
    }
}

/// JWT claims carried by every Nova chat token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    /// "access" or "refresh"
    pub token_type: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| JwtError::Invalid(format!("malformed subject: {e}")))
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Signing and verification keys derived from the shared secret
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys")
            .field("algorithm", &JWT_ALGORITHM)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Result<Self, JwtError> {
        if secret.trim().is_empty() {
            return Err(JwtError::EmptySecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    // ------------------------------------------------------------------------
    // Issuing
    // ------------------------------------------------------------------------

    pub fn issue(&self, kind: TokenKind, user_id: Uuid, email: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + kind.lifetime()).timestamp(),
            token_type: kind.as_str().to_string(),
        };
        self.sign(&claims)
    }

    pub fn issue_access_token(&self, user_id: Uuid, email: &str) -> Result<String, JwtError> {
        self.issue(TokenKind::Access, user_id, email)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid, email: &str) -> Result<String, JwtError> {
        self.issue(TokenKind::Refresh, user_id, email)
    }

    /// Sign arbitrary claims. Callers normally go through [`JwtKeys::issue`].
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(JWT_ALGORITHM), claims, &self.encoding)
            .map_err(|e| JwtError::Encode(e.to_string()))
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Verify signature and expiry, then check the token kind.
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.token_type != expected.as_str() {
            return Err(JwtError::WrongKind {
                expected: expected.as_str(),
                found: data.claims.token_type,
            });
        }

        Ok(data.claims)
    }
}

// ============================================================================
// Tests
// ============================================================================
