use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::core::client::Identity;
use crate::error::{ChatHubError, Result};

/// Longest token accepted before any decoding is attempted
const MAX_TOKEN_LENGTH: usize = 2048;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Tenant the user belongs to
    pub tenant_id: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
    /// Not before (as UTC timestamp)
    pub nbf: usize,
}

impl Claims {
    /// Creates claims valid for 24 hours
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self::with_expiration(user_id, tenant_id, 24)
    }

    /// Creates claims with custom expiration
    pub fn with_expiration(
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        hours: usize,
    ) -> Self {
        let now = now_secs();
        Self {
            sub: user_id.into(),
            tenant_id: tenant_id.into(),
            exp: now + hours * 3600,
            iat: now,
            nbf: now,
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        now_secs() > self.exp
    }

    /// Identity to bind to the connection
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub.clone(), self.tenant_id.clone())
    }
}

fn now_secs() -> usize {
    Utc::now().timestamp().max(0) as usize
}

/// Manages JWT token operations
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    /// Creates a new token manager with a secret
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.validate_nbf = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Generates a JWT token for the given claims
    pub fn generate_token(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| ChatHubError::AuthError(format!("Failed to generate token: {}", e)))
    }

    /// Validates and decodes a JWT token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ChatHubError::AuthError(format!("Invalid token: {}", e)))
    }

    /// Validates a token and returns the identity it carries
    pub fn authenticate(&self, token: &str) -> Result<Identity> {
        if token.len() > MAX_TOKEN_LENGTH {
            return Err(ChatHubError::AuthError("Token too long".to_string()));
        }

        let claims = self.validate_token(token)?.claims;
        if claims.is_expired() {
            return Err(ChatHubError::AuthError("Token expired".to_string()));
        }
        if claims.sub.is_empty() || claims.tenant_id.is_empty() {
            return Err(ChatHubError::AuthError("Invalid token claims".to_string()));
        }

        Ok(claims.identity())
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
