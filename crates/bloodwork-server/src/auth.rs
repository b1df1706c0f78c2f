//! Admin login with argon2-hashed credentials and HS256 bearer tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AuthSettings;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
    #[error("Auth setup failed: {0}")]
    Setup(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: String,
}

/// Hash a password for storage using Argon2id with a random salt (PHC string).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC-formatted Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Issues and checks tokens for the single configured admin.
pub struct AuthService {
    username: String,
    password_hash: String,
    ttl_secs: u64,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("username", &self.username)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Build from settings, hashing the admin password.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let secret = settings
            .jwt_secret
            .as_deref()
            .ok_or_else(|| AuthError::Setup("auth.jwt_secret is not set".into()))?;
        let password = settings
            .admin_password
            .as_deref()
            .ok_or_else(|| AuthError::Setup("auth.admin_password is not set".into()))?;
        let password_hash =
            hash_password(password).map_err(|e| AuthError::Setup(e.to_string()))?;
        Ok(Self {
            username: settings.admin_username.clone(),
            password_hash,
            ttl_secs: settings.token_ttl_secs,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        if request.username != self.username
            || !verify_password(&request.password, &self.password_hash)
        {
            return Err(AuthError::InvalidCredentials);
        }
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: self.username.clone(),
            iat: now,
            exp: now + i64::try_from(self.ttl_secs).unwrap_or(i64::MAX / 2),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Setup(e.to_string()))?;
        Ok(LoginResponse {
            access_token: token,
            token_type: "bearer",
            expires_in: self.ttl_secs,
            user: self.username.clone(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;
        if data.claims.sub != self.username {
            return Err(AuthError::InvalidToken("unknown subject".into()));
        }
        Ok(data.claims)
    }
}
