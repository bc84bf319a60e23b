//! # Users
//!
//! Credential handling and the signed-token issuer. The discovery core only
//! ever reads `id` and `username`; everything else here exists for the
//! registration and login surface.
//!
//! Tokens are HS256 bearer tokens carrying `{userId, exp}` with a 30-day
//! validity window. The password hash column rides along in [`User`] so one
//! row type serves both lookup and login, but it is never serialized.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const TOKEN_VALIDITY_SECS: u64 = 60 * 60 * 24 * 30;
const HASH_COST: u32 = 12;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub address: Option<String>,
    #[serde(skip_serializing)]
    pub h_pw: String,
}

/// A user row plus its freshly issued bearer token, as login/registration
/// responses send it.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub exp: u64,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, AppError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(Box::new(e)))?
            .as_secs();

        let claims = Claims {
            user_id,
            exp: now + TOKEN_VALIDITY_SECS,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(Box::new(e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AppError::Internal(Box::new(e)))
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, HASH_COST).map_err(|e| AppError::Internal(Box::new(e)))
}

pub fn verify_password(password: &str, h_pw: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, h_pw).map_err(|e| AppError::Internal(Box::new(e)))
}
