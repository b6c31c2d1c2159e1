//! User model, credentials and JWT claims

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// User row. The identifier is the sign-up email.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub nickname: Option<String>,
    pub phonenumber: Option<String>,
    pub email: String,
}

/// Sign-up request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(required(message = "email is required"), email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(
        required(message = "password is required"),
        length(min = 4, message = "Password must be at least 4 characters")
    )]
    pub password: Option<String>,
    pub phonenumber: Option<String>,
    #[validate(length(max = 100, message = "Nickname must be at most 100 characters"))]
    pub nickname: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(required(message = "email is required"))]
    pub email: Option<String>,
    #[validate(required(message = "password is required"))]
    pub password: Option<String>,
}

/// Profile returned to the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub email: String,
    pub nickname: String,
    pub phonenumber: Option<String>,
    /// Umbrella currently held, if any
    pub current_rental_id: Option<String>,
}

impl UserProfile {
    pub fn new(user: User, current_rental_id: Option<String>) -> Self {
        Self {
            email: user.email,
            nickname: user
                .nickname
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Anonymous".to_string()),
            phonenumber: user.phonenumber,
            current_rental_id,
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User identifier
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Claims valid for `hours` from now
    pub fn new(user_id: impl Into<String>, hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            exp: now + (hours as i64 * 3600),
            iat: now,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::Authentication("Invalid token".to_string()),
        })
    }
}
