//! Sign-up, login and the profile view

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{LoginRequest, SignupRequest, User, UserClaims, UserProfile},
    repository::{store::FleetStore, Repository},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    store: Arc<dyn FleetStore>,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, store: Arc<dyn FleetStore>, config: AuthConfig) -> Self {
        Self {
            repository,
            store,
            config,
        }
    }

    /// Register a new account and sign it in
    pub async fn signup(&self, request: SignupRequest) -> AppResult<String> {
        request.validate()?;

        let email = request
            .email
            .map(|e| e.trim().to_lowercase())
            .ok_or_else(|| AppError::Validation("email is required".to_string()))?;
        let password = request
            .password
            .ok_or_else(|| AppError::Validation("password is required".to_string()))?;

        let user = User {
            user_id: email.clone(),
            password: hash_password(&password)?,
            nickname: request.nickname.filter(|n| !n.trim().is_empty()),
            phonenumber: request.phonenumber.filter(|p| !p.trim().is_empty()),
            email,
        };

        self.repository.users.create(&user).await?;
        tracing::info!(user_id = %user.user_id, "User signed up");

        self.create_token(&user.user_id)
    }

    /// Check credentials and issue a token
    pub async fn login(&self, request: LoginRequest) -> AppResult<String> {
        request.validate()?;

        let invalid = || AppError::Authentication("Invalid email or password".to_string());
        let email = request.email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
        let password = request.password.unwrap_or_default();

        let user = self
            .repository
            .users
            .find_by_id(&email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&user.password, &password)? {
            return Err(invalid());
        }

        self.create_token(&user.user_id)
    }

    /// Profile plus the umbrella currently held, read straight from the store
    pub async fn profile(&self, user_id: &str) -> AppResult<UserProfile> {
        let user = self.repository.users.get_by_id(user_id).await?;
        let current = self.store.current_rental(user_id).await?;
        Ok(UserProfile::new(user, current))
    }

    fn create_token(&self, user_id: &str) -> AppResult<String> {
        UserClaims::new(user_id, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
