//! Authentication and credential service.
//!
//! Hashing is an explicit call from the registration/update flows, never
//! a side effect of persisting a user record.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand::Rng;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        loan::LoanDetails,
        user::{
            ChangePassword, LoginRequest, RegisterRequest, Role, UpdateProfile, User, UserClaims,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Hash a password with argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored argon2 hash
    pub fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Issue a JWT for the given user
    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.config.jwt_expiration_hours)).timestamp(),
        };
        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Token creation failed: {}", e)))
    }

    /// Register a new member
    pub async fn register(&self, request: RegisterRequest) -> AppResult<(User, String)> {
        request.validate()?;

        if self.repository.users.email_exists(&request.email, None).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.hash_password(&request.password)?;
        let membership_number = generate_membership_number();

        let user = self
            .repository
            .users
            .create(
                &request.name,
                &request.email,
                &password_hash,
                Role::Member,
                Some(&membership_number),
                request.phone.as_deref(),
                request.address.as_deref(),
            )
            .await?;

        tracing::info!(user_id = user.id, "user registered");

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Authenticate with email and password
    pub async fn login(&self, request: LoginRequest) -> AppResult<(User, String)> {
        request.validate()?;

        let user = self
            .repository
            .users
            .get_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !self.verify_password(&request.password, &user.password)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Profile with the user's active loans
    pub async fn get_profile(&self, user_id: i32) -> AppResult<(User, Vec<LoanDetails>)> {
        let user = self.repository.users.get_by_id(user_id).await?;
        let loans = self.repository.loans.find_borrowed_by_user(user_id).await?;
        Ok((user, loans))
    }

    /// Update own profile (name/phone/address only)
    pub async fn update_profile(&self, user_id: i32, update: UpdateProfile) -> AppResult<User> {
        update.validate()?;
        self.repository
            .users
            .update_profile(
                user_id,
                update.name.as_deref(),
                update.phone.as_deref(),
                update.address.as_deref(),
            )
            .await
    }

    /// Change own password, verifying the current one first
    pub async fn change_password(&self, user_id: i32, request: ChangePassword) -> AppResult<()> {
        request.validate()?;

        let user = self.repository.users.get_by_id(user_id).await?;
        if !self.verify_password(&request.current_password, &user.password)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = self.hash_password(&request.new_password)?;
        self.repository.users.update_password(user_id, &password_hash).await
    }
}

/// Membership numbers: LIB + 6 timestamp digits + 3 random digits
fn generate_membership_number() -> String {
    let timestamp = Utc::now().timestamp_millis().to_string();
    let tail = &timestamp[timestamp.len().saturating_sub(6)..];
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("LIB{}{:03}", tail, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_number_shape() {
        let n = generate_membership_number();
        assert!(n.starts_with("LIB"));
        assert_eq!(n.len(), 12);
        assert!(n[3..].chars().all(|c| c.is_ascii_digit()));
    }
}
