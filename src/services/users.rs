//! User administration service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        response::Paginated,
        user::{CreateUser, ResetPassword, Role, UpdateUser, User, UserQuery},
    },
    repository::{users::UserCounts, Repository},
};

use super::auth::AuthService;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    auth: AuthService,
}

impl UsersService {
    pub fn new(repository: Repository, auth: AuthService) -> Self {
        Self { repository, auth }
    }

    /// Create a user (admin path, any role)
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;

        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password_hash = self.auth.hash_password(&user.password)?;

        let created = self
            .repository
            .users
            .create(
                &user.name,
                &user.email,
                &password_hash,
                user.role.unwrap_or(Role::Member),
                None,
                user.phone.as_deref(),
                user.address.as_deref(),
            )
            .await?;

        tracing::info!(user_id = created.id, role = %created.role, "user created");
        Ok(created)
    }

    /// Get user by ID
    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Update a user (admin path)
    pub async fn update_user(&self, id: i32, update: UpdateUser) -> AppResult<User> {
        update.validate()?;

        if let Some(ref email) = update.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        self.repository.users.update(id, &update).await
    }

    /// Delete a user. Self-deletion is always refused; so is deleting a
    /// user who still holds active loans.
    pub async fn delete_user(&self, id: i32, acting_user_id: i32) -> AppResult<()> {
        if id == acting_user_id {
            return Err(AppError::Validation(
                "Cannot delete your own account".to_string(),
            ));
        }

        self.repository.users.get_by_id(id).await?;

        if self.repository.loans.user_has_active_loans(id).await? {
            return Err(AppError::HasActiveLoans(
                "Cannot delete user with active book loans".to_string(),
            ));
        }

        self.repository.users.delete(id).await?;
        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Reset a user's password (admin path)
    pub async fn reset_password(&self, id: i32, request: ResetPassword) -> AppResult<()> {
        request.validate()?;
        self.repository.users.get_by_id(id).await?;

        let password_hash = self.auth.hash_password(&request.new_password)?;
        self.repository.users.update_password(id, &password_hash).await
    }

    /// Search users with filters and pagination
    pub async fn search_users(&self, query: &UserQuery) -> AppResult<Paginated<User>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);

        let (users, total) = self.repository.users.search(query).await?;

        Ok(Paginated::new(users, total, page, limit))
    }

    /// Aggregate user statistics
    pub async fn stats(&self) -> AppResult<UserCounts> {
        self.repository.users.counts().await
    }
}
