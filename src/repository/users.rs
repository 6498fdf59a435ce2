//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::user::{Role, UpdateUser, User, UserQuery},
};

/// Aggregate user/loan counters for the admin dashboard
#[derive(Debug, Clone)]
pub struct UserCounts {
    pub total_users: i64,
    pub members: i64,
    pub librarians: i64,
    pub admins: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email (authentication lookup)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)",
            )
            .bind(email)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// Create a new user. `password_hash` is already hashed by the
    /// credential service.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        membership_number: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> AppResult<User> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (name, email, password, role, membership_number, phone, address,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(membership_number)
        .bind(phone)
        .bind(address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update user fields (admin path)
    pub async fn update(&self, id: i32, update: &UpdateUser) -> AppResult<User> {
        let current = self.get_by_id(id).await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, email = $3, role = $4, membership_number = $5,
                phone = $6, address = $7, updated_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.name.clone().unwrap_or(current.name))
        .bind(update.email.clone().unwrap_or(current.email))
        .bind(update.role.unwrap_or(current.role))
        .bind(update.membership_number.clone().or(current.membership_number))
        .bind(update.phone.clone().or(current.phone))
        .bind(update.address.clone().or(current.address))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update profile fields a user may edit themselves
    pub async fn update_profile(
        &self,
        id: i32,
        name: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> AppResult<User> {
        let current = self.get_by_id(id).await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, phone = $3, address = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name.map(str::to_string).unwrap_or(current.name))
        .bind(phone.map(str::to_string).or(current.phone))
        .bind(address.map(str::to_string).or(current.address))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Replace the stored password hash
    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    /// Delete a user (the service layer checks the active-loan guard)
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    /// Search users with filters and pagination, ordered by name
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(role) = query.role {
            params.push(role.as_str().to_string());
            conditions.push(format!("role = ${}", params.len()));
        }

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            conditions.push(format!(
                "(LOWER(name) LIKE ${n} OR LOWER(email) LIKE ${n} OR LOWER(COALESCE(membership_number, '')) LIKE ${n})",
                n = params.len()
            ));
        }

        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };

        let count_sql = format!("SELECT COUNT(*) FROM users WHERE {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for p in &params {
            count_query = count_query.bind(p);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let select_sql = format!(
            "SELECT * FROM users WHERE {} ORDER BY name ASC LIMIT ${} OFFSET ${}",
            where_clause,
            params.len() + 1,
            params.len() + 2
        );
        let mut select_query = sqlx::query_as::<_, User>(&select_sql);
        for p in &params {
            select_query = select_query.bind(p);
        }
        let users = select_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((users, total))
    }

    /// Aggregate counters for the user statistics endpoint
    pub async fn counts(&self) -> AppResult<UserCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) as total_users,
                (SELECT COUNT(*) FROM users WHERE role = 'member') as members,
                (SELECT COUNT(*) FROM users WHERE role = 'librarian') as librarians,
                (SELECT COUNT(*) FROM users WHERE role = 'admin') as admins,
                (SELECT COUNT(*) FROM book_loans WHERE status IN ('borrowed', 'overdue')) as active_loans,
                (SELECT COUNT(*) FROM book_loans WHERE status = 'overdue') as overdue_loans
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(UserCounts {
            total_users: row.get("total_users"),
            members: row.get("members"),
            librarians: row.get("librarians"),
            admins: row.get("admins"),
            active_loans: row.get("active_loans"),
            overdue_loans: row.get("overdue_loans"),
        })
    }
}
