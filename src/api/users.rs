//! User administration endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        response::{ApiResponse, Paginated},
        user::{CreateUser, ResetPassword, UpdateUser, User, UserQuery},
    },
    AppState,
};

use super::AuthenticatedUser;

/// User counts broken down by role
#[derive(Serialize, ToSchema)]
pub struct RoleCounts {
    pub members: i64,
    pub librarians: i64,
    pub admins: i64,
}

/// Aggregate statistics for the admin dashboard
#[derive(Serialize, ToSchema)]
pub struct UserStats {
    pub total_users: i64,
    pub users_by_role: RoleCounts,
    pub active_loans: i64,
    pub overdue_loans: i64,
}

/// List users with filters and pagination (librarian)
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated user list", body = ApiResponse<Paginated<User>>),
        (status = 403, description = "Librarian privileges required", body = ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<ApiResponse<Paginated<User>>>> {
    claims.require_librarian()?;

    let users = state.services.users.search_users(&query).await?;

    Ok(Json(ApiResponse::ok("Users retrieved successfully", users)))
}

/// Aggregate user statistics (admin)
#[utoipa::path(
    get,
    path = "/api/users/stats",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User statistics", body = ApiResponse<UserStats>),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse)
    )
)]
pub async fn user_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<UserStats>>> {
    claims.require_admin()?;

    let counts = state.services.users.stats().await?;

    let stats = UserStats {
        total_users: counts.total_users,
        users_by_role: RoleCounts {
            members: counts.members,
            librarians: counts.librarians,
            admins: counts.admins,
        },
        active_loans: counts.active_loans,
        overdue_loans: counts.overdue_loans,
    };

    Ok(Json(ApiResponse::ok(
        "Statistics retrieved successfully",
        stats,
    )))
}

/// Get a user by ID (librarian)
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = ApiResponse<User>),
        (status = 403, description = "Librarian privileges required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<User>>> {
    claims.require_librarian()?;

    let user = state.services.users.get_user(id).await?;

    Ok(Json(ApiResponse::ok("User retrieved successfully", user)))
}

/// Create a user with any role (admin)
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = ApiResponse<User>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(user): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    claims.require_admin()?;

    let user = state.services.users.create_user(user).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User created successfully", user)),
    ))
}

/// Update a user (admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateUser>,
) -> AppResult<Json<ApiResponse<User>>> {
    claims.require_admin()?;

    let user = state.services.users.update_user(id, update).await?;

    Ok(Json(ApiResponse::ok("User updated successfully", user)))
}

/// Delete a user (admin). Self-deletion and users with active loans
/// are refused.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<User>),
        (status = 400, description = "Self-deletion or active loans", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<User>>> {
    claims.require_admin()?;

    state.services.users.delete_user(id, claims.user_id).await?;

    Ok(Json(ApiResponse::message("User deleted successfully")))
}

/// Reset a user's password (admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}/reset-password",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = ResetPassword,
    responses(
        (status = 200, description = "Password reset", body = ApiResponse<User>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ResetPassword>,
) -> AppResult<Json<ApiResponse<User>>> {
    claims.require_admin()?;

    state.services.users.reset_password(id, request).await?;

    Ok(Json(ApiResponse::message("Password reset successfully")))
}
