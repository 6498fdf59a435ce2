//! Authentication endpoints: register, login, profile

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        loan::LoanDetails,
        response::ApiResponse,
        user::{ChangePassword, LoginRequest, RegisterRequest, UpdateProfile, User},
    },
    AppState,
};

use super::AuthenticatedUser;

/// User plus the JWT issued for them
#[derive(Serialize, ToSchema)]
pub struct AuthData {
    pub user: User,
    pub token: String,
}

/// Profile with the user's active loans
#[derive(Serialize, ToSchema)]
pub struct ProfileData {
    pub user: User,
    pub active_loans: Vec<LoanDetails>,
}

/// Register a new member account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<AuthData>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthData>>)> {
    let (user, token) = state.services.auth.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User registered successfully",
            AuthData { user, token },
        )),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthData>),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthData>>> {
    let (user, token) = state.services.auth.login(request).await?;

    Ok(Json(ApiResponse::ok(
        "Login successful",
        AuthData { user, token },
    )))
}

/// Current user's profile with active loans
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ApiResponse<ProfileData>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<ProfileData>>> {
    let (user, active_loans) = state.services.auth.get_profile(claims.user_id).await?;

    Ok(Json(ApiResponse::ok(
        "Profile retrieved successfully",
        ProfileData { user, active_loans },
    )))
}

/// Update own profile (name, phone, address)
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<User>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(update): Json<UpdateProfile>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state
        .services
        .auth
        .update_profile(claims.user_id, update)
        .await?;

    Ok(Json(ApiResponse::ok("Profile updated successfully", user)))
}

/// Change own password
#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<User>),
        (status = 400, description = "Current password incorrect", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ChangePassword>,
) -> AppResult<Json<ApiResponse<User>>> {
    state
        .services
        .auth
        .change_password(claims.user_id, request)
        .await?;

    Ok(Json(ApiResponse::message("Password changed successfully")))
}
