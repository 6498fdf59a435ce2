//! Lending endpoints: borrow, return, overdue sweep and loan listings

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        loan::{BorrowRequest, LoanDetails, LoanQuery},
        response::{ApiResponse, Paginated},
    },
    AppState,
};

use super::AuthenticatedUser;

/// Returned loan plus the fine that was assessed
#[derive(Serialize, ToSchema)]
pub struct ReturnData {
    #[serde(flatten)]
    pub loan: LoanDetails,
    pub fine: Decimal,
}

/// Overdue sweep result
#[derive(Serialize, ToSchema)]
pub struct SweepData {
    /// Number of loans transitioned from borrowed to overdue
    pub updated: u64,
}

/// Envelope for the active-loans listing
#[derive(Serialize, ToSchema)]
pub struct BorrowedBooksResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<LoanDetails>,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/api/books/{id}/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = ApiResponse<LoanDetails>),
        (status = 400, description = "No copies, duplicate loan or limit reached", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<BorrowRequest>>,
) -> AppResult<(StatusCode, Json<ApiResponse<LoanDetails>>)> {
    let loan_days = request.and_then(|Json(r)| r.loan_days);

    let loan = state
        .services
        .lending
        .borrow(id, claims.user_id, loan_days)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Book borrowed successfully", loan)),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    put,
    path = "/api/books/loans/{loan_id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("loan_id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Book returned", body = ApiResponse<ReturnData>),
        (status = 400, description = "Loan not found or already returned", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<ApiResponse<ReturnData>>> {
    let (loan, fine) = state
        .services
        .lending
        .return_book(loan_id, claims.user_id)
        .await?;

    let message = if fine > Decimal::ZERO {
        format!("Book returned with fine: ${}", fine)
    } else {
        "Book returned successfully".to_string()
    };

    Ok(Json(ApiResponse::ok(message, ReturnData { loan, fine })))
}

/// Mark all expired borrowed loans as overdue (librarian)
#[utoipa::path(
    put,
    path = "/api/books/update-overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep completed", body = ApiResponse<SweepData>),
        (status = 403, description = "Librarian privileges required", body = ErrorResponse)
    )
)]
pub async fn update_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<SweepData>>> {
    claims.require_librarian()?;

    let updated = state.services.lending.sweep_overdue().await?;

    Ok(Json(ApiResponse::ok(
        format!("Updated {} overdue loans", updated),
        SweepData { updated },
    )))
}

/// Current user's active loans
#[utoipa::path(
    get,
    path = "/api/books/my-borrowed",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans", body = BorrowedBooksResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn my_borrowed_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<BorrowedBooksResponse>> {
    let loans = state.services.lending.borrowed_books(claims.user_id).await?;

    Ok(Json(BorrowedBooksResponse {
        success: true,
        message: "Borrowed books retrieved successfully".to_string(),
        data: loans,
    }))
}

/// Current user's full loan history, paginated
#[utoipa::path(
    get,
    path = "/api/books/my-history",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loan history", body = ApiResponse<Paginated<LoanDetails>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn my_loan_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<ApiResponse<Paginated<LoanDetails>>>> {
    let history = state
        .services
        .lending
        .loan_history(claims.user_id, query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::ok(
        "Loan history retrieved successfully",
        history,
    )))
}

/// All loans across all users (librarian)
#[utoipa::path(
    get,
    path = "/api/books/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "All loans", body = ApiResponse<Paginated<LoanDetails>>),
        (status = 403, description = "Librarian privileges required", body = ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<ApiResponse<Paginated<LoanDetails>>>> {
    claims.require_librarian()?;

    let loans = state.services.lending.all_loans(&query).await?;

    Ok(Json(ApiResponse::ok("Loans retrieved successfully", loans)))
}
