//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        book::{Book, BookDetails, BookQuery, CreateBook, UpdateBook},
        response::{ApiResponse, Paginated},
    },
    AppState,
};

use super::AuthenticatedUser;

/// List books with search filters and pagination
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Paginated book list", body = ApiResponse<Paginated<Book>>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<ApiResponse<Paginated<Book>>>> {
    let books = state.services.catalog.search_books(&query).await?;

    Ok(Json(ApiResponse::ok("Books retrieved successfully", books)))
}

/// Get a book with its active loans
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = ApiResponse<BookDetails>),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<BookDetails>>> {
    let book = state.services.catalog.get_book(id).await?;

    Ok(Json(ApiResponse::ok("Book retrieved successfully", book)))
}

/// Create a new book (librarian)
#[utoipa::path(
    post,
    path = "/api/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = ApiResponse<Book>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Librarian privileges required", body = ErrorResponse),
        (status = 409, description = "ISBN already exists", body = ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<ApiResponse<Book>>)> {
    claims.require_librarian()?;

    let book = state.services.catalog.create_book(book).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Book created successfully", book)),
    ))
}

/// Update a book (librarian)
#[utoipa::path(
    put,
    path = "/api/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = ApiResponse<Book>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Librarian privileges required", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<ApiResponse<Book>>> {
    claims.require_librarian()?;

    let book = state.services.catalog.update_book(id, update).await?;

    Ok(Json(ApiResponse::ok("Book updated successfully", book)))
}

/// Delete a book (admin). Refused while active loans reference it.
#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted", body = ApiResponse<Book>),
        (status = 400, description = "Book has active loans", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Book>>> {
    claims.require_admin()?;

    state.services.catalog.delete_book(id).await?;

    Ok(Json(ApiResponse::message("Book deleted successfully")))
}
