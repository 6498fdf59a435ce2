//! Catalog (books) service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDetails, BookQuery, CreateBook, UpdateBook},
        response::Paginated,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create a new book
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        if let Some(ref isbn) = book.isbn {
            if self.repository.books.isbn_exists(isbn, None).await? {
                return Err(AppError::Conflict(format!(
                    "A book with ISBN {} already exists",
                    isbn
                )));
            }
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, title = %created.title, "book created");
        Ok(created)
    }

    /// Get a book with its current active loans
    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.repository.books.get_by_id(id).await?;
        let active_loans = self.repository.loans.active_loans_for_book(id).await?;
        Ok(BookDetails { book, active_loans })
    }

    /// Update a book
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;

        if let Some(ref isbn) = update.isbn {
            if self.repository.books.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "A book with ISBN {} already exists",
                    isbn
                )));
            }
        }

        self.repository.books.update(id, &update).await
    }

    /// Delete a book, refused while any active loan references it
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        // Existence check first so a missing book is a 404, not a guard failure
        self.repository.books.get_by_id(id).await?;

        if self.repository.loans.book_has_active_loans(id).await? {
            return Err(AppError::HasActiveLoans(
                "Cannot delete book with active loans".to_string(),
            ));
        }

        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }

    /// Search books with filters and pagination
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Paginated<Book>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);

        let (books, total) = self.repository.books.search(query).await?;

        Ok(Paginated::new(books, total, page, limit))
    }
}
