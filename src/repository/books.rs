//! Books repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Check if an ISBN is already registered
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)")
                .bind(isbn)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// Create a new book. New books start with every copy available.
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();
        let copies = book.total_copies.unwrap_or(1);

        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books
                (title, author, isbn, published_year, genre, description,
                 total_copies, available_copies, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.published_year)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(copies)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update a book. Changing `total_copies` shifts `available_copies`
    /// by the same delta so borrowed copies stay accounted for; the result
    /// must not strand more borrowed copies than the new total allows.
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so a borrow cannot move the counts between the
        // read and the write.
        let current = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let title = update.title.clone().unwrap_or(current.title);
        let author = update.author.clone().unwrap_or(current.author);
        let isbn = update.isbn.clone().or(current.isbn);
        let published_year = update.published_year.or(current.published_year);
        let genre = update.genre.clone().or(current.genre);
        let description = update.description.clone().or(current.description);

        let total_copies = update.total_copies.unwrap_or(current.total_copies);
        let delta = total_copies - current.total_copies;
        let available_copies = current.available_copies + delta;
        if available_copies < 0 {
            return Err(AppError::Validation(format!(
                "Cannot reduce total copies below the {} currently borrowed",
                current.total_copies - current.available_copies
            )));
        }

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $2, author = $3, isbn = $4, published_year = $5,
                genre = $6, description = $7, total_copies = $8,
                available_copies = $9, updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(author)
        .bind(isbn)
        .bind(published_year)
        .bind(genre)
        .bind(description)
        .bind(total_copies)
        .bind(available_copies)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a book (the service layer checks the active-loan guard)
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    /// Search books with filters and pagination, ordered by title
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            conditions.push(format!(
                "(LOWER(title) LIKE ${n} OR LOWER(author) LIKE ${n} OR LOWER(COALESCE(isbn, '')) LIKE ${n})",
                n = params.len()
            ));
        }

        if let Some(ref genre) = query.genre {
            params.push(format!("%{}%", genre.to_lowercase()));
            conditions.push(format!("LOWER(COALESCE(genre, '')) LIKE ${}", params.len()));
        }

        if let Some(ref author) = query.author {
            params.push(format!("%{}%", author.to_lowercase()));
            conditions.push(format!("LOWER(author) LIKE ${}", params.len()));
        }

        if query.available_only.unwrap_or(false) {
            conditions.push("available_copies > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };

        let count_sql = format!("SELECT COUNT(*) FROM books WHERE {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for p in &params {
            count_query = count_query.bind(p);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let select_sql = format!(
            "SELECT * FROM books WHERE {} ORDER BY title ASC LIMIT ${} OFFSET ${}",
            where_clause,
            params.len() + 1,
            params.len() + 2
        );
        let mut select_query = sqlx::query_as::<_, Book>(&select_sql);
        for p in &params {
            select_query = select_query.bind(p);
        }
        let books = select_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }
}
