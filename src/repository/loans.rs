//! Loans repository for database operations.
//!
//! Borrow and return are check-then-act sequences, so both run inside a
//! transaction that locks the rows they read (`SELECT ... FOR UPDATE`).
//! Two concurrent borrows of the last copy serialize on the book row and
//! exactly one succeeds; two concurrent borrows of different books by
//! the same user serialize on the user row, so the active-loan limit
//! holds across books; a return racing the overdue sweep serializes on
//! the loan row and the loan ends up either overdue-then-returned or
//! returned, never a mix. Locks are always taken book row first, then
//! user row.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookSummary,
        loan::{ActiveLoanSummary, BookLoan, LoanDetails, LoanStatus},
        user::UserSummary,
    },
};

/// Columns for a loan joined with its book (and optionally its user).
const LOAN_JOIN_COLUMNS: &str = r#"
    l.id, l.user_id, l.book_id, l.borrow_date, l.due_date, l.return_date,
    l.status, l.fine, l.created_at, l.updated_at,
    b.title as book_title, b.author as book_author, b.isbn as book_isbn
"#;

fn loan_from_row(row: &PgRow) -> AppResult<BookLoan> {
    Ok(BookLoan {
        id: row.get("id"),
        user_id: row.get("user_id"),
        book_id: row.get("book_id"),
        borrow_date: row.get("borrow_date"),
        due_date: row.get("due_date"),
        return_date: row.get("return_date"),
        status: row.get("status"),
        fine: row.get("fine"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn loan_details_from_row(row: &PgRow, with_user: bool) -> AppResult<LoanDetails> {
    let loan = loan_from_row(row)?;
    let book = BookSummary {
        id: loan.book_id,
        title: row.get("book_title"),
        author: row.get("book_author"),
        isbn: row.get("book_isbn"),
    };
    let user = if with_user {
        Some(UserSummary {
            id: loan.user_id,
            name: row.get("user_name"),
            email: row.get("user_email"),
            membership_number: row.get("user_membership_number"),
        })
    } else {
        None
    };
    Ok(LoanDetails { loan, book, user })
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Borrow a book: all four preconditions are checked against a single
    /// consistent snapshot, with the book row locked for the duration.
    pub async fn borrow(
        &self,
        book_id: i32,
        user_id: i32,
        loan_days: i64,
        max_active_loans: i64,
    ) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Lock the book row; concurrent borrows of the same book queue here.
        let book = sqlx::query(
            "SELECT id, available_copies, total_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let available: i32 = book.get("available_copies");
        if available <= 0 {
            return Err(AppError::NoCopiesAvailable);
        }

        let already_borrowed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM book_loans
                WHERE book_id = $1 AND user_id = $2 AND status IN ('borrowed', 'overdue')
            )
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_borrowed {
            return Err(AppError::DuplicateLoan);
        }

        // The book lock does not serialize borrows of different books by
        // the same user, so the limit count must queue on the user row.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;

        let active_loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_loans WHERE user_id = $1 AND status IN ('borrowed', 'overdue')",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if active_loans >= max_active_loans {
            return Err(AppError::BorrowLimitExceeded(max_active_loans));
        }

        // Guarded decrement; cannot fail while we hold the row lock, so a
        // zero row count is a consistency fault, not a user error.
        let updated = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = $2
            WHERE id = $1 AND available_copies > 0
            "#,
        )
        .bind(book_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(AppError::Internal(format!(
                "available_copies decrement failed for book {}",
                book_id
            )));
        }

        let due_date = now + Duration::days(loan_days);

        let row = sqlx::query(
            &format!(
                r#"
                WITH inserted AS (
                    INSERT INTO book_loans
                        (user_id, book_id, borrow_date, due_date, status, fine, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, 'borrowed', 0, $3, $3)
                    RETURNING *
                )
                SELECT {columns},
                       u.name as user_name, u.email as user_email,
                       u.membership_number as user_membership_number
                FROM inserted l
                JOIN books b ON l.book_id = b.id
                JOIN users u ON l.user_id = u.id
                "#,
                columns = LOAN_JOIN_COLUMNS
            ),
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await?;

        let details = loan_details_from_row(&row, true)?;

        tx.commit().await?;
        Ok(details)
    }

    /// Return a loan: locks the loan row, computes the fine from the due
    /// date and transitions to `returned` while giving the copy back.
    pub async fn return_loan(
        &self,
        loan_id: i32,
        user_id: i32,
        daily_rate: Decimal,
    ) -> AppResult<(LoanDetails, Decimal)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, user_id, book_id, borrow_date, due_date, return_date,
                   status, fine, created_at, updated_at
            FROM book_loans
            WHERE id = $1 AND user_id = $2 AND status IN ('borrowed', 'overdue')
            FOR UPDATE
            "#,
        )
        .bind(loan_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::LoanNotFound)?;

        let loan = loan_from_row(&row)?;
        let fine = loan.fine_at(now, daily_rate);

        let row = sqlx::query(
            &format!(
                r#"
                WITH updated AS (
                    UPDATE book_loans
                    SET return_date = $2, status = 'returned', fine = $3, updated_at = $2
                    WHERE id = $1
                    RETURNING *
                )
                SELECT {columns}
                FROM updated l
                JOIN books b ON l.book_id = b.id
                "#,
                columns = LOAN_JOIN_COLUMNS
            ),
        )
        .bind(loan_id)
        .bind(now)
        .bind(fine)
        .fetch_one(&mut *tx)
        .await?;

        let details = loan_details_from_row(&row, false)?;

        // The increment must never push available past total. A failed
        // guard means the counts are already corrupt; surface it as a 500
        // and roll back rather than clamp.
        let updated = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = $2
            WHERE id = $1 AND available_copies < total_copies
            "#,
        )
        .bind(loan.book_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(AppError::Internal(format!(
                "available_copies would exceed total_copies for book {}",
                loan.book_id
            )));
        }

        tx.commit().await?;
        Ok((details, fine))
    }

    /// Transition every expired `borrowed` loan to `overdue`. A single
    /// conditional UPDATE, so re-running is idempotent and the sweep never
    /// touches loans a concurrent return has already finalized.
    pub async fn sweep_overdue(&self) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE book_loans
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'borrowed' AND due_date < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Active loans for a user, newest first
    pub async fn find_borrowed_by_user(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query(
            &format!(
                r#"
                SELECT {columns}
                FROM book_loans l
                JOIN books b ON l.book_id = b.id
                WHERE l.user_id = $1 AND l.status IN ('borrowed', 'overdue')
                ORDER BY l.borrow_date DESC
                "#,
                columns = LOAN_JOIN_COLUMNS
            ),
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| loan_details_from_row(r, false)).collect()
    }

    /// Full loan history for a user, paginated, newest first
    pub async fn history_by_user(
        &self,
        user_id: i32,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let offset = (page - 1) * limit;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_loans WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            &format!(
                r#"
                SELECT {columns}
                FROM book_loans l
                JOIN books b ON l.book_id = b.id
                WHERE l.user_id = $1
                ORDER BY l.borrow_date DESC
                LIMIT $2 OFFSET $3
                "#,
                columns = LOAN_JOIN_COLUMNS
            ),
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let loans = rows
            .iter()
            .map(|r| loan_details_from_row(r, false))
            .collect::<AppResult<Vec<_>>>()?;

        Ok((loans, total))
    }

    /// All loans with book and user details, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<LoanStatus>,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let offset = (page - 1) * limit;

        let (total, rows) = if let Some(status) = status {
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM book_loans WHERE status = $1")
                    .bind(status)
                    .fetch_one(&self.pool)
                    .await?;

            let rows = sqlx::query(
                &format!(
                    r#"
                    SELECT {columns},
                           u.name as user_name, u.email as user_email,
                           u.membership_number as user_membership_number
                    FROM book_loans l
                    JOIN books b ON l.book_id = b.id
                    JOIN users u ON l.user_id = u.id
                    WHERE l.status = $1
                    ORDER BY l.borrow_date DESC
                    LIMIT $2 OFFSET $3
                    "#,
                    columns = LOAN_JOIN_COLUMNS
                ),
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            (total, rows)
        } else {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_loans")
                .fetch_one(&self.pool)
                .await?;

            let rows = sqlx::query(
                &format!(
                    r#"
                    SELECT {columns},
                           u.name as user_name, u.email as user_email,
                           u.membership_number as user_membership_number
                    FROM book_loans l
                    JOIN books b ON l.book_id = b.id
                    JOIN users u ON l.user_id = u.id
                    ORDER BY l.borrow_date DESC
                    LIMIT $1 OFFSET $2
                    "#,
                    columns = LOAN_JOIN_COLUMNS
                ),
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            (total, rows)
        };

        let loans = rows
            .iter()
            .map(|r| loan_details_from_row(r, true))
            .collect::<AppResult<Vec<_>>>()?;

        Ok((loans, total))
    }

    /// Active loans for a book with borrower summaries (book detail view)
    pub async fn active_loans_for_book(&self, book_id: i32) -> AppResult<Vec<ActiveLoanSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.borrow_date, l.due_date, l.status,
                   u.id as user_id, u.name as user_name, u.email as user_email,
                   u.membership_number as user_membership_number
            FROM book_loans l
            JOIN users u ON l.user_id = u.id
            WHERE l.book_id = $1 AND l.status IN ('borrowed', 'overdue')
            ORDER BY l.borrow_date
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ActiveLoanSummary {
                id: row.get("id"),
                borrow_date: row.get("borrow_date"),
                due_date: row.get("due_date"),
                status: row.get("status"),
                user: UserSummary {
                    id: row.get("user_id"),
                    name: row.get("user_name"),
                    email: row.get("user_email"),
                    membership_number: row.get("user_membership_number"),
                },
            })
            .collect())
    }

    /// Whether any active loan references the book (delete guard)
    pub async fn book_has_active_loans(&self, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM book_loans WHERE book_id = $1 AND status IN ('borrowed', 'overdue'))",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Whether the user holds any active loan (delete guard)
    pub async fn user_has_active_loans(&self, user_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM book_loans WHERE user_id = $1 AND status IN ('borrowed', 'overdue'))",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
