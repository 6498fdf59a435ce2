//! Lending engine: borrow, return and the overdue sweep.
//!
//! Policy (loan period, borrow limit, fine rate) comes from
//! [`LendingConfig`]; the transactional invariants live in the loans
//! repository. This layer validates inputs and applies policy.

use rust_decimal::Decimal;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        loan::{LoanDetails, LoanQuery},
        response::Paginated,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
    config: LendingConfig,
}

impl LendingService {
    pub fn new(repository: Repository, config: LendingConfig) -> Self {
        Self { repository, config }
    }

    /// Borrow a book for the given user
    pub async fn borrow(
        &self,
        book_id: i32,
        user_id: i32,
        loan_days: Option<i64>,
    ) -> AppResult<LoanDetails> {
        let loan_days = loan_days.unwrap_or(self.config.loan_period_days);
        if loan_days < 1 || loan_days > self.config.max_loan_days {
            return Err(AppError::Validation(format!(
                "Loan period must be between 1 and {} days",
                self.config.max_loan_days
            )));
        }

        let loan = self
            .repository
            .loans
            .borrow(book_id, user_id, loan_days, self.config.max_active_loans)
            .await?;

        tracing::info!(
            loan_id = loan.loan.id,
            book_id,
            user_id,
            due_date = %loan.loan.due_date,
            "book borrowed"
        );

        Ok(loan)
    }

    /// Return a loan, computing any overdue fine
    pub async fn return_book(
        &self,
        loan_id: i32,
        user_id: i32,
    ) -> AppResult<(LoanDetails, Decimal)> {
        let (loan, fine) = self
            .repository
            .loans
            .return_loan(loan_id, user_id, self.config.daily_fine_rate)
            .await?;

        tracing::info!(loan_id, user_id, %fine, "book returned");

        Ok((loan, fine))
    }

    /// Mark all expired `borrowed` loans as `overdue`
    pub async fn sweep_overdue(&self) -> AppResult<u64> {
        let updated = self.repository.loans.sweep_overdue().await?;
        if updated > 0 {
            tracing::info!(updated, "overdue sweep transitioned loans");
        }
        Ok(updated)
    }

    /// Active loans for a user
    pub async fn borrowed_books(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.find_borrowed_by_user(user_id).await
    }

    /// Paginated loan history for a user
    pub async fn loan_history(
        &self,
        user_id: i32,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> AppResult<Paginated<LoanDetails>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(10).clamp(1, 100);

        let (loans, total) = self
            .repository
            .loans
            .history_by_user(user_id, page, limit)
            .await?;

        Ok(Paginated::new(loans, total, page, limit))
    }

    /// All loans (admin/librarian view)
    pub async fn all_loans(&self, query: &LoanQuery) -> AppResult<Paginated<LoanDetails>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);

        let (loans, total) = self.repository.loans.list(query.status, page, limit).await?;

        Ok(Paginated::new(loans, total, page, limit))
    }
}
