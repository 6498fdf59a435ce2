//! Book loan model, status lifecycle and fine computation

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

use super::book::BookSummary;
use super::user::UserSummary;

/// Loan status lifecycle.
///
/// `borrowed` → `overdue` only via the overdue sweep; `borrowed` or
/// `overdue` → `returned` via a return. `returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Borrowed,
    Overdue,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }

    /// Active loans hold a copy: borrowed or overdue.
    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Borrowed | LoanStatus::Overdue)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "borrowed" => Ok(LoanStatus::Borrowed),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as TEXT)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookLoan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub fine: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookLoan {
    /// Days past due at `at`, rounded up, clamped to zero. A loan
    /// returned exactly on the due date owes nothing.
    pub fn overdue_days_at(&self, at: DateTime<Utc>) -> i64 {
        overdue_days(self.due_date, at)
    }

    /// Fine owed at `at`. Derived from `due_date` alone, never from
    /// `status`, so it is identical whether or not the sweep already
    /// marked the loan overdue.
    pub fn fine_at(&self, at: DateTime<Utc>, daily_rate: Decimal) -> Decimal {
        Decimal::from(overdue_days(self.due_date, at)) * daily_rate
    }
}

/// Days past due, rounded up to whole days. Any positive lateness,
/// however small, counts as a full day.
pub fn overdue_days(due_date: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let late = at - due_date;
    if late <= Duration::zero() {
        return 0;
    }
    let ms = late.num_milliseconds();
    (ms + 86_399_999) / 86_400_000
}

/// Loan with book (and optionally user) details for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: BookLoan,
    pub book: BookSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Active loan entry shown in the book detail view
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActiveLoanSummary {
    pub id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: LoanStatus,
    pub user: UserSummary,
}

/// Borrow request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BorrowRequest {
    /// Loan period in days (defaults to the configured period)
    pub loan_days: Option<i64>,
}

/// Loan listing query parameters (admin/librarian)
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    /// Filter by status (borrowed, overdue, returned)
    pub status: Option<LoanStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn no_overdue_days_before_due_date() {
        let due = date("2025-06-15T12:00:00Z");
        assert_eq!(overdue_days(due, date("2025-06-10T12:00:00Z")), 0);
        assert_eq!(overdue_days(due, due), 0);
    }

    #[test]
    fn overdue_days_round_up() {
        let due = date("2025-06-15T12:00:00Z");
        // any positive lateness is a full day, even sub-second
        assert_eq!(overdue_days(due, date("2025-06-15T12:00:00.500Z")), 1);
        assert_eq!(overdue_days(due, date("2025-06-15T12:00:01Z")), 1);
        assert_eq!(overdue_days(due, date("2025-06-18T12:00:00Z")), 3);
        assert_eq!(overdue_days(due, date("2025-06-18T12:00:01Z")), 4);
    }

    #[test]
    fn fine_is_days_times_rate() {
        let loan = BookLoan {
            id: 1,
            user_id: 1,
            book_id: 1,
            borrow_date: date("2025-06-01T12:00:00Z"),
            due_date: date("2025-06-15T12:00:00Z"),
            return_date: None,
            status: LoanStatus::Borrowed,
            fine: Decimal::ZERO,
            created_at: date("2025-06-01T12:00:00Z"),
            updated_at: date("2025-06-01T12:00:00Z"),
        };
        let rate = dec!(1.00);
        assert_eq!(loan.fine_at(date("2025-06-10T00:00:00Z"), rate), dec!(0.00));
        assert_eq!(loan.fine_at(date("2025-06-18T12:00:00Z"), rate), dec!(3.00));
        assert_eq!(loan.fine_at(date("2025-06-25T12:00:00Z"), rate), dec!(10.00));
    }

    #[test]
    fn fine_ignores_status() {
        // the sweep marking a loan overdue must not change the amount
        let due = date("2025-06-15T12:00:00Z");
        let at = date("2025-06-18T12:00:00Z");
        for status in [LoanStatus::Borrowed, LoanStatus::Overdue] {
            let loan = BookLoan {
                id: 1,
                user_id: 1,
                book_id: 1,
                borrow_date: date("2025-06-01T12:00:00Z"),
                due_date: due,
                return_date: None,
                status,
                fine: Decimal::ZERO,
                created_at: due,
                updated_at: due,
            };
            assert_eq!(loan.fine_at(at, dec!(1.00)), dec!(3.00));
        }
    }

    #[test]
    fn status_round_trip() {
        for s in ["borrowed", "overdue", "returned"] {
            let status: LoanStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!("lost".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn active_statuses() {
        assert!(LoanStatus::Borrowed.is_active());
        assert!(LoanStatus::Overdue.is_active());
        assert!(!LoanStatus::Returned.is_active());
    }
}
