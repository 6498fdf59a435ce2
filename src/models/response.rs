//! Response envelope shared by all endpoints

use serde::Serialize;
use utoipa::ToSchema;

/// Standard `{success, message, data}` envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Paginated collection with 1-indexed pages.
#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub items: Vec<T>,
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub items_per_page: i64,
}

impl<T> Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total_items: i64, page: i64, per_page: i64) -> Self {
        Self {
            items,
            total_items,
            total_pages: total_pages(total_items, per_page),
            current_page: page,
            items_per_page: per_page,
        }
    }
}

/// ceil(count / limit), with an empty result still reporting 0 pages.
pub fn total_pages(count: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (count + limit - 1) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(21, 10), 3);
    }

    #[test]
    fn total_pages_with_bad_limit() {
        assert_eq!(total_pages(5, 0), 0);
    }
}
