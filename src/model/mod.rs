pub mod booking;
pub mod point;
pub mod product;
pub mod service;
pub mod user;

use serde::Deserialize;

use crate::error::AppError;

/// `?page=&limit=` as sent by the admin frontend. Pages are 1-indexed.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Resolved LIMIT/OFFSET pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn resolve(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Result<Self, AppError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);
        if page < 1 {
            return Err(AppError::Validation("Invalid page parameter".to_string()));
        }
        if limit < 1 {
            return Err(AppError::Validation("Invalid limit parameter".to_string()));
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::Validation("Invalid page parameter".to_string()))?;
        Ok(Self { limit, offset })
    }
}
