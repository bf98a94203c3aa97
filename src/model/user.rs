use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::point::Point;
use super::service::{Service, ServiceHistory};
use crate::error::AppError;

/// Longest phone number the users table accepts.
pub const MAX_PHONE_LEN: usize = 10;

/// Columns selected whenever a `User` is loaded; the password hash never leaves the table.
pub const USER_COLUMNS: &str = "id, name, email, phone, position, intro, birthday, roles, provider, photo, verified, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub position: String,
    pub intro: String,
    pub birthday: Option<NaiveDate>,
    pub roles: Vec<String>,
    pub provider: String,
    pub photo: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// User with everything hanging off it, as returned by the lookup-by-phone endpoint
#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub points: Vec<Point>,
    pub services: Vec<Service>,
    pub services_history: Vec<ServiceHistory>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub position: Option<String>,
    pub intro: Option<String>,
    pub roles: Option<Vec<String>>,
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Comma separated; a user must hold every listed role.
    pub role: Option<String>,
}

impl UserQuery {
    pub fn roles(&self) -> Vec<String> {
        self.role
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub fn check_phone(phone: &str) -> Result<(), AppError> {
    if phone.trim().is_empty() {
        return Err(AppError::Validation("phone must not be empty".to_string()));
    }
    if phone.chars().count() > MAX_PHONE_LEN {
        return Err(AppError::Validation(format!(
            "phone must be at most {MAX_PHONE_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_filter_parsing() {
        let query = UserQuery {
            page: None,
            limit: None,
            role: Some("barber, admin,,".to_string()),
        };
        assert_eq!(query.roles(), vec!["barber".to_string(), "admin".to_string()]);

        let empty = UserQuery { page: None, limit: None, role: Some(String::new()) };
        assert!(empty.roles().is_empty());
    }

    #[test]
    fn test_check_phone_limits_length() {
        assert!(check_phone("0812345678").is_ok());
        assert!(matches!(
            check_phone("08123456789"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(check_phone("  "), Err(AppError::Validation(_))));
    }
}
