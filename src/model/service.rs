use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const SERVICE_COLUMNS: &str = r#"id, name, image, price, price_text, todos, category, service_type, "limit", description, created_at, updated_at"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub price: f64,
    pub price_text: String,
    pub todos: Vec<String>,
    pub category: String,
    pub service_type: String,
    pub limit: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub image: String,
    pub price: f64,
    #[serde(default)]
    pub price_text: String,
    #[serde(default)]
    pub todos: Vec<String>,
    #[serde(default)]
    pub category: String,
    pub service_type: Option<String>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub image: Option<String>,
    pub price: Option<f64>,
    pub price_text: Option<String>,
    pub todos: Option<Vec<String>>,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub limit: Option<i64>,
    pub description: Option<String>,
}

// Registration of a user to a (usually recurring) service
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserService {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UserServiceRequest {
    pub user_id: Uuid,
    pub service_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UserFilterQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub user_id: Option<Uuid>,
}
