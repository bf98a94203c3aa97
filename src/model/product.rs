use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

pub const PRODUCT_COLUMNS: &str =
    "id, title, slug, description, price, price_text, preview_image, images, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    pub price_text: String,
    pub preview_image: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub price_text: String,
    #[serde(default)]
    pub preview_image: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub price_text: Option<String>,
    pub preview_image: Option<String>,
    pub images: Option<Vec<String>>,
}

/// URL slug of a product, always derived from its title.
pub fn product_slug(title: &str) -> Result<String, AppError> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        return Err(AppError::Validation(
            "title must contain letters or digits".to_string(),
        ));
    }
    Ok(slug)
}

pub fn check_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_follows_title() {
        assert_eq!(product_slug("Pomade Strong Hold").unwrap(), "pomade-strong-hold");
        assert_eq!(product_slug("  Beard Oil 50ml ").unwrap(), "beard-oil-50ml");
        assert_eq!(product_slug("Café Crème").unwrap(), "cafe-creme");
    }

    #[test]
    fn test_slug_needs_some_text() {
        assert!(matches!(product_slug(""), Err(AppError::Validation(_))));
        assert!(matches!(product_slug("!!!"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_price_must_not_be_negative() {
        assert!(check_price(0.0).is_ok());
        assert!(check_price(85000.0).is_ok());
        assert!(matches!(check_price(-1.0), Err(AppError::Validation(_))));
    }
}
