use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Json, Path, Query,
    },
    http::StatusCode,
    response::Json as RespJson,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{created, success, success_list};
use crate::error::AppError;
use crate::model::product::{
    check_price, product_slug, CreateProductRequest, Product, UpdateProductRequest,
    PRODUCT_COLUMNS,
};
use crate::model::{Page, PageQuery};
use crate::state::AppState;

const DEFAULT_PRODUCT_LIMIT: i64 = 10;

pub fn products_router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

fn not_found() -> AppError {
    AppError::NotFound("No product with that id exists".to_string())
}

async fn find_product(pool: &PgPool, id: Uuid) -> Result<Product, AppError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found)
}

async fn create_product(
    Extension(state): Extension<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, RespJson<Value>), AppError> {
    let Json(payload) = payload?;
    let slug = product_slug(&payload.title)?;
    check_price(payload.price)?;

    let sql = format!(
        "INSERT INTO products (id, title, slug, description, price, price_text, preview_image, images, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
         RETURNING {PRODUCT_COLUMNS}"
    );
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(Uuid::new_v4())
        .bind(payload.title.trim().to_string())
        .bind(slug)
        .bind(payload.description)
        .bind(payload.price)
        .bind(payload.price_text)
        .bind(payload.preview_image)
        .bind(payload.images)
        .fetch_one(&state.pool)
        .await?;

    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok(created(product))
}

async fn list_products(
    Extension(state): Extension<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Query(query) = query?;
    let page = Page::resolve(query.page, query.limit, DEFAULT_PRODUCT_LIMIT)?;

    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    );
    let products = sqlx::query_as::<_, Product>(&sql)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&state.pool)
        .await?;

    Ok(success_list(products))
}

async fn get_product(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let product = find_product(&state.pool, id).await?;
    Ok(success(product))
}

/// Columns named in an update payload, in bind order. A new title also
/// rewrites the slug.
fn update_columns(payload: &UpdateProductRequest) -> Vec<&'static str> {
    let mut columns = Vec::new();
    if payload.title.is_some() {
        columns.push("title");
        columns.push("slug");
    }
    if payload.description.is_some() {
        columns.push("description");
    }
    if payload.price.is_some() {
        columns.push("price");
    }
    if payload.price_text.is_some() {
        columns.push("price_text");
    }
    if payload.preview_image.is_some() {
        columns.push("preview_image");
    }
    if payload.images.is_some() {
        columns.push("images");
    }
    columns
}

// Update only the fields present in the payload
async fn update_product(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let slug = payload.title.as_deref().map(product_slug).transpose()?;
    if let Some(price) = payload.price {
        check_price(price)?;
    }

    let columns = update_columns(&payload);
    if columns.is_empty() {
        return Ok(success(find_product(&state.pool, id).await?));
    }

    let mut set_clauses: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", column, i + 1))
        .collect();
    set_clauses.push("updated_at = NOW()".to_string());
    let param_count = columns.len() + 1;

    let sql = format!(
        "UPDATE products SET {} WHERE id = ${} RETURNING {PRODUCT_COLUMNS}",
        set_clauses.join(", "),
        param_count
    );

    let mut query = sqlx::query_as::<_, Product>(&sql);
    if let (Some(title), Some(slug)) = (payload.title, slug) {
        query = query.bind(title.trim().to_string()).bind(slug);
    }
    if let Some(description) = payload.description {
        query = query.bind(description);
    }
    if let Some(price) = payload.price {
        query = query.bind(price);
    }
    if let Some(price_text) = payload.price_text {
        query = query.bind(price_text);
    }
    if let Some(preview_image) = payload.preview_image {
        query = query.bind(preview_image);
    }
    if let Some(images) = payload.images {
        query = query.bind(images);
    }

    let product = query
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(not_found)?;

    Ok(success(product))
}

async fn delete_product(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
