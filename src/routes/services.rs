use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Json, Path, Query,
    },
    http::StatusCode,
    response::Json as RespJson,
    routing::{delete, get, post},
    Router,
};
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::users::find_user;
use super::{created, success, success_list};
use crate::error::AppError;
use crate::model::service::{
    CreateServiceRequest, Service, ServiceHistory, UpdateServiceRequest, UserFilterQuery,
    UserService, UserServiceRequest, SERVICE_COLUMNS,
};
use crate::model::{Page, PageQuery};
use crate::state::AppState;

const DEFAULT_SERVICE_LIMIT: i64 = 10;
const DEFAULT_SERVICE_TYPE: &str = "one_time";
const USER_SERVICE_COLUMNS: &str = "id, user_id, service_id, created_at, updated_at";
const HISTORY_COLUMNS: &str = "id, user_id, service_id, count, created_at, updated_at";

pub fn services_router() -> Router {
    Router::new()
        .route("/", post(create_service).get(list_services))
        .route(
            "/user-service",
            post(register_user_service).get(list_user_services),
        )
        .route("/user-service/:id", delete(delete_user_service))
        .route("/history", post(record_history).get(list_histories))
        .route(
            "/:id",
            get(get_service).put(update_service).delete(delete_service),
        )
}

async fn find_service(pool: &PgPool, id: Uuid) -> Result<Service, AppError> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1");
    sqlx::query_as::<_, Service>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No service with that id exists".to_string()))
}

/// Dynamic `WHERE user_id = $1` shared by the two per-user listings.
fn user_filter(user_id: Option<Uuid>) -> (String, usize) {
    match user_id {
        Some(_) => ("WHERE user_id = $1".to_string(), 2),
        None => (String::new(), 1),
    }
}

async fn create_service(
    Extension(state): Extension<AppState>,
    payload: Result<Json<CreateServiceRequest>, JsonRejection>,
) -> Result<(StatusCode, RespJson<Value>), AppError> {
    let Json(payload) = payload?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if payload.price < 0.0 {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }
    let service_type = payload
        .service_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string());

    let sql = format!(
        r#"INSERT INTO services (id, name, image, price, price_text, todos, category, service_type, "limit", description, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
         RETURNING {SERVICE_COLUMNS}"#
    );
    let service = sqlx::query_as::<_, Service>(&sql)
        .bind(Uuid::new_v4())
        .bind(payload.name.trim().to_string())
        .bind(payload.image)
        .bind(payload.price)
        .bind(payload.price_text)
        .bind(payload.todos)
        .bind(payload.category)
        .bind(service_type)
        .bind(payload.limit)
        .bind(payload.description)
        .fetch_one(&state.pool)
        .await?;

    info!(service_id = %service.id, name = %service.name, "Service created");
    Ok(created(service))
}

async fn list_services(
    Extension(state): Extension<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Query(query) = query?;
    let page = Page::resolve(query.page, query.limit, DEFAULT_SERVICE_LIMIT)?;

    let sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM services ORDER BY created_at ASC LIMIT $1 OFFSET $2"
    );
    let services = sqlx::query_as::<_, Service>(&sql)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&state.pool)
        .await?;

    Ok(success_list(services))
}

async fn get_service(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let service = find_service(&state.pool, id).await?;
    Ok(success(service))
}

async fn update_service(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateServiceRequest>, JsonRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    if matches!(payload.name.as_deref().map(str::trim), Some("")) {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if matches!(payload.price, Some(p) if p < 0.0) {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }

    let sql = format!(
        r#"UPDATE services SET
            name = COALESCE($1, name),
            image = COALESCE($2, image),
            price = COALESCE($3, price),
            price_text = COALESCE($4, price_text),
            todos = COALESCE($5, todos),
            category = COALESCE($6, category),
            service_type = COALESCE($7, service_type),
            "limit" = COALESCE($8, "limit"),
            description = COALESCE($9, description),
            updated_at = NOW()
         WHERE id = $10
         RETURNING {SERVICE_COLUMNS}"#
    );
    let service = sqlx::query_as::<_, Service>(&sql)
        .bind(payload.name)
        .bind(payload.image)
        .bind(payload.price)
        .bind(payload.price_text)
        .bind(payload.todos)
        .bind(payload.category)
        .bind(payload.service_type)
        .bind(payload.limit)
        .bind(payload.description)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No service with that id exists".to_string()))?;

    Ok(success(service))
}

// Fails with a conflict while bookings still reference the service
async fn delete_service(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    let result = sqlx::query("DELETE FROM services WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No service with that id exists".to_string()));
    }

    info!(service_id = %id, "Service deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Register a user to a service; each pair at most once
async fn register_user_service(
    Extension(state): Extension<AppState>,
    payload: Result<Json<UserServiceRequest>, JsonRejection>,
) -> Result<(StatusCode, RespJson<Value>), AppError> {
    let Json(payload) = payload?;
    find_user(&state.pool, payload.user_id).await?;
    find_service(&state.pool, payload.service_id).await?;

    let sql = format!(
        "INSERT INTO user_services (id, user_id, service_id, created_at, updated_at)
         VALUES ($1, $2, $3, NOW(), NOW())
         RETURNING {USER_SERVICE_COLUMNS}"
    );
    let registration = sqlx::query_as::<_, UserService>(&sql)
        .bind(Uuid::new_v4())
        .bind(payload.user_id)
        .bind(payload.service_id)
        .fetch_one(&state.pool)
        .await?;

    Ok(created(registration))
}

async fn list_user_services(
    Extension(state): Extension<AppState>,
    query: Result<Query<UserFilterQuery>, QueryRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Query(query) = query?;
    let page = Page::resolve(query.page, query.limit, DEFAULT_SERVICE_LIMIT)?;
    let (where_clause, param_count) = user_filter(query.user_id);

    let sql = format!(
        "SELECT {USER_SERVICE_COLUMNS} FROM user_services {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
        where_clause,
        param_count,
        param_count + 1
    );
    let mut q = sqlx::query_as::<_, UserService>(&sql);
    if let Some(user_id) = query.user_id {
        q = q.bind(user_id);
    }
    let rows = q.bind(page.limit).bind(page.offset).fetch_all(&state.pool).await?;

    Ok(success_list(rows))
}

async fn delete_user_service(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    let result = sqlx::query("DELETE FROM user_services WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "No user service with that id exists".to_string(),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

// First use creates the history row with count 1, later uses increment it
async fn record_history(
    Extension(state): Extension<AppState>,
    payload: Result<Json<UserServiceRequest>, JsonRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Json(payload) = payload?;
    find_user(&state.pool, payload.user_id).await?;
    find_service(&state.pool, payload.service_id).await?;

    let sql = format!(
        "INSERT INTO service_histories (id, user_id, service_id, count, created_at, updated_at)
         VALUES ($1, $2, $3, 1, NOW(), NOW())
         ON CONFLICT (user_id, service_id)
         DO UPDATE SET count = service_histories.count + 1, updated_at = NOW()
         RETURNING {HISTORY_COLUMNS}"
    );
    let history = sqlx::query_as::<_, ServiceHistory>(&sql)
        .bind(Uuid::new_v4())
        .bind(payload.user_id)
        .bind(payload.service_id)
        .fetch_one(&state.pool)
        .await?;

    info!(
        user_id = %history.user_id,
        service_id = %history.service_id,
        count = history.count,
        "Service history recorded"
    );
    Ok(success(history))
}

async fn list_histories(
    Extension(state): Extension<AppState>,
    query: Result<Query<UserFilterQuery>, QueryRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Query(query) = query?;
    let page = Page::resolve(query.page, query.limit, DEFAULT_SERVICE_LIMIT)?;
    let (where_clause, param_count) = user_filter(query.user_id);

    let sql = format!(
        "SELECT {HISTORY_COLUMNS} FROM service_histories {} ORDER BY updated_at DESC LIMIT ${} OFFSET ${}",
        where_clause,
        param_count,
        param_count + 1
    );
    let mut q = sqlx::query_as::<_, ServiceHistory>(&sql);
    if let Some(user_id) = query.user_id {
        q = q.bind(user_id);
    }
    let rows = q.bind(page.limit).bind(page.offset).fetch_all(&state.pool).await?;

    Ok(success_list(rows))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::bookings::memory::MemoryBookingStore;
    use crate::routes::testing;

    #[test]
    fn test_user_filter_shifts_paging_params() {
        let (clause, next) = user_filter(Some(Uuid::nil()));
        assert_eq!(clause, "WHERE user_id = $1");
        assert_eq!(next, 2);

        let (clause, next) = user_filter(None);
        assert!(clause.is_empty());
        assert_eq!(next, 1);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let state = testing::state(Arc::new(MemoryBookingStore::default()));
        let request = testing::json_request(
            "POST",
            "/",
            json!({ "name": "  ", "image": "cut.png", "price": 50000.0 }),
        );
        let response = testing::send(services_router(), state, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_uuid_path_rejected() {
        let state = testing::state(Arc::new(MemoryBookingStore::default()));
        let response = testing::send(
            services_router(),
            state,
            testing::empty_request("GET", "/not-a-uuid"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = testing::body_json(response).await;
        assert_eq!(body["status"], "fail");
    }
}
