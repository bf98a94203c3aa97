use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Json, Path, Query,
    },
    response::Json as RespJson,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{success, success_list};
use crate::error::AppError;
use crate::model::point::Point;
use crate::model::service::{Service, ServiceHistory, SERVICE_COLUMNS};
use crate::model::user::{
    check_phone, UpdateUserRequest, User, UserDetail, UserQuery, USER_COLUMNS,
};
use crate::model::Page;
use crate::state::AppState;

const DEFAULT_USER_LIMIT: i64 = 100;

pub fn users_router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/phone/:phone", get(get_user_by_phone))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

pub(crate) async fn find_user_by_phone(pool: &PgPool, phone: &str) -> Result<User, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(phone)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No user with phone {phone}")))
}

pub(crate) async fn find_user(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No user with that id exists".to_string()))
}

// List users, newest update first, optionally requiring every listed role
async fn list_users(
    Extension(state): Extension<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Query(query) = query?;
    let page = Page::resolve(query.page, query.limit, DEFAULT_USER_LIMIT)?;
    let roles = query.roles();

    let mut param_count = 1;
    let where_clause = if roles.is_empty() {
        String::new()
    } else {
        param_count += 1;
        "WHERE roles @> $1".to_string()
    };

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users {} ORDER BY updated_at DESC LIMIT ${} OFFSET ${}",
        where_clause,
        param_count,
        param_count + 1
    );

    let mut q = sqlx::query_as::<_, User>(&sql);
    if !roles.is_empty() {
        q = q.bind(roles);
    }
    let users = q.bind(page.limit).bind(page.offset).fetch_all(&state.pool).await?;

    Ok(success_list(users))
}

async fn get_user(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let user = find_user(&state.pool, id).await?;
    Ok(success(user))
}

// User with points ledger, registered services and service history
async fn get_user_by_phone(
    Extension(state): Extension<AppState>,
    phone: Result<Path<String>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(phone) = phone?;
    let user = find_user_by_phone(&state.pool, &phone).await?;

    let points = sqlx::query_as::<_, Point>(
        "SELECT id, user_id, points, description, created_at, updated_at
         FROM points WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    let services_sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM services
         WHERE id IN (SELECT service_id FROM user_services WHERE user_id = $1)
         ORDER BY name ASC"
    );
    let services = sqlx::query_as::<_, Service>(&services_sql)
        .bind(user.id)
        .fetch_all(&state.pool)
        .await?;

    let services_history = sqlx::query_as::<_, ServiceHistory>(
        "SELECT id, user_id, service_id, count, created_at, updated_at
         FROM service_histories WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(success(UserDetail {
        user,
        points,
        services,
        services_history,
    }))
}

// Partial update; omitted fields keep their value
async fn update_user(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;

    if let Some(phone) = &payload.phone {
        check_phone(phone)?;
    }
    if matches!(payload.name.as_deref().map(str::trim), Some("")) {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }

    let sql = format!(
        "UPDATE users SET
            name = COALESCE($1, name),
            email = COALESCE($2, email),
            phone = COALESCE($3, phone),
            birthday = COALESCE($4, birthday),
            position = COALESCE($5, position),
            intro = COALESCE($6, intro),
            roles = COALESCE($7, roles),
            photo = COALESCE($8, photo),
            updated_at = NOW()
         WHERE id = $9
         RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(payload.name)
        .bind(payload.email)
        .bind(payload.phone)
        .bind(payload.birthday)
        .bind(payload.position)
        .bind(payload.intro)
        .bind(payload.roles)
        .bind(payload.photo)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No user with that id exists".to_string()))?;

    info!(user_id = %user.id, "User updated");
    Ok(success(user))
}

// Delete a user together with their guest bookings, points, services and history
async fn delete_user(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let bookings = state.bookings.remove_user(id).await?;
    Ok(RespJson(json!({
        "status": "success",
        "message": "User deleted",
        "bookings_deleted": bookings,
    })))
}
