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
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::users::find_user_by_phone;
use super::{created, success, success_list};
use crate::error::AppError;
use crate::model::point::{CreatePointRequest, Point, RedeemPointRequest, UpdatePointRequest};
use crate::model::{Page, PageQuery};
use crate::state::AppState;

const POINT_COLUMNS: &str = "id, user_id, points, description, created_at, updated_at";
const DEFAULT_POINT_LIMIT: i64 = 100;

pub fn points_router() -> Router {
    Router::new()
        .route("/", post(create_point).get(list_points))
        .route("/redeem", post(redeem_points))
        .route("/balance/:phone", get(get_balance))
        .route("/phone/:phone", get(list_points_by_phone))
        .route("/history/:user_id", delete(delete_ledger))
        .route("/:id", get(get_point).put(update_point).delete(delete_point))
}

async fn find_point(pool: &PgPool, id: Uuid) -> Result<Point, AppError> {
    let sql = format!("SELECT {POINT_COLUMNS} FROM points WHERE id = $1");
    sqlx::query_as::<_, Point>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No point entry with that id exists".to_string()))
}

// Append a balance snapshot for the user owning the phone number
async fn create_point(
    Extension(state): Extension<AppState>,
    payload: Result<Json<CreatePointRequest>, JsonRejection>,
) -> Result<(StatusCode, RespJson<Value>), AppError> {
    let Json(payload) = payload?;
    let point = state.points.record(payload).await?;
    Ok(created(point))
}

// Spend points; the balance never drops below zero
async fn redeem_points(
    Extension(state): Extension<AppState>,
    payload: Result<Json<RedeemPointRequest>, JsonRejection>,
) -> Result<(StatusCode, RespJson<Value>), AppError> {
    let Json(payload) = payload?;
    let point = state.points.redeem(payload).await?;
    Ok(created(point))
}

async fn get_balance(
    Extension(state): Extension<AppState>,
    phone: Result<Path<String>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(phone) = phone?;
    let balance = state.points.balance(&phone).await?;
    Ok(success(balance))
}

async fn list_points(
    Extension(state): Extension<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Query(query) = query?;
    let page = Page::resolve(query.page, query.limit, DEFAULT_POINT_LIMIT)?;

    let sql = format!(
        "SELECT {POINT_COLUMNS} FROM points ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    );
    let points = sqlx::query_as::<_, Point>(&sql)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&state.pool)
        .await?;

    Ok(success_list(points))
}

// Full ledger of one user, newest first
async fn list_points_by_phone(
    Extension(state): Extension<AppState>,
    phone: Result<Path<String>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(phone) = phone?;
    let user = find_user_by_phone(&state.pool, &phone).await?;

    let sql = format!(
        "SELECT {POINT_COLUMNS} FROM points WHERE user_id = $1 ORDER BY created_at DESC"
    );
    let points = sqlx::query_as::<_, Point>(&sql)
        .bind(user.id)
        .fetch_all(&state.pool)
        .await?;

    Ok(success_list(points))
}

async fn get_point(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let point = find_point(&state.pool, id).await?;
    Ok(success(point))
}

async fn update_point(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdatePointRequest>, JsonRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    if matches!(payload.points, Some(p) if p < 0) {
        return Err(AppError::Validation("points must not be negative".to_string()));
    }

    let sql = format!(
        "UPDATE points SET
            points = COALESCE($1, points),
            description = COALESCE($2, description),
            updated_at = NOW()
         WHERE id = $3
         RETURNING {POINT_COLUMNS}"
    );
    let point = sqlx::query_as::<_, Point>(&sql)
        .bind(payload.points)
        .bind(payload.description)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No point entry with that id exists".to_string()))?;

    Ok(success(point))
}

async fn delete_point(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    let result = sqlx::query("DELETE FROM points WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "No point entry with that id exists".to_string(),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

// Wipe the whole ledger of a user
async fn delete_ledger(
    Extension(state): Extension<AppState>,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(user_id) = user_id?;
    let deleted = sqlx::query("DELETE FROM points WHERE user_id = $1")
        .bind(user_id)
        .execute(&state.pool)
        .await?
        .rows_affected();

    info!(user_id = %user_id, deleted, "Point ledger deleted");
    Ok(RespJson(json!({
        "status": "success",
        "deleted": deleted,
    })))
}
