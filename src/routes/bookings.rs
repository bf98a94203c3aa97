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
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{created, success, success_list};
use crate::bookings::BookingFilter;
use crate::error::AppError;
use crate::model::booking::{BookingQuery, CreateBookingRequest, UpdateBookingRequest};
use crate::state::AppState;

pub fn bookings_router() -> Router {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route(
            "/:id",
            get(get_booking)
                .put(update_booking)
                .delete(delete_booking),
        )
        .route("/guest/:guest_id", delete(delete_guest_bookings))
}

// Create booking with its services
async fn create_booking(
    Extension(state): Extension<AppState>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, RespJson<Value>), AppError> {
    let Json(payload) = payload?;
    let detail = state.bookings.create(payload).await?;
    Ok(created(detail))
}

// List bookings, optionally filtered by barber, status and month
async fn list_bookings(
    Extension(state): Extension<AppState>,
    query: Result<Query<BookingQuery>, QueryRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Query(query) = query?;
    let filter = BookingFilter::from_query(query, Utc::now().date_naive())?;
    let bookings = state.bookings.list(&filter).await?;
    Ok(success_list(bookings))
}

async fn get_booking(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let detail = state.bookings.get(id).await?;
    Ok(success(detail))
}

// Replace scalar fields and the full service set
async fn update_booking(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateBookingRequest>, JsonRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let detail = state.bookings.update(id, payload).await?;
    Ok(success(detail))
}

async fn delete_booking(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.bookings.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Remove every booking of a guest
async fn delete_guest_bookings(
    Extension(state): Extension<AppState>,
    guest_id: Result<Path<Uuid>, PathRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Path(guest_id) = guest_id?;
    let deleted = state.bookings.delete_by_guest(guest_id).await?;
    Ok(RespJson(json!({
        "status": "success",
        "deleted": deleted,
    })))
}
