use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    response::Json as RespJson,
    routing::post,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::success;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BirthdayReminderRequest {
    pub email: String,
}

pub fn reminds_router() -> Router {
    Router::new()
        .route("/birthday", post(send_birthday_reminder))
        .route("/run", post(run_reminders))
}

// Send the birthday greeting to one address right away
async fn send_birthday_reminder(
    Extension(state): Extension<AppState>,
    payload: Result<Json<BirthdayReminderRequest>, JsonRejection>,
) -> Result<RespJson<Value>, AppError> {
    let Json(payload) = payload?;
    state.reminder.send_one(payload.email.trim()).await?;
    Ok(RespJson(json!({
        "status": "success",
        "message": "Birthday reminder sent",
    })))
}

// Run today's scan now instead of waiting for the daily tick
async fn run_reminders(
    Extension(state): Extension<AppState>,
) -> Result<RespJson<Value>, AppError> {
    let report = state.reminder.run(Utc::now().date_naive()).await?;
    Ok(success(report))
}
