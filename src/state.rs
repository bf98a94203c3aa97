use std::sync::Arc;

use sqlx::PgPool;

use crate::bookings::BookingManager;
use crate::points::PointLedger;
use crate::reminder::ReminderScheduler;

/// Everything a handler needs, built once in `main` and injected as an
/// axum `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub bookings: BookingManager,
    pub points: PointLedger,
    pub reminder: Arc<ReminderScheduler>,
}
