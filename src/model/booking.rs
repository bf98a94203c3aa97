use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::service::Service;
use super::user::User;

/// Status of a freshly created booking. Other statuses are free text.
pub const STATUS_OPEN: &str = "open";

// Row of the bookings table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub barber_id: Uuid,
    pub guest_id: Uuid,
    pub status: String,
    pub booking_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Booking with barber, guest and services resolved for responses
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub barber: User,
    pub guest: User,
    pub services: Vec<Service>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub barber_id: Uuid,
    pub guest_id: Uuid,
    pub booking_time: DateTime<Utc>,
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub barber_id: Uuid,
    pub guest_id: Uuid,
    /// Keeps the current status when omitted.
    pub status: Option<String>,
    pub booking_time: DateTime<Utc>,
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub barber_id: Option<Uuid>,
    pub status: Option<String>,
    /// Month number (1-12) of the current year, kept raw so bad input can be reported.
    pub month: Option<String>,
}
