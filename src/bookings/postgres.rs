use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{BookingFilter, BookingStore, BookingTx};
use crate::error::AppError;
use crate::model::booking::Booking;
use crate::model::service::{Service, SERVICE_COLUMNS};
use crate::model::user::{User, USER_COLUMNS};

const BOOKING_COLUMNS: &str = "id, barber_id, guest_id, status, booking_time, created_at, updated_at";

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn find_services(&self, ids: &[Uuid]) -> Result<Vec<Service>, AppError> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ANY($1)");
        let services = sqlx::query_as::<_, Service>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(services)
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
        // Build the WHERE clause, binding in the same order below
        let mut where_clauses = Vec::new();
        let mut param_count = 1;

        if filter.barber_id.is_some() {
            where_clauses.push(format!("barber_id = ${}", param_count));
            param_count += 1;
        }

        if filter.status.is_some() {
            where_clauses.push(format!("status = ${}", param_count));
            param_count += 1;
        }

        if filter.window.is_some() {
            where_clauses.push(format!(
                "booking_time >= ${} AND booking_time < ${}",
                param_count,
                param_count + 1
            ));
            param_count += 2;
        }

        let where_clause = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings {} ORDER BY booking_time ASC, id ASC LIMIT ${} OFFSET ${}",
            where_clause,
            param_count,
            param_count + 1
        );

        let mut query = sqlx::query_as::<_, Booking>(&sql);
        if let Some(barber_id) = filter.barber_id {
            query = query.bind(barber_id);
        }
        if let Some(status) = &filter.status {
            query = query.bind(status.clone());
        }
        if let Some((start, end)) = filter.window {
            query = query.bind(start).bind(end);
        }
        query = query.bind(filter.page.limit).bind(filter.page.offset);

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn service_links(&self, booking_ids: &[Uuid]) -> Result<Vec<(Uuid, Uuid)>, AppError> {
        let links = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT booking_id, service_id FROM booking_services WHERE booking_id = ANY($1) ORDER BY created_at ASC, service_id ASC",
        )
        .bind(booking_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn begin(&self) -> Result<Box<dyn BookingTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgBookingTx { tx }))
    }
}

/// Wraps a sqlx transaction; sqlx rolls back on drop when not committed.
struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO bookings (id, barber_id, guest_id, status, booking_time, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(booking.id)
        .bind(booking.barber_id)
        .bind(booking.guest_id)
        .bind(&booking.status)
        .bind(booking.booking_time)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE bookings SET barber_id = $1, guest_id = $2, status = $3, booking_time = $4, updated_at = $5
             WHERE id = $6",
        )
        .bind(booking.barber_id)
        .bind(booking.guest_id)
        .bind(&booking.status)
        .bind(booking.booking_time)
        .bind(booking.updated_at)
        .bind(booking.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_services(
        &mut self,
        booking_id: Uuid,
        service_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO booking_services (booking_id, service_id, created_at, updated_at)
             SELECT $1, sid, $3, $3 FROM UNNEST($2::uuid[]) AS sid",
        )
        .bind(booking_id)
        .bind(service_ids.to_vec())
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn clear_services(&mut self, booking_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM booking_services WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_booking(&mut self, booking_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn guest_booking_ids(&mut self, guest_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let rows = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM bookings WHERE guest_id = $1 FOR UPDATE")
            .bind(guest_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn delete_guest_bookings(&mut self, guest_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM bookings WHERE guest_id = $1")
            .bind(guest_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lock_user(&mut self, user_id: Uuid) -> Result<bool, AppError> {
        let row = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.is_some())
    }

    async fn barber_booking_count(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE barber_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn purge_user(&mut self, user_id: Uuid) -> Result<(), AppError> {
        for sql in [
            "DELETE FROM points WHERE user_id = $1",
            "DELETE FROM user_services WHERE user_id = $1",
            "DELETE FROM service_histories WHERE user_id = $1",
            "DELETE FROM users WHERE id = $1",
        ] {
            sqlx::query(sql).bind(user_id).execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let PgBookingTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
