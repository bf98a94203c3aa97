//! Booking transaction manager.
//!
//! A booking row and its `booking_services` association rows are always
//! written together inside one store transaction. Every lookup that can fail
//! validation (barber, guest, services, the booking itself) runs before the
//! transaction is opened, so a rejected request never writes anything.
//!
//! Dropping a [`BookingTx`] without calling [`BookingTx::commit`] rolls it
//! back; the manager relies on `?` for that.

mod postgres;

#[cfg(test)]
pub(crate) mod memory;

pub use postgres::PgBookingStore;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::booking::{
    Booking, BookingDetail, BookingQuery, CreateBookingRequest, UpdateBookingRequest, STATUS_OPEN,
};
use crate::model::service::Service;
use crate::model::user::User;
use crate::model::Page;

/// Default page size for booking listings; large enough to mean "everything".
pub const DEFAULT_LIST_LIMIT: i64 = 1000;

/// Read side of the booking store plus the entry point for transactions.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError>;

    async fn find_services(&self, ids: &[Uuid]) -> Result<Vec<Service>, AppError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError>;

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError>;

    /// `(booking_id, service_id)` association pairs for the given bookings.
    async fn service_links(&self, booking_ids: &[Uuid]) -> Result<Vec<(Uuid, Uuid)>, AppError>;

    async fn begin(&self) -> Result<Box<dyn BookingTx>, AppError>;
}

/// Writes performed inside a single store transaction.
#[async_trait]
pub trait BookingTx: Send {
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError>;

    /// Overwrites the scalar fields; `false` when the row does not exist.
    async fn update_booking(&mut self, booking: &Booking) -> Result<bool, AppError>;

    async fn attach_services(
        &mut self,
        booking_id: Uuid,
        service_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn clear_services(&mut self, booking_id: Uuid) -> Result<u64, AppError>;

    /// `false` when the row does not exist.
    async fn delete_booking(&mut self, booking_id: Uuid) -> Result<bool, AppError>;

    async fn guest_booking_ids(&mut self, guest_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    async fn delete_guest_bookings(&mut self, guest_id: Uuid) -> Result<u64, AppError>;

    /// Locks the user row until the transaction ends; `false` when absent.
    async fn lock_user(&mut self, user_id: Uuid) -> Result<bool, AppError>;

    async fn barber_booking_count(&mut self, user_id: Uuid) -> Result<i64, AppError>;

    /// Deletes the user row with its point ledger, service registrations and
    /// service history. Bookings must already be gone.
    async fn purge_user(&mut self, user_id: Uuid) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

/// Parsed listing filter.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingFilter {
    pub page: Page,
    pub barber_id: Option<Uuid>,
    pub status: Option<String>,
    /// Half-open `[start, end)` range on `booking_time`.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl BookingFilter {
    /// `today` fixes the year the month filter refers to.
    pub fn from_query(query: BookingQuery, today: NaiveDate) -> Result<Self, AppError> {
        let page = Page::resolve(query.page, query.limit, DEFAULT_LIST_LIMIT)?;
        let status = query
            .status
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let window = match query.month.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(token) => Some(month_window(today.year(), token)?),
        };

        Ok(Self {
            page,
            barber_id: query.barber_id,
            status,
            window,
        })
    }
}

/// `[first of month, first of next month)` for a month number of `year`.
pub fn month_window(year: i32, token: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let invalid = || AppError::Validation(format!("Invalid month filter: {token}"));

    let month: u32 = token.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(invalid)?;
    Ok((midnight_utc(start).ok_or_else(invalid)?, midnight_utc(end).ok_or_else(invalid)?))
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
}

/// Removes repeated ids, keeping the first occurrence order.
fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Clone)]
pub struct BookingManager {
    store: Arc<dyn BookingStore>,
}

impl BookingManager {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, req: CreateBookingRequest) -> Result<BookingDetail, AppError> {
        let service_ids = dedup_ids(&req.service_ids);
        if service_ids.is_empty() {
            return Err(AppError::Validation("service_ids must not be empty".to_string()));
        }

        let barber = self.require_user(req.barber_id, "Barber").await?;
        let guest = self.require_user(req.guest_id, "Guest").await?;
        let services = self.resolve_services(&service_ids).await?;

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            barber_id: barber.id,
            guest_id: guest.id,
            status: STATUS_OPEN.to_string(),
            booking_time: req.booking_time,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_booking(&booking).await?;
        tx.attach_services(booking.id, &service_ids, now).await?;
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            barber_id = %booking.barber_id,
            guest_id = %booking.guest_id,
            services = service_ids.len(),
            "Booking created"
        );

        Ok(BookingDetail {
            booking,
            barber,
            guest,
            services,
        })
    }

    pub async fn update(
        &self,
        booking_id: Uuid,
        req: UpdateBookingRequest,
    ) -> Result<BookingDetail, AppError> {
        let current = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(booking_not_found)?;

        let status = req
            .status
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| current.status.clone());
        if status.is_empty() {
            return Err(AppError::Validation("status must not be empty".to_string()));
        }

        let service_ids = dedup_ids(&req.service_ids);
        if service_ids.is_empty() {
            return Err(AppError::Validation("service_ids must not be empty".to_string()));
        }

        let barber = self.require_user(req.barber_id, "Barber").await?;
        let guest = self.require_user(req.guest_id, "Guest").await?;
        let services = self.resolve_services(&service_ids).await?;

        let now = Utc::now();
        let booking = Booking {
            id: current.id,
            barber_id: barber.id,
            guest_id: guest.id,
            status,
            booking_time: req.booking_time,
            created_at: current.created_at,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        if !tx.update_booking(&booking).await? {
            return Err(booking_not_found());
        }
        let cleared = tx.clear_services(booking.id).await?;
        tx.attach_services(booking.id, &service_ids, now).await?;
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            status = %booking.status,
            cleared,
            attached = service_ids.len(),
            "Booking updated"
        );

        Ok(BookingDetail {
            booking,
            barber,
            guest,
            services,
        })
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<BookingDetail, AppError> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(booking_not_found)?;

        let mut details = self.hydrate(vec![booking]).await?;
        details.pop().ok_or_else(booking_not_found)
    }

    pub async fn delete(&self, booking_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let cleared = tx.clear_services(booking_id).await?;
        if !tx.delete_booking(booking_id).await? {
            return Err(booking_not_found());
        }
        tx.commit().await?;

        info!(booking_id = %booking_id, cleared, "Booking deleted");
        Ok(())
    }

    /// Deletes every booking of a guest; returns how many were removed.
    pub async fn delete_by_guest(&self, guest_id: Uuid) -> Result<u64, AppError> {
        let mut tx = self.store.begin().await?;
        let deleted = purge_guest_bookings(tx.as_mut(), guest_id).await?;
        tx.commit().await?;

        info!(guest_id = %guest_id, deleted, "Guest bookings deleted");
        Ok(deleted)
    }

    /// Deletes a user together with the bookings they are the guest of and
    /// everything else that references them, in one transaction. Refused
    /// while the user is still the barber of any booking.
    pub async fn remove_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tx = self.store.begin().await?;
        if !tx.lock_user(user_id).await? {
            return Err(AppError::NotFound("No user with that id exists".to_string()));
        }

        let as_barber = tx.barber_booking_count(user_id).await?;
        if as_barber > 0 {
            return Err(AppError::Conflict(format!(
                "User is still assigned as barber to {as_barber} booking(s)"
            )));
        }

        let bookings = purge_guest_bookings(tx.as_mut(), user_id).await?;
        tx.purge_user(user_id).await?;
        tx.commit().await?;

        info!(user_id = %user_id, bookings, "User deleted");
        Ok(bookings)
    }

    pub async fn list(&self, filter: &BookingFilter) -> Result<Vec<BookingDetail>, AppError> {
        let bookings = self.store.list_bookings(filter).await?;
        debug!(count = bookings.len(), ?filter, "Listed bookings");
        self.hydrate(bookings).await
    }

    async fn require_user(&self, id: Uuid, role: &str) -> Result<User, AppError> {
        self.store
            .find_users(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{role} not found")))
    }

    /// Loads every id or fails listing the ones that do not exist.
    async fn resolve_services(&self, ids: &[Uuid]) -> Result<Vec<Service>, AppError> {
        let mut found: HashMap<Uuid, Service> = self
            .store
            .find_services(ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains_key(id))
            .map(Uuid::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Some services not found: {}",
                missing.join(", ")
            )));
        }

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn hydrate(&self, bookings: Vec<Booking>) -> Result<Vec<BookingDetail>, AppError> {
        if bookings.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids = dedup_ids(
            &bookings
                .iter()
                .flat_map(|b| [b.barber_id, b.guest_id])
                .collect::<Vec<_>>(),
        );
        let users: HashMap<Uuid, User> = self
            .store
            .find_users(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let booking_ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
        let links = self.store.service_links(&booking_ids).await?;
        let service_ids = dedup_ids(&links.iter().map(|(_, s)| *s).collect::<Vec<_>>());
        let services: HashMap<Uuid, Service> = self
            .store
            .find_services(&service_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut by_booking: HashMap<Uuid, Vec<Service>> = HashMap::new();
        for (booking_id, service_id) in links {
            if let Some(service) = services.get(&service_id) {
                by_booking.entry(booking_id).or_default().push(service.clone());
            }
        }

        bookings
            .into_iter()
            .map(|booking| {
                let barber = users
                    .get(&booking.barber_id)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound("Barber not found".to_string()))?;
                let guest = users
                    .get(&booking.guest_id)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound("Guest not found".to_string()))?;
                let services = by_booking.remove(&booking.id).unwrap_or_default();
                Ok(BookingDetail {
                    booking,
                    barber,
                    guest,
                    services,
                })
            })
            .collect()
    }
}

/// Clears the service links of every booking of `guest_id`, then deletes the
/// bookings in one statement.
async fn purge_guest_bookings(tx: &mut dyn BookingTx, guest_id: Uuid) -> Result<u64, AppError> {
    let ids = tx.guest_booking_ids(guest_id).await?;
    for id in &ids {
        tx.clear_services(*id).await?;
    }
    tx.delete_guest_bookings(guest_id).await
}

fn booking_not_found() -> AppError {
    AppError::NotFound("No booking with that id exists".to_string())
}
