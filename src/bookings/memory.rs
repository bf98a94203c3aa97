//! In-memory [`BookingStore`] for tests. A transaction works on a copy of the
//! tables and only replaces the shared copy on commit, so an uncommitted
//! transaction leaves nothing behind.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{BookingFilter, BookingStore, BookingTx};
use crate::error::AppError;
use crate::model::booking::Booking;
use crate::model::service::Service;
use crate::model::user::User;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub users: BTreeMap<Uuid, User>,
    pub services: BTreeMap<Uuid, Service>,
    pub bookings: BTreeMap<Uuid, Booking>,
    pub links: Vec<(Uuid, Uuid)>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_attach: bool,
    fail_clear_for: Option<Uuid>,
    fail_purge_for: Option<Uuid>,
}

#[derive(Default)]
pub struct MemoryBookingStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

fn injected(what: &str) -> AppError {
    AppError::Store(sqlx::Error::Protocol(format!("injected failure: {what}")))
}

impl MemoryBookingStore {
    pub fn add_user(&self, name: &str, phone: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: Some(format!("{phone}@example.com")),
            phone: phone.to_string(),
            position: String::new(),
            intro: String::new(),
            birthday: None,
            roles: vec!["user".to_string()],
            provider: "local".to_string(),
            photo: String::new(),
            verified: true,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        user
    }

    pub fn add_service(&self, name: &str) -> Service {
        let now = Utc::now();
        let service = Service {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image: String::new(),
            price: 100_000.0,
            price_text: "100k".to_string(),
            todos: Vec::new(),
            category: String::new(),
            service_type: "one_time".to_string(),
            limit: 0,
            description: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .unwrap()
            .services
            .insert(service.id, service.clone());
        service
    }

    pub fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }

    pub fn booking_count(&self) -> usize {
        self.tables.lock().unwrap().bookings.len()
    }

    pub fn link_count(&self, booking_id: Uuid) -> usize {
        self.tables
            .lock()
            .unwrap()
            .links
            .iter()
            .filter(|(b, _)| *b == booking_id)
            .count()
    }

    pub fn total_links(&self) -> usize {
        self.tables.lock().unwrap().links.len()
    }

    pub fn fail_next_attach(&self) {
        self.faults.lock().unwrap().fail_attach = true;
    }

    pub fn fail_clear_for(&self, booking_id: Uuid) {
        self.faults.lock().unwrap().fail_clear_for = Some(booking_id);
    }

    pub fn fail_purge_for(&self, user_id: Uuid) {
        self.faults.lock().unwrap().fail_purge_for = Some(user_id);
    }

    pub fn has_user(&self, user_id: Uuid) -> bool {
        self.tables.lock().unwrap().users.contains_key(&user_id)
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn find_services(&self, ids: &[Uuid]) -> Result<Vec<Service>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| tables.services.get(id).cloned())
            .collect())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.tables.lock().unwrap().bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| filter.barber_id.map_or(true, |id| b.barber_id == id))
            .filter(|b| filter.status.as_deref().map_or(true, |s| b.status == s))
            .filter(|b| {
                filter
                    .window
                    .map_or(true, |(start, end)| b.booking_time >= start && b.booking_time < end)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.booking_time.cmp(&b.booking_time).then(a.id.cmp(&b.id)));

        Ok(rows
            .into_iter()
            .skip(filter.page.offset as usize)
            .take(filter.page.limit as usize)
            .collect())
    }

    async fn service_links(&self, booking_ids: &[Uuid]) -> Result<Vec<(Uuid, Uuid)>, AppError> {
        let wanted: HashSet<&Uuid> = booking_ids.iter().collect();
        Ok(self
            .tables
            .lock()
            .unwrap()
            .links
            .iter()
            .filter(|(b, _)| wanted.contains(b))
            .copied()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn BookingTx>, AppError> {
        Ok(Box::new(MemoryTx {
            working: self.snapshot(),
            shared: self.tables.clone(),
            faults: self.faults.clone(),
        }))
    }
}

struct MemoryTx {
    working: Tables,
    shared: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

#[async_trait]
impl BookingTx for MemoryTx {
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        self.working.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<bool, AppError> {
        match self.working.bookings.get_mut(&booking.id) {
            Some(row) => {
                *row = booking.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn attach_services(
        &mut self,
        booking_id: Uuid,
        service_ids: &[Uuid],
        _at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.fail_attach {
                faults.fail_attach = false;
                return Err(injected("attach_services"));
            }
        }
        for service_id in service_ids {
            if !self.working.services.contains_key(service_id) {
                return Err(injected("foreign key"));
            }
            self.working.links.push((booking_id, *service_id));
        }
        Ok(())
    }

    async fn clear_services(&mut self, booking_id: Uuid) -> Result<u64, AppError> {
        if self.faults.lock().unwrap().fail_clear_for == Some(booking_id) {
            return Err(injected("clear_services"));
        }
        let before = self.working.links.len();
        self.working.links.retain(|(b, _)| *b != booking_id);
        Ok((before - self.working.links.len()) as u64)
    }

    async fn delete_booking(&mut self, booking_id: Uuid) -> Result<bool, AppError> {
        Ok(self.working.bookings.remove(&booking_id).is_some())
    }

    async fn guest_booking_ids(&mut self, guest_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .working
            .bookings
            .values()
            .filter(|b| b.guest_id == guest_id)
            .map(|b| b.id)
            .collect())
    }

    async fn delete_guest_bookings(&mut self, guest_id: Uuid) -> Result<u64, AppError> {
        let before = self.working.bookings.len();
        self.working.bookings.retain(|_, b| b.guest_id != guest_id);
        Ok((before - self.working.bookings.len()) as u64)
    }

    async fn lock_user(&mut self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.working.users.contains_key(&user_id))
    }

    async fn barber_booking_count(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .working
            .bookings
            .values()
            .filter(|b| b.barber_id == user_id)
            .count() as i64)
    }

    async fn purge_user(&mut self, user_id: Uuid) -> Result<(), AppError> {
        if self.faults.lock().unwrap().fail_purge_for == Some(user_id) {
            return Err(injected("purge_user"));
        }
        self.working.users.remove(&user_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx {
            working, shared, ..
        } = *self;
        *shared.lock().unwrap() = working;
        Ok(())
    }
}
