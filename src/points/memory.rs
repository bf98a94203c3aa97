//! In-memory [`PointStore`] for tests; transactions commit by replacing the
//! shared tables with their working copy.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{PointStore, PointTx};
use crate::error::AppError;
use crate::model::point::Point;
use crate::model::user::User;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    points: Vec<Point>,
}

impl Tables {
    fn user_by_phone(&self, phone: &str) -> Option<User> {
        self.users.iter().find(|u| u.phone == phone).cloned()
    }

    fn latest_points(&self, user_id: Uuid) -> Option<i64> {
        self.points
            .iter()
            .filter(|p| p.user_id == user_id)
            .max_by_key(|p| p.created_at)
            .map(|p| p.points)
    }
}

#[derive(Default)]
pub struct MemoryPointStore {
    tables: Arc<Mutex<Tables>>,
    fail_insert: Arc<Mutex<bool>>,
}

impl MemoryPointStore {
    pub fn add_user(&self, name: &str, phone: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
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
        self.tables.lock().unwrap().users.push(user.clone());
        user
    }

    /// Stores a snapshot written `minutes_ago`.
    pub fn add_snapshot(&self, user_id: Uuid, points: i64, minutes_ago: i64) -> Point {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        let point = Point {
            id: Uuid::new_v4(),
            user_id,
            points,
            description: String::new(),
            created_at: at,
            updated_at: at,
        };
        self.tables.lock().unwrap().points.push(point.clone());
        point
    }

    pub fn ledger(&self, user_id: Uuid) -> Vec<Point> {
        self.tables
            .lock()
            .unwrap()
            .points
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn fail_next_insert(&self) {
        *self.fail_insert.lock().unwrap() = true;
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().unwrap().user_by_phone(phone))
    }

    async fn latest_points(&self, user_id: Uuid) -> Result<Option<i64>, AppError> {
        Ok(self.tables.lock().unwrap().latest_points(user_id))
    }

    async fn begin(&self) -> Result<Box<dyn PointTx>, AppError> {
        let working = self.tables.lock().unwrap().clone();
        Ok(Box::new(MemoryPointTx {
            working,
            shared: self.tables.clone(),
            fail_insert: self.fail_insert.clone(),
        }))
    }
}

struct MemoryPointTx {
    working: Tables,
    shared: Arc<Mutex<Tables>>,
    fail_insert: Arc<Mutex<bool>>,
}

#[async_trait]
impl PointTx for MemoryPointTx {
    async fn lock_user_by_phone(&mut self, phone: &str) -> Result<Option<User>, AppError> {
        Ok(self.working.user_by_phone(phone))
    }

    async fn latest_points(&mut self, user_id: Uuid) -> Result<Option<i64>, AppError> {
        Ok(self.working.latest_points(user_id))
    }

    async fn insert_point(&mut self, point: &Point) -> Result<(), AppError> {
        {
            let mut fail = self.fail_insert.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(AppError::Store(sqlx::Error::Protocol(
                    "injected failure: insert_point".to_string(),
                )));
            }
        }
        self.working.points.push(point.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryPointTx {
            working, shared, ..
        } = *self;
        *shared.lock().unwrap() = working;
        Ok(())
    }
}
