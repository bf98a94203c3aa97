//! Loyalty point ledger.
//!
//! Every write appends a snapshot row holding the balance after that write,
//! so the current balance is the newest row of a user, never a sum. Writes
//! for one user run inside a store transaction that holds the user row lock.

mod postgres;

#[cfg(test)]
pub(crate) mod memory;

pub use postgres::PgPointStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::point::{
    redeemed_balance, CreatePointRequest, Point, PointBalance, RedeemPointRequest,
};
use crate::model::user::{check_phone, User};

#[async_trait]
pub trait PointStore: Send + Sync {
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError>;

    /// Points of the newest snapshot, `None` for an empty ledger.
    async fn latest_points(&self, user_id: Uuid) -> Result<Option<i64>, AppError>;

    async fn begin(&self) -> Result<Box<dyn PointTx>, AppError>;
}

#[async_trait]
pub trait PointTx: Send {
    /// Finds the user and locks the row until the transaction ends.
    async fn lock_user_by_phone(&mut self, phone: &str) -> Result<Option<User>, AppError>;

    async fn latest_points(&mut self, user_id: Uuid) -> Result<Option<i64>, AppError>;

    async fn insert_point(&mut self, point: &Point) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

fn no_user(phone: &str) -> AppError {
    AppError::NotFound(format!("No user with phone {phone}"))
}

fn snapshot(user_id: Uuid, points: i64, description: String) -> Point {
    let now = Utc::now();
    Point {
        id: Uuid::new_v4(),
        user_id,
        points,
        description,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Clone)]
pub struct PointLedger {
    store: Arc<dyn PointStore>,
}

impl PointLedger {
    pub fn new(store: Arc<dyn PointStore>) -> Self {
        Self { store }
    }

    /// Appends a snapshot with the given balance.
    pub async fn record(&self, req: CreatePointRequest) -> Result<Point, AppError> {
        check_phone(&req.phone)?;
        if req.points < 0 {
            return Err(AppError::Validation("points must not be negative".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let user = tx
            .lock_user_by_phone(&req.phone)
            .await?
            .ok_or_else(|| no_user(&req.phone))?;
        let point = snapshot(user.id, req.points, req.description);
        tx.insert_point(&point).await?;
        tx.commit().await?;

        info!(user_id = %user.id, points = point.points, "Points recorded");
        Ok(point)
    }

    /// Spends `amount` from the newest snapshot; the balance stops at zero.
    pub async fn redeem(&self, req: RedeemPointRequest) -> Result<Point, AppError> {
        check_phone(&req.phone)?;
        if req.amount < 0 {
            return Err(AppError::Validation("amount must not be negative".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let user = tx
            .lock_user_by_phone(&req.phone)
            .await?
            .ok_or_else(|| no_user(&req.phone))?;
        let balance = tx.latest_points(user.id).await?.unwrap_or(0);
        let remaining = redeemed_balance(balance, req.amount);
        let point = snapshot(user.id, remaining, req.description);
        tx.insert_point(&point).await?;
        tx.commit().await?;

        info!(
            user_id = %user.id,
            before = balance,
            after = remaining,
            "Points redeemed"
        );
        Ok(point)
    }

    pub async fn balance(&self, phone: &str) -> Result<PointBalance, AppError> {
        let user = self
            .store
            .find_user_by_phone(phone)
            .await?
            .ok_or_else(|| no_user(phone))?;
        let points = self.store.latest_points(user.id).await?.unwrap_or(0);
        Ok(PointBalance {
            user_id: user.id,
            phone: user.phone,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryPointStore;
    use super::*;

    fn ledger() -> (Arc<MemoryPointStore>, PointLedger) {
        let store = Arc::new(MemoryPointStore::default());
        let ledger = PointLedger::new(store.clone());
        (store, ledger)
    }

    fn redeem(phone: &str, amount: i64) -> RedeemPointRequest {
        RedeemPointRequest {
            phone: phone.to_string(),
            amount,
            description: "redeem".to_string(),
        }
    }

    #[tokio::test]
    async fn test_balance_is_newest_snapshot_not_sum() {
        let (store, ledger) = ledger();
        let user = store.add_user("Dimas", "0822");
        store.add_snapshot(user.id, 50, 30);
        store.add_snapshot(user.id, 80, 1);
        store.add_snapshot(user.id, 70, 10);

        let balance = ledger.balance("0822").await.unwrap();
        assert_eq!(balance.points, 80);
        assert_eq!(balance.user_id, user.id);
    }

    #[tokio::test]
    async fn test_balance_of_empty_ledger_is_zero() {
        let (store, ledger) = ledger();
        store.add_user("Dimas", "0822");
        assert_eq!(ledger.balance("0822").await.unwrap().points, 0);
    }

    #[tokio::test]
    async fn test_balance_unknown_phone() {
        let (_, ledger) = ledger();
        let err = ledger.balance("0999").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_redeem_spends_from_newest_snapshot() {
        let (store, ledger) = ledger();
        let user = store.add_user("Dimas", "0822");
        store.add_snapshot(user.id, 200, 60);
        store.add_snapshot(user.id, 120, 5);

        let point = ledger.redeem(redeem("0822", 20)).await.unwrap();

        assert_eq!(point.points, 100);
        assert_eq!(store.ledger(user.id).len(), 3);
        assert_eq!(ledger.balance("0822").await.unwrap().points, 100);
    }

    #[tokio::test]
    async fn test_redeem_never_goes_negative() {
        let (store, ledger) = ledger();
        let user = store.add_user("Dimas", "0822");
        store.add_snapshot(user.id, 30, 5);

        let point = ledger.redeem(redeem("0822", 50)).await.unwrap();
        assert_eq!(point.points, 0);

        let again = ledger.redeem(redeem("0822", 10)).await.unwrap();
        assert_eq!(again.points, 0);
    }

    #[tokio::test]
    async fn test_record_appends_snapshot() {
        let (store, ledger) = ledger();
        let user = store.add_user("Dimas", "0822");
        store.add_snapshot(user.id, 10, 5);

        let point = ledger
            .record(CreatePointRequest {
                phone: "0822".to_string(),
                points: 45,
                description: "visit".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(point.user_id, user.id);
        assert_eq!(store.ledger(user.id).len(), 2);
        assert_eq!(ledger.balance("0822").await.unwrap().points, 45);
    }

    #[tokio::test]
    async fn test_record_rejects_bad_input() {
        let (store, ledger) = ledger();
        store.add_user("Dimas", "0822");

        let overlong = ledger
            .record(CreatePointRequest {
                phone: "081234567890".to_string(),
                points: 10,
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(overlong, AppError::Validation(_)));

        let negative = ledger
            .record(CreatePointRequest {
                phone: "0822".to_string(),
                points: -1,
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(negative, AppError::Validation(_)));

        let unknown = ledger
            .record(CreatePointRequest {
                phone: "0999".to_string(),
                points: 10,
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(unknown, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_ledger_untouched() {
        let (store, ledger) = ledger();
        let user = store.add_user("Dimas", "0822");
        store.add_snapshot(user.id, 40, 5);
        store.fail_next_insert();

        let err = ledger.redeem(redeem("0822", 10)).await.unwrap_err();

        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(store.ledger(user.id).len(), 1);
        assert_eq!(ledger.balance("0822").await.unwrap().points, 40);
    }
}
