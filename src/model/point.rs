use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One ledger snapshot. `points` is the balance at the time the row was
/// written, so the current balance is the newest row, never a sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Point {
    pub id: Uuid,
    pub user_id: Uuid,
    pub points: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePointRequest {
    pub phone: String,
    pub points: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemPointRequest {
    pub phone: String,
    pub amount: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePointRequest {
    pub points: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PointBalance {
    pub user_id: Uuid,
    pub phone: String,
    pub points: i64,
}

/// Balance left after spending `amount` out of `balance`, floored at zero.
pub fn redeemed_balance(balance: i64, amount: i64) -> i64 {
    balance.saturating_sub(amount).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeem_subtracts() {
        assert_eq!(redeemed_balance(120, 20), 100);
    }

    #[test]
    fn test_redeem_floors_at_zero() {
        assert_eq!(redeemed_balance(30, 50), 0);
        assert_eq!(redeemed_balance(0, i64::MAX), 0);
    }
}
