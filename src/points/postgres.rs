use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{PointStore, PointTx};
use crate::error::AppError;
use crate::model::point::Point;
use crate::model::user::{User, USER_COLUMNS};

const LATEST_POINTS: &str =
    "SELECT points FROM points WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1";

pub struct PgPointStore {
    pool: PgPool,
}

impl PgPointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PointStore for PgPointStore {
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn latest_points(&self, user_id: Uuid) -> Result<Option<i64>, AppError> {
        let row = sqlx::query_as::<_, (i64,)>(LATEST_POINTS)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(points,)| points))
    }

    async fn begin(&self) -> Result<Box<dyn PointTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPointTx { tx }))
    }
}

struct PgPointTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PointTx for PgPointTx {
    async fn lock_user_by_phone(&mut self, phone: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1 FOR UPDATE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(phone)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn latest_points(&mut self, user_id: Uuid) -> Result<Option<i64>, AppError> {
        let row = sqlx::query_as::<_, (i64,)>(LATEST_POINTS)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|(points,)| points))
    }

    async fn insert_point(&mut self, point: &Point) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO points (id, user_id, points, description, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(point.id)
        .bind(point.user_id)
        .bind(point.points)
        .bind(&point.description)
        .bind(point.created_at)
        .bind(point.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let PgPointTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
