pub mod bookings;
pub mod points;
pub mod products;
pub mod reminds;
pub mod services;
pub mod users;

use axum::{http::StatusCode, response::Json as RespJson, routing::get, Router};
use serde::Serialize;
use serde_json::{json, Value};

/// `{ "status": "success", "data": ... }`
pub fn success<T: Serialize>(data: T) -> RespJson<Value> {
    RespJson(json!({
        "status": "success",
        "data": data,
    }))
}

/// Same envelope as [`success`] with the item count under `results`.
pub fn success_list<T: Serialize>(items: Vec<T>) -> RespJson<Value> {
    RespJson(json!({
        "status": "success",
        "results": items.len(),
        "data": items,
    }))
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, RespJson<Value>) {
    (StatusCode::CREATED, success(data))
}

// Health check
async fn health_checker() -> RespJson<Value> {
    RespJson(json!({
        "status": "success",
        "message": "Barbershop booking API is up",
    }))
}

/// Every JSON route of the API, without state or outer layers.
pub fn api_router() -> Router {
    Router::new()
        .route("/api/healthchecker", get(health_checker))
        .nest("/api/bookings", bookings::bookings_router())
        .nest("/api/services", services::services_router())
        .nest("/api/users", users::users_router())
        .nest("/api/points", points::points_router())
        .nest("/api/products", products::products_router())
        .nest("/api/reminds", reminds::reminds_router())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::Request, response::Response, Extension, Router};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::bookings::{memory::MemoryBookingStore, BookingManager};
    use crate::error::AppError;
    use crate::model::user::User;
    use crate::points::{memory::MemoryPointStore, PointLedger};
    use crate::reminder::{LogMailer, ReminderScheduler, UserDirectory};
    use crate::state::AppState;

    struct NoUsers;

    #[async_trait]
    impl UserDirectory for NoUsers {
        async fn list_all_users(&self, _limit: i64) -> Result<Vec<User>, AppError> {
            Ok(Vec::new())
        }
    }

    /// State backed by the in-memory stores. The pool never connects, so
    /// only routes that stay off Postgres can be driven with it.
    pub fn state(store: Arc<MemoryBookingStore>) -> AppState {
        state_with(store, Arc::new(MemoryPointStore::default()))
    }

    pub fn state_with(store: Arc<MemoryBookingStore>, points: Arc<MemoryPointStore>) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/barbershop_test")
            .unwrap();
        AppState {
            pool,
            bookings: BookingManager::new(store),
            points: PointLedger::new(points),
            reminder: Arc::new(ReminderScheduler::new(Arc::new(NoUsers), Arc::new(LogMailer), 100)),
        }
    }

    pub async fn send(router: Router, state: AppState, request: Request<Body>) -> Response {
        router.layer(Extension(state)).oneshot(request).await.unwrap()
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use super::testing;
    use super::*;
    use crate::bookings::memory::MemoryBookingStore;

    #[tokio::test]
    async fn test_health_checker() {
        let state = testing::state(Arc::new(MemoryBookingStore::default()));
        let response = testing::send(
            api_router(),
            state,
            testing::empty_request("GET", "/api/healthchecker"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = testing::body_json(response).await;
        assert_eq!(body["status"], "success");
    }

    #[test]
    fn test_success_list_counts_results() {
        let RespJson(body) = success_list(vec![1, 2, 3]);
        assert_eq!(body["results"], 3);
        assert_eq!(body["data"], json!([1, 2, 3]));
    }
}
