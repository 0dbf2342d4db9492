//! Read-only admin API over the guards' tables.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::guard::{ConnectionGuard, RequestGuard};

#[derive(Clone)]
pub struct AdminState {
    pub connections: Arc<ConnectionGuard>,
    pub requests: Arc<RequestGuard>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/connections", get(get_connections))
        .route("/admin/blacklist", get(get_blacklist))
        .route("/admin/requests", get(get_requests))
        .route("/admin/user-agents", get(get_user_agents))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Admin API listening");
    }
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionGuardConfig, RequestGuardConfig};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::net::IpAddr;
    use tower::ServiceExt;

    fn state() -> AdminState {
        AdminState {
            connections: Arc::new(ConnectionGuard::new(ConnectionGuardConfig::default())),
            requests: Arc::new(RequestGuard::new(RequestGuardConfig::default())),
            api_key: Arc::from("test-key"),
            started_at: Instant::now(),
        }
    }

    fn get(path: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let app = setup_admin_router(state());

        let res = app.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app.oneshot(get("/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reports_guard_tables() {
        let state = state();
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        assert!(state.connections.try_admit(ip, true));
        assert!(state.requests.try_admit(ip, "curl/8.4.0"));
        assert!(state.requests.try_admit(ip, "curl/8.4.0"));
        let app = setup_admin_router(state);

        let res = app.clone().oneshot(get("/admin/connections", Some("test-key"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["tracked_sources"], 1);
        assert_eq!(body["active_connections"], 1);

        let res = app.clone().oneshot(get("/admin/requests", Some("test-key"))).await.unwrap();
        assert_eq!(json(res).await["tracked_user_agents"], 1);

        let res = app.clone().oneshot(get("/admin/user-agents?limit=5", Some("test-key"))).await.unwrap();
        let body = json(res).await;
        assert_eq!(body[0]["user_agent"], "curl/8.4.0");
        assert_eq!(body[0]["count"], 2);

        let res = app.oneshot(get("/admin/blacklist", Some("test-key"))).await.unwrap();
        assert_eq!(json(res).await, serde_json::json!([]));
    }
}
