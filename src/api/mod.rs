//! HTTP trigger endpoint
//!
//! Players and other tools post key notifications here; valid ones are queued
//! for the event router.
//! Default port: 8000

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::router::{RemoteEvent, RemoteTrigger};

/// Shared state for API handlers
pub struct ApiState {
    /// Queue drained by the event router
    pub triggers: mpsc::Sender<RemoteTrigger>,
}

/// API error response
#[derive(Debug, Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn bad_request(error: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: error.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", post(receive_message))
        .route("/api/health", get(health_check))
        .with_state(state)
}

/// POST / - Key notification
async fn receive_message(
    State(state): State<Arc<ApiState>>,
    Json(event): Json<RemoteEvent>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let trigger = match event.into_trigger() {
        Ok(Some(trigger)) => trigger,
        Ok(None) => {
            debug!("System notification ignored");
            return Ok(Json(serde_json::json!({ "status": "success" })));
        }
        Err(e) => {
            warn!("Rejected notification: {}", e);
            return Err(ApiError::bad_request(e));
        }
    };

    state.triggers.send(trigger).await.map_err(|_| ApiError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        error: "event router is not running".to_string(),
    })?;

    Ok(Json(serde_json::json!({ "status": "success" })))
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Serve the API until `shutdown` completes
pub async fn start_server(
    state: Arc<ApiState>,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid API address {}:{}", host, port))?;

    info!("Starting trigger API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::EventSource;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Router, mpsc::Receiver<RemoteTrigger>) {
        let (tx, rx) = mpsc::channel(8);
        (build_router(Arc::new(ApiState { triggers: tx })), rx)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_notification_is_queued() {
        let (app, mut rx) = app();

        let response = app
            .oneshot(post_json(r#"{"source": "user", "active": true, "key": 60}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "success");

        assert_eq!(
            rx.try_recv().unwrap(),
            RemoteTrigger { source: EventSource::User, active: true, note: 60 }
        );
    }

    #[tokio::test]
    async fn test_system_notification_accepted_not_queued() {
        let (app, mut rx) = app();

        let response = app
            .oneshot(post_json(r#"{"source": "system", "device_name": "LUMI Keys"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let (app, mut rx) = app();

        let response = app
            .oneshot(post_json(r#"{"source": "file", "active": true, "key": 300}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_router_gone_is_unavailable() {
        let (app, rx) = app();
        drop(rx);

        let response = app
            .oneshot(post_json(r#"{"source": "file", "active": false, "key": 60}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _rx) = app();
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
