//! Webhook receiver HTTP server.
//!
//! Accepts GitHub webhook deliveries, verifies the HMAC signature over the
//! raw request body, and dispatches to the event processors. Handlers
//! enqueue jobs and return quickly; a `202` only means "accepted", not
//! "indexed".
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/webhooks/github` | Receive a webhook delivery |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Signature Verification
//!
//! The `X-Hub-Signature-256` header carries `sha256=<hex>` computed over the
//! raw body with the shared secret. Verification is constant-time and
//! fail-closed: with no secret configured, every delivery is rejected.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "unparseable push payload" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401),
//! `not_configured` (503), `internal` (500).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::jobs::OutboxBus;
use crate::webhook::{
    PullRequestPayload, PushPayload, ReleasePayload, RepositoryPayload, WebhookProcessor,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    processor: Arc<WebhookProcessor>,
    /// Shared webhook secret, resolved from the environment at startup.
    /// `None` means verification cannot succeed and deliveries are rejected.
    secret: Option<Arc<String>>,
}

/// Starts the webhook receiver.
///
/// Binds to `[server].bind` and runs until the process is terminated. Jobs
/// produced by the handlers land in the outbox table backed by `pool`.
pub async fn run_server(config: &Config, pool: SqlitePool) -> anyhow::Result<()> {
    let secret = std::env::var(&config.server.webhook_secret_env)
        .ok()
        .map(Arc::new);
    if secret.is_none() {
        error!(
            env = %config.server.webhook_secret_env,
            "webhook secret not set; all deliveries will be rejected"
        );
    }

    let processor = Arc::new(WebhookProcessor::new(
        pool.clone(),
        Arc::new(OutboxBus::new(pool)),
    ));

    let state = AppState { processor, secret };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/webhooks/github", post(handle_webhook))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Webhook server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn not_configured(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "not_configured".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /webhooks/github ============

#[derive(Serialize)]
struct AcceptedResponse {
    status: String,
    event: String,
}

/// Handler for `POST /webhooks/github`.
///
/// Verifies the delivery signature against the raw body, then dispatches on
/// the `X-GitHub-Event` header. Unknown event types are accepted and
/// ignored so new upstream events never cause redelivery storms.
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    let secret = state
        .secret
        .as_ref()
        .ok_or_else(|| not_configured("webhook secret not configured"))?;

    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing X-Hub-Signature-256 header"))?;

    if !verify_signature(secret, &body, signature) {
        return Err(unauthorized("signature verification failed"));
    }

    let event = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    info!(event = %event, "webhook delivery received");

    match event.as_str() {
        "push" => {
            let payload: PushPayload = serde_json::from_slice(&body)
                .map_err(|e| bad_request(format!("unparseable push payload: {}", e)))?;
            state
                .processor
                .handle_push_event(&payload)
                .await
                .map_err(|e| internal(e.to_string()))?;
        }
        "pull_request" => {
            let payload: PullRequestPayload = serde_json::from_slice(&body)
                .map_err(|e| bad_request(format!("unparseable pull_request payload: {}", e)))?;
            state
                .processor
                .handle_pull_request_event(&payload)
                .await
                .map_err(|e| internal(e.to_string()))?;
        }
        "repository" => {
            let payload: RepositoryPayload = serde_json::from_slice(&body)
                .map_err(|e| bad_request(format!("unparseable repository payload: {}", e)))?;
            state
                .processor
                .handle_repository_event(&payload)
                .await
                .map_err(|e| internal(e.to_string()))?;
        }
        "release" => {
            let payload: ReleasePayload = serde_json::from_slice(&body)
                .map_err(|e| bad_request(format!("unparseable release payload: {}", e)))?;
            state
                .processor
                .handle_release_event(&payload)
                .await
                .map_err(|e| internal(e.to_string()))?;
        }
        other => {
            debug!(event = %other, "unhandled event type, accepting without action");
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".to_string(),
            event,
        }),
    ))
}

/// Verify an `X-Hub-Signature-256` header value against the raw body.
///
/// Constant-time comparison via the MAC verifier. Any malformed header
/// (wrong prefix, bad hex) fails verification.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_digest) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let header = sign("topsecret", body);
        assert!(verify_signature("topsecret", body, &header));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"payload";
        let header = sign("topsecret", body);
        assert!(!verify_signature("othersecret", body, &header));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign("topsecret", b"payload");
        assert!(!verify_signature("topsecret", b"payload2", &header));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let body = b"payload";
        assert!(!verify_signature("topsecret", body, "sha1=abcdef"));
        assert!(!verify_signature("topsecret", body, "sha256=not-hex"));
        assert!(!verify_signature("topsecret", body, ""));
    }
}
