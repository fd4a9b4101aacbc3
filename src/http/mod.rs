pub mod auth;
mod extract;
mod routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::Db;
use crate::error::{FollowGraphError, Result};
use crate::follow::FollowService;
use crate::query::QueryService;

pub use auth::{Authenticator, Caller, TrustedHeaderAuthenticator};

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub follow: Arc<FollowService>,
    pub query: Arc<QueryService>,
    pub db: Db,
    pub authenticator: Arc<dyn Authenticator>,
}

impl IntoResponse for FollowGraphError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

/// HTTP front for the follow graph
pub struct HttpServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

impl HttpServer {
    pub fn new(state: AppState, allowed_origins: Vec<String>) -> Self {
        Self {
            state,
            allowed_origins,
        }
    }

    /// Bind and serve until the process exits
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.create_router();
        let addr = format!("0.0.0.0:{}", port);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            FollowGraphError::Config(format!("failed to bind {}: {}", addr, e))
        })?;
        log::info!("followgraph listening on http://{}", addr);

        axum::serve(listener, app).await?;
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        // No configured origins means local use; allow any
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/users/:id/follow", post(routes::follow).delete(routes::unfollow))
            .route("/users/:id/followers", get(routes::followers))
            .route("/users/:id/following", get(routes::following))
            .route("/users/:id/mutuals", get(routes::mutuals))
            .route("/users/:id/follow-counts", get(routes::follow_counts))
            .route("/users/:id/visibility", get(routes::visibility))
            .route("/users/:id/relationship", get(routes::relationship))
            .route("/follow-requests/:id/cancel", post(routes::cancel_request))
            .route("/me/follow-requests/incoming", get(routes::incoming_requests))
            .route("/me/follow-requests/outgoing", get(routes::outgoing_requests))
            .route("/me/follow-requests/:id/accept", post(routes::accept_request))
            .route("/me/follow-requests/:id/decline", post(routes::decline_request))
            .route("/me/followers/:id", delete(routes::remove_follower))
            .route("/me/follow-counts/reconcile", post(routes::reconcile_own_counts))
            .route("/relationships/lookup", post(routes::lookup_relationships))
            .route("/health", get(handle_health))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(self.state.clone())
    }
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "followgraph",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}
