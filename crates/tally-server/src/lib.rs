//! Tally Web Server
//!
//! Axum-based REST API for the Tally expense tracker, plus the background
//! scheduler that runs the daily recurrence sweep.
//!
//! Security features:
//! - Cloudflare Access authentication (secure by default, use --no-auth for local dev)
//! - Owner checks on every write
//! - Restrictive CORS policy
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::{Clock, Database, SystemClock, TallyConfig, DEFAULT_PALETTE};

mod handlers;
mod scheduler;

pub use scheduler::{
    delay_until_next_run, next_run_after, start_recurrence_scheduler, RecurrenceScheduleConfig,
    SchedulerHandle,
};

/// Maximum accepted JSON body size (16 KB)
pub const MAX_BODY_SIZE: usize = 16 * 1024;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Identity used when authentication is disabled and no header is present
pub const LOCAL_DEV_USER: &str = "local-dev";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Colors for the analytics category breakdown
    pub palette: Vec<String>,
    /// Source of "today" for new transactions and analytics windows
    pub clock: Arc<dyn Clock>,
}

/// Authentication middleware - requires the Cloudflare Access user header
///
/// The header is trusted only behind Cloudflare Tunnel, which strips and
/// rewrites CF headers. With `require_auth` off every request passes and
/// unauthenticated callers act as `local-dev`.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    if let Some(user) = header_user(request.headers()) {
        tracing::debug!(user = %user, path = %request.uri().path(), "Authenticated via Cloudflare Access header");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

fn header_user(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Identity of the caller: the CF Access email, or "local-dev" when absent
pub fn current_user_id(headers: &axum::http::HeaderMap) -> String {
    header_user(headers)
        .map(str::to_string)
        .unwrap_or_else(|| LOCAL_DEV_USER.to_string())
}

/// Create the application router
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let palette = DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect();
    create_router_with_options(db, config, Arc::new(SystemClock), palette)
}

/// Create the application router with an explicit clock and palette (for testing)
pub fn create_router_with_options(
    db: Database,
    config: ServerConfig,
    clock: Arc<dyn Clock>,
    palette: Vec<String>,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        palette,
        clock,
    });

    let api_routes = Router::new()
        // Auth
        .route("/me", get(handlers::get_me))
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/analytics", get(handlers::get_analytics))
        .route(
            "/transactions/:id",
            patch(handlers::update_transaction).delete(handlers::delete_transaction),
        );

    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server and the recurrence scheduler; stop both on Ctrl-C
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
    tally: TallyConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    }

    let schedule = RecurrenceScheduleConfig::from_config(&tally.recurrence)?.with_env_overrides();
    let scheduler = if schedule.enabled {
        Some(start_recurrence_scheduler(db.clone(), schedule))
    } else {
        info!("Recurrence scheduler disabled");
        None
    };

    let app = create_router_with_options(db, config, Arc::new(SystemClock), tally.analytics.palette);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Caller mistakes carry a safe message; everything else is internal
        if let Some(core) = err.downcast_ref::<tally_core::Error>() {
            match core {
                tally_core::Error::InvalidData(msg) => return Self::bad_request(msg),
                tally_core::Error::NotFound(msg) => return Self::not_found(&format!("Not found: {}", msg)),
                tally_core::Error::Forbidden(msg) => return Self::forbidden(&format!("Forbidden: {}", msg)),
                tally_core::Error::Conflict(msg) => return Self::conflict(&format!("Conflict: {}", msg)),
                _ => {}
            }
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
