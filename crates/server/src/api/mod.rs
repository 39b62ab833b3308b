pub mod alerts;
pub mod channels;
pub mod health;
pub mod ingest;
pub mod logs;
pub mod policies;
pub mod routing_rules;
pub mod schedules;
pub mod teams;
pub mod users;
pub mod webhooks;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use pulsar_bus::EventBus;
use pulsar_engine::{AlertService, Clock};
use pulsar_oncall::OnCallResolver;
use pulsar_store::Repositories;

use crate::auth::{AuthProvider, CallerIdentity};
use crate::auth::middleware::require_auth;
use crate::config::CorsConfig;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub service: Arc<AlertService>,
    pub resolver: Arc<OnCallResolver>,
    pub bus: Arc<EventBus>,
    pub auth: Arc<AuthProvider>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// The current instant from the injected clock.
    #[must_use]
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}

/// `GET /api/v1/auth/me` -- echo the authenticated caller.
async fn me(
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "organization_id": identity.organization_id,
        "user_id": identity.user_id,
        "auth_method": identity.auth_method,
    }))
}

/// Build the router: public health and token-gated ingestion, everything
/// else behind the auth layer under `/api/v1`.
pub fn router(state: AppState, cors: &CorsConfig) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/webhook/{token}", post(ingest::receive));

    let protected = Router::new()
        // Alerts
        .route("/alerts", get(alerts::list).post(alerts::create))
        .route(
            "/alerts/{id}",
            get(alerts::get_one)
                .patch(alerts::patch)
                .delete(alerts::delete_one),
        )
        .route("/alerts/{id}/acknowledge", post(alerts::acknowledge))
        .route("/alerts/{id}/close", post(alerts::close))
        .route("/alerts/{id}/snooze", post(alerts::snooze))
        .route("/alerts/{id}/assign", post(alerts::assign))
        // Users (directory records; credential flows are external)
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{id}",
            get(users::get_one).put(users::update).delete(users::delete_one),
        )
        // Teams
        .route("/teams", get(teams::list).post(teams::create))
        .route(
            "/teams/{id}",
            get(teams::get_one).put(teams::update).delete(teams::delete_one),
        )
        // Schedules, rotations, overrides, on-call query
        .route("/schedules", get(schedules::list).post(schedules::create))
        .route(
            "/schedules/{id}",
            get(schedules::get_one)
                .put(schedules::update)
                .delete(schedules::delete_one),
        )
        .route(
            "/schedules/{id}/rotations",
            get(schedules::list_rotations).post(schedules::add_rotation),
        )
        .route(
            "/schedules/{id}/rotations/{rotation_id}",
            delete(schedules::remove_rotation),
        )
        .route(
            "/schedules/{id}/overrides",
            get(schedules::list_overrides).post(schedules::add_override),
        )
        .route(
            "/schedules/{id}/overrides/{override_id}",
            delete(schedules::remove_override),
        )
        .route("/schedules/{id}/oncall", get(schedules::oncall))
        // Escalation policies and rules
        .route(
            "/escalation-policies",
            get(policies::list).post(policies::create),
        )
        .route(
            "/escalation-policies/{id}",
            get(policies::get_one)
                .put(policies::update)
                .delete(policies::delete_one),
        )
        .route(
            "/escalation-policies/{id}/rules",
            get(policies::list_rules).post(policies::upsert_rule),
        )
        .route(
            "/escalation-policies/{id}/rules/{rule_id}",
            delete(policies::remove_rule),
        )
        // Routing rules
        .route(
            "/routing-rules",
            get(routing_rules::list).post(routing_rules::create),
        )
        .route(
            "/routing-rules/{id}",
            get(routing_rules::get_one)
                .put(routing_rules::update)
                .delete(routing_rules::delete_one),
        )
        // Notification channels & DND
        .route("/channels", get(channels::list).post(channels::create))
        .route(
            "/channels/{id}",
            put(channels::update).delete(channels::delete_one),
        )
        .route(
            "/users/{id}/dnd",
            get(channels::get_dnd)
                .put(channels::put_dnd)
                .delete(channels::delete_dnd),
        )
        // Outgoing webhooks & incoming tokens
        .route("/webhooks", get(webhooks::list).post(webhooks::create))
        .route(
            "/webhooks/{id}",
            get(webhooks::get_one)
                .put(webhooks::update)
                .delete(webhooks::delete_one),
        )
        .route("/webhooks/{id}/deliveries", get(webhooks::list_deliveries))
        .route(
            "/webhooks/{id}/deliveries/{delivery_id}/redeliver",
            post(webhooks::redeliver),
        )
        .route(
            "/webhook-tokens",
            get(webhooks::list_tokens).post(webhooks::create_token),
        )
        .route("/webhook-tokens/{id}", delete(webhooks::delete_token))
        // Logs
        .route("/notifications", get(logs::notifications))
        .route("/audit", get(logs::audit))
        // Caller identity
        .route("/auth/me", get(me))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Live updates, behind the same auth layer.
    let realtime = Router::new()
        .route("/ws", get(ws::upgrade))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(realtime)
        .nest("/api/v1", protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
