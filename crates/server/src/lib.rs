//! HTTP/WebSocket presentation and assembly for the Pulsar platform.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use pulsar_bus::EventBus;
use pulsar_engine::{
    AlertService, BackgroundConfig, Clock, EscalationEngine, EventEmitter, FanOut, LogSink,
    SystemClock, Workers,
};
use pulsar_oncall::OnCallResolver;
use pulsar_routing::RoutingEngine;
use pulsar_store::Repositories;
use pulsar_store_memory::memory_repositories;
use pulsar_webhook::{WebhookWorker, WorkerConfig};

pub use api::{AppState, router};
pub use config::PulsarConfig;

/// Maximum due escalation records processed per tick.
const ESCALATION_BATCH: usize = 200;

/// Wire the full engine stack over a repository bundle.
///
/// Returns the shared handler state and the background workers, ready to
/// spawn. Callers that need a fake clock (tests, simulations) pass their
/// own; production passes [`SystemClock`].
#[must_use]
pub fn build_with(
    config: &PulsarConfig,
    repos: Repositories,
    clock: Arc<dyn Clock>,
) -> (AppState, Workers) {
    let bus = Arc::new(EventBus::default());
    let emitter = Arc::new(EventEmitter::new(
        Arc::clone(&bus),
        Arc::clone(&repos.endpoints),
        Arc::clone(&repos.deliveries),
    ));
    let fanout = FanOut::new(
        Arc::clone(&repos.users),
        Arc::clone(&repos.teams),
        Arc::clone(&repos.dnd),
        Arc::clone(&repos.channels),
        Arc::clone(&repos.notifications),
        OnCallResolver::new(Arc::clone(&repos.schedules)),
        Arc::new(LogSink),
    );
    let escalation = Arc::new(EscalationEngine::new(
        repos.clone(),
        fanout,
        Arc::clone(&emitter),
        ESCALATION_BATCH,
    ));
    let service = Arc::new(AlertService::new(
        repos.clone(),
        RoutingEngine::new(Arc::clone(&repos.routing_rules)),
        Arc::clone(&escalation),
        emitter,
        Arc::clone(&clock),
    ));
    let webhook_worker = Arc::new(WebhookWorker::new(
        Arc::clone(&repos.deliveries),
        Arc::clone(&repos.endpoints),
        WorkerConfig {
            batch_size: config.workers.webhook_batch_size,
            concurrency: config.workers.webhook_concurrency,
        },
    ));
    let workers = Workers::new(
        Arc::clone(&escalation),
        webhook_worker,
        Arc::clone(&clock),
        BackgroundConfig {
            escalation_tick: Duration::from_secs(config.workers.escalation_tick_seconds),
            webhook_tick: Duration::from_secs(config.workers.webhook_tick_seconds),
        },
    );

    let state = AppState {
        resolver: Arc::new(OnCallResolver::new(Arc::clone(&repos.schedules))),
        repos,
        service,
        bus,
        auth: Arc::new(auth::AuthProvider::from_config(&config.auth)),
        clock,
    };
    (state, workers)
}

/// Production assembly: in-memory repository bundle and the system clock.
#[must_use]
pub fn build(config: &PulsarConfig) -> (AppState, Workers) {
    build_with(config, memory_repositories(), Arc::new(SystemClock))
}
