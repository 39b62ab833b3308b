//! Typed repository ports for Pulsar aggregates.
//!
//! Each aggregate gets an explicit `async_trait` port; there is no generic
//! ORM surface. Listing methods accept a filter struct and return the total
//! count separately for pagination. Backends implement every port and are
//! bundled into [`Repositories`] for dependency injection.

pub mod alerts;
pub mod audit;
pub mod directory;
pub mod error;
pub mod escalation;
pub mod filter;
pub mod locks;
pub mod notify;
pub mod routing;
pub mod schedules;
pub mod webhooks;

use std::sync::Arc;

pub use alerts::AlertRepo;
pub use audit::AuditRepo;
pub use directory::{OrgRepo, TeamRepo, UserRepo};
pub use error::StoreError;
pub use escalation::{EscalationEventRepo, PolicyRepo};
pub use filter::{AlertFilter, AuditFilter, DeliveryFilter, NotificationFilter, Page, PageRequest};
pub use locks::AlertLocks;
pub use notify::{ChannelRepo, DndRepo, NotificationRepo};
pub use routing::RoutingRuleRepo;
pub use schedules::ScheduleRepo;
pub use webhooks::{DeliveryRepo, EndpointRepo, TokenRepo};

/// The full set of repository ports plus the per-alert lock registry,
/// passed as one dependency bundle to services and workers.
#[derive(Clone)]
pub struct Repositories {
    pub orgs: Arc<dyn OrgRepo>,
    pub users: Arc<dyn UserRepo>,
    pub teams: Arc<dyn TeamRepo>,
    pub alerts: Arc<dyn AlertRepo>,
    pub schedules: Arc<dyn ScheduleRepo>,
    pub policies: Arc<dyn PolicyRepo>,
    pub escalation_events: Arc<dyn EscalationEventRepo>,
    pub routing_rules: Arc<dyn RoutingRuleRepo>,
    pub channels: Arc<dyn ChannelRepo>,
    pub dnd: Arc<dyn DndRepo>,
    pub notifications: Arc<dyn NotificationRepo>,
    pub endpoints: Arc<dyn EndpointRepo>,
    pub deliveries: Arc<dyn DeliveryRepo>,
    pub tokens: Arc<dyn TokenRepo>,
    pub audit: Arc<dyn AuditRepo>,
    pub alert_locks: Arc<AlertLocks>,
}
