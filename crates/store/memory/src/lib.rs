//! In-memory repository backend.
//!
//! Every port is implemented on a single [`MemoryStore`] backed by
//! [`DashMap`] tables. The async trait methods never block; ordering and
//! filtering happen on materialised snapshots. Intended as the bundled
//! system-of-record for tests and single-node deployments; durable
//! backends plug in behind the same ports.

mod alerts;
mod audit;
mod directory;
mod escalation;
mod notify;
mod routing;
mod schedules;
mod webhooks;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use pulsar_core::{
    Alert, AlertId, AuditEntry, ChannelId, EscalationEvent, EscalationEventId, EscalationPolicy,
    EscalationRule, IncomingWebhookToken, NotificationChannel, NotificationRecord, NotificationId,
    OrgId, Organization, OverrideId, PolicyId, RotationId, Rotation, RoutingRule, RoutingRuleId,
    RuleId, Schedule, ScheduleId, ScheduleOverride, Team, TeamId, TokenId, User, UserDndSettings,
    UserId, WebhookDelivery, WebhookEndpoint, DeliveryId, EndpointId,
};
use pulsar_store::{AlertLocks, Repositories};

/// The shared in-memory table set behind every repository port.
#[derive(Default)]
pub struct MemoryStore {
    pub(crate) orgs: DashMap<OrgId, Organization>,
    pub(crate) users: DashMap<UserId, User>,
    pub(crate) teams: DashMap<TeamId, Team>,
    pub(crate) alerts: DashMap<AlertId, Alert>,
    pub(crate) schedules: DashMap<ScheduleId, Schedule>,
    pub(crate) rotations: DashMap<RotationId, Rotation>,
    pub(crate) overrides: DashMap<OverrideId, ScheduleOverride>,
    pub(crate) policies: DashMap<PolicyId, EscalationPolicy>,
    pub(crate) policy_rules: DashMap<RuleId, EscalationRule>,
    pub(crate) escalation_events: DashMap<EscalationEventId, EscalationEvent>,
    pub(crate) routing_rules: DashMap<RoutingRuleId, RoutingRule>,
    pub(crate) channels: DashMap<ChannelId, NotificationChannel>,
    pub(crate) dnd: DashMap<(OrgId, UserId), UserDndSettings>,
    pub(crate) notifications: DashMap<NotificationId, NotificationRecord>,
    /// Fan-out idempotency index keyed by the notification dedup key.
    pub(crate) notification_keys: DashMap<String, NotificationId>,
    pub(crate) endpoints: DashMap<EndpointId, WebhookEndpoint>,
    pub(crate) deliveries: DashMap<DeliveryId, WebhookDelivery>,
    pub(crate) tokens: DashMap<TokenId, IncomingWebhookToken>,
    /// Append-only audit trail in insertion order.
    pub(crate) audit: Mutex<Vec<AuditEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle one shared store instance into the full port set.
    #[must_use]
    pub fn into_repositories(self) -> Repositories {
        let store = Arc::new(self);
        Repositories {
            orgs: Arc::clone(&store) as _,
            users: Arc::clone(&store) as _,
            teams: Arc::clone(&store) as _,
            alerts: Arc::clone(&store) as _,
            schedules: Arc::clone(&store) as _,
            policies: Arc::clone(&store) as _,
            escalation_events: Arc::clone(&store) as _,
            routing_rules: Arc::clone(&store) as _,
            channels: Arc::clone(&store) as _,
            dnd: Arc::clone(&store) as _,
            notifications: Arc::clone(&store) as _,
            endpoints: Arc::clone(&store) as _,
            deliveries: Arc::clone(&store) as _,
            tokens: Arc::clone(&store) as _,
            audit: store as _,
            alert_locks: Arc::new(AlertLocks::new()),
        }
    }
}

/// Convenience constructor for a fresh in-memory repository bundle.
#[must_use]
pub fn memory_repositories() -> Repositories {
    MemoryStore::new().into_repositories()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulsar_core::Priority;
    use pulsar_store::{AlertFilter, AlertRepo, StoreError, UserRepo};

    #[tokio::test]
    async fn bundle_shares_one_store() {
        let repos = memory_repositories();
        let org = OrgId::generate();
        let alert = Alert::new(org, "prometheus", "disk full", Priority::P2, Utc::now());
        let id = alert.id;
        repos.alerts.create(alert).await.unwrap();
        let fetched = repos.alerts.get(org, id).await.unwrap();
        assert_eq!(fetched.message, "disk full");
    }

    #[tokio::test]
    async fn cross_tenant_get_is_not_found() {
        let repos = memory_repositories();
        let org = OrgId::generate();
        let alert = Alert::new(org, "grafana", "latency", Priority::P3, Utc::now());
        let id = alert.id;
        repos.alerts.create(alert).await.unwrap();
        let err = repos.alerts.get(OrgId::generate(), id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let repos = memory_repositories();
        let org = OrgId::generate();
        let a = User::new(org, "dup@example.com", "A", Utc::now());
        let b = User::new(org, "dup@example.com", "B", Utc::now());
        repos.users.create(a).await.unwrap();
        let err = repos.users.create(b).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn alert_list_paginates_with_total() {
        let repos = memory_repositories();
        let org = OrgId::generate();
        for i in 0..7 {
            let alert = Alert::new(org, "src", format!("alert {i}"), Priority::P4, Utc::now());
            repos.alerts.create(alert).await.unwrap();
        }
        let filter = AlertFilter {
            page: Some(pulsar_store::PageRequest {
                limit: 3,
                offset: 0,
            }),
            ..AlertFilter::default()
        };
        let page = repos.alerts.list(org, &filter).await.unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 3);
    }
}
