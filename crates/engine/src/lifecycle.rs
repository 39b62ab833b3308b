use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use pulsar_core::{
    Actor, Alert, AlertId, AlertStatus, AuditEntry, EventType, NewAlert, OrgId, PolicyId,
    PulsarError, TeamId, UserId,
};
use pulsar_routing::RoutingEngine;
use pulsar_store::{
    AlertFilter, AlertRepo as _, AuditRepo as _, EscalationEventRepo as _, Page, Repositories,
    TeamRepo as _, UserRepo as _,
};

use crate::clock::Clock;
use crate::emitter::EventEmitter;
use crate::escalation::EscalationEngine;

/// Result of an alert creation request.
#[derive(Debug)]
pub enum CreateOutcome {
    /// Persisted and escalation started.
    Created(Alert),
    /// A routing rule suppressed the alert before persistence; no record
    /// exists and no side-effects fired.
    Suppressed,
    /// A live alert with the same `(org, source, source_id)` already
    /// exists; it is returned unchanged.
    Duplicate(Alert),
}

/// The write-side façade over alerts.
///
/// Every mutation runs under the per-alert lock, records an audit entry,
/// cancels escalation in the same critical section as the status change,
/// and emits the corresponding platform event.
pub struct AlertService {
    repos: Repositories,
    routing: RoutingEngine,
    escalation: Arc<EscalationEngine>,
    emitter: Arc<EventEmitter>,
    clock: Arc<dyn Clock>,
}

impl AlertService {
    /// Create the service.
    #[must_use]
    pub fn new(
        repos: Repositories,
        routing: RoutingEngine,
        escalation: Arc<EscalationEngine>,
        emitter: Arc<EventEmitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            routing,
            escalation,
            emitter,
            clock,
        }
    }

    /// Create an alert: dedupe on `source_id`, route, persist, start
    /// escalation, emit `alert.created`.
    #[instrument(skip(self, request), fields(org_id = %org, source = %request.source))]
    pub async fn create(
        &self,
        org: OrgId,
        request: NewAlert,
        actor: Actor,
    ) -> Result<CreateOutcome, PulsarError> {
        let now = self.clock.now();

        // Replays of the same vendor event return the existing alert
        // unchanged.
        if let Some(source_id) = request.source_id.as_deref()
            && let Some(existing) = self
                .repos
                .alerts
                .find_by_source_id(org, &request.source, source_id)
                .await?
        {
            debug!(alert_id = %existing.id, source_id, "duplicate create, returning existing alert");
            return Ok(CreateOutcome::Duplicate(existing));
        }

        let candidate = request.into_alert(org, now);
        let routed = self.routing.route_alert(candidate).await?;
        if routed.suppressed {
            info!(source = %routed.alert.source, "alert suppressed by routing rule");
            return Ok(CreateOutcome::Suppressed);
        }

        let mut alert = routed.alert;
        if let Some(team_id) = routed.team_id {
            alert.assigned_team_id = Some(team_id);
            alert.assigned_user_id = None;
        }
        if let Some(policy_id) = routed.policy_id {
            alert.escalation_policy_id = Some(policy_id);
        }
        alert.validate()?;

        self.repos.alerts.create(alert.clone()).await?;
        self.audit(&alert, actor, "create", None, now).await;

        if let Err(err) = self.escalation.start(&alert, now).await {
            // The alert stands; escalation config problems surface in logs
            // and the audit trail, not as a failed create.
            warn!(alert_id = %alert.id, error = %err, "failed to start escalation");
        }

        self.emit(EventType::AlertCreated, &alert, now).await;
        Ok(CreateOutcome::Created(alert))
    }

    /// Acknowledge an open or snoozed alert, cancelling escalation in the
    /// same critical section.
    pub async fn acknowledge(
        &self,
        org: OrgId,
        id: AlertId,
        user: UserId,
    ) -> Result<Alert, PulsarError> {
        let now = self.clock.now();
        let _guard = self.repos.alert_locks.lock(id).await;

        let mut alert = self.repos.alerts.get(org, id).await?;
        if !matches!(alert.status, AlertStatus::Open | AlertStatus::Snoozed) {
            return Err(PulsarError::conflict(format!(
                "cannot acknowledge a {} alert",
                alert.status.as_str()
            )));
        }

        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_at = Some(now);
        alert.acknowledged_by = Some(user);
        alert.snoozed_until = None;
        alert.updated_at = now;
        self.repos.alerts.update(alert.clone()).await?;
        self.repos
            .escalation_events
            .cancel_pending_for_alert(id, now)
            .await?;

        self.audit(&alert, Actor::User(user), "acknowledge", None, now)
            .await;
        self.emit(EventType::AlertAcknowledged, &alert, now).await;
        Ok(alert)
    }

    /// Close an alert (terminal), cancelling escalation in the same
    /// critical section.
    pub async fn close(
        &self,
        org: OrgId,
        id: AlertId,
        user: UserId,
        reason: Option<String>,
    ) -> Result<Alert, PulsarError> {
        let now = self.clock.now();
        let _guard = self.repos.alert_locks.lock(id).await;

        let mut alert = self.repos.alerts.get(org, id).await?;
        if alert.status == AlertStatus::Closed {
            return Err(PulsarError::conflict("alert is already closed"));
        }

        alert.status = AlertStatus::Closed;
        alert.closed_at = Some(now);
        alert.closed_by = Some(user);
        alert.close_reason = reason.clone();
        alert.updated_at = now;
        self.repos.alerts.update(alert.clone()).await?;
        self.repos
            .escalation_events
            .cancel_pending_for_alert(id, now)
            .await?;

        self.audit(&alert, Actor::User(user), "close", reason, now).await;
        self.emit(EventType::AlertClosed, &alert, now).await;
        Ok(alert)
    }

    /// Snooze an open alert until `until`; escalation is cancelled (the
    /// engine treats snoozed as not-open).
    pub async fn snooze(
        &self,
        org: OrgId,
        id: AlertId,
        until: DateTime<Utc>,
        user: UserId,
    ) -> Result<Alert, PulsarError> {
        let now = self.clock.now();
        if until <= now {
            return Err(PulsarError::validation("snooze must end in the future"));
        }
        let _guard = self.repos.alert_locks.lock(id).await;

        let mut alert = self.repos.alerts.get(org, id).await?;
        if !matches!(alert.status, AlertStatus::Open | AlertStatus::Snoozed) {
            return Err(PulsarError::conflict(format!(
                "cannot snooze a {} alert",
                alert.status.as_str()
            )));
        }

        alert.status = AlertStatus::Snoozed;
        alert.snoozed_until = Some(until);
        alert.updated_at = now;
        self.repos.alerts.update(alert.clone()).await?;
        self.repos
            .escalation_events
            .cancel_pending_for_alert(id, now)
            .await?;

        self.audit(
            &alert,
            Actor::User(user),
            "snooze",
            Some(format!("until {until}")),
            now,
        )
        .await;
        self.emit(EventType::AlertSnoozed, &alert, now).await;
        Ok(alert)
    }

    /// Assign the alert to exactly one of a user or a team.
    pub async fn assign(
        &self,
        org: OrgId,
        id: AlertId,
        user: Option<UserId>,
        team: Option<TeamId>,
        actor: Actor,
    ) -> Result<Alert, PulsarError> {
        let now = self.clock.now();
        let (detail, assigned_user, assigned_team) = match (user, team) {
            (Some(user_id), None) => {
                self.repos.users.get(org, user_id).await?;
                (format!("user {user_id}"), Some(user_id), None)
            }
            (None, Some(team_id)) => {
                self.repos.teams.get(org, team_id).await?;
                (format!("team {team_id}"), None, Some(team_id))
            }
            _ => {
                return Err(PulsarError::validation(
                    "assignment requires exactly one of user or team",
                ));
            }
        };

        let _guard = self.repos.alert_locks.lock(id).await;
        let mut alert = self.repos.alerts.get(org, id).await?;
        if alert.status == AlertStatus::Closed {
            return Err(PulsarError::conflict("cannot assign a closed alert"));
        }
        alert.assigned_user_id = assigned_user;
        alert.assigned_team_id = assigned_team;
        alert.updated_at = now;
        alert.validate()?;
        self.repos.alerts.update(alert.clone()).await?;

        self.audit(&alert, actor, "assign", Some(detail), now).await;
        self.emit(EventType::AlertAssigned, &alert, now).await;
        Ok(alert)
    }

    /// Admin-only removal. Cancels any pending escalation first.
    pub async fn delete(&self, org: OrgId, id: AlertId, actor: Actor) -> Result<(), PulsarError> {
        let now = self.clock.now();
        {
            let _guard = self.repos.alert_locks.lock(id).await;
            let alert = self.repos.alerts.get(org, id).await?;
            self.repos
                .escalation_events
                .cancel_pending_for_alert(id, now)
                .await?;
            self.repos.alerts.delete(org, id).await?;
            self.audit(&alert, actor, "delete", None, now).await;
        }
        self.repos.alert_locks.discard(id).await;
        Ok(())
    }

    /// Fetch one alert.
    pub async fn get(&self, org: OrgId, id: AlertId) -> Result<Alert, PulsarError> {
        Ok(self.repos.alerts.get(org, id).await?)
    }

    /// List alerts with filters and pagination.
    pub async fn list(&self, org: OrgId, filter: &AlertFilter) -> Result<Page<Alert>, PulsarError> {
        Ok(self.repos.alerts.list(org, filter).await?)
    }

    /// Detach a deleted policy from its open alerts and stop their
    /// escalations (the set-null + stop rule for policy deletion).
    pub async fn detach_policy(&self, org: OrgId, policy_id: PolicyId) -> Result<usize, PulsarError> {
        let now = self.clock.now();
        let affected = self.repos.alerts.open_with_policy(org, policy_id).await?;
        let mut detached = 0;
        for stale in affected {
            let _guard = self.repos.alert_locks.lock(stale.id).await;
            let Ok(mut alert) = self.repos.alerts.get(org, stale.id).await else {
                continue;
            };
            if alert.escalation_policy_id != Some(policy_id) {
                continue;
            }
            alert.escalation_policy_id = None;
            alert.updated_at = now;
            self.repos.alerts.update(alert.clone()).await?;
            self.repos
                .escalation_events
                .cancel_pending_for_alert(alert.id, now)
                .await?;
            self.audit(
                &alert,
                Actor::System,
                "detach-policy",
                Some(format!("policy {policy_id} deleted")),
                now,
            )
            .await;
            detached += 1;
        }
        Ok(detached)
    }

    async fn audit(
        &self,
        alert: &Alert,
        actor: Actor,
        action: &str,
        detail: Option<String>,
        now: DateTime<Utc>,
    ) {
        let mut entry = AuditEntry::record(alert.organization_id, alert.id, actor, action, now);
        if let Some(detail) = detail {
            entry = entry.with_detail(detail);
        }
        if let Err(err) = self.repos.audit.record(entry).await {
            warn!(alert_id = %alert.id, action, error = %err, "failed to record audit entry");
        }
    }

    async fn emit(&self, event_type: EventType, alert: &Alert, now: DateTime<Utc>) {
        let data = serde_json::to_value(alert).unwrap_or_else(|_| serde_json::json!({}));
        self.emitter
            .emit(event_type, alert.organization_id, data, now)
            .await;
    }
}
