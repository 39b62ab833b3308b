use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use pulsar_core::{
    Actor, Alert, AuditEntry, EscalationEvent, EscalationState, EventType, PulsarError,
};
use pulsar_store::{
    AlertRepo as _, AuditRepo as _, EscalationEventRepo as _, PolicyRepo as _, Repositories,
    StoreError,
};

use crate::emitter::EventEmitter;
use crate::fanout::FanOut;

/// Counts from one escalation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationTickStats {
    /// Due records selected.
    pub processed: usize,
    /// Rule fires performed.
    pub fired: usize,
    /// Records cancelled because their alert was no longer open.
    pub cancelled: usize,
    /// Records that reached policy exhaustion this tick.
    pub completed: usize,
}

enum DueOutcome {
    Skipped,
    Fired { completed: bool },
    Cancelled,
}

/// The escalation state machine.
///
/// One pending [`EscalationEvent`] exists per open alert with a policy;
/// every tick advances the due ones: reload the alert under its lock,
/// cancel if it is no longer open, otherwise fire the current level's
/// targets and schedule the next step (next level, repeat cycle, or
/// completion). Fires never happen early, and a slow tick advances a
/// record at most once per visit.
pub struct EscalationEngine {
    repos: Repositories,
    fanout: FanOut,
    emitter: Arc<EventEmitter>,
    batch_size: usize,
}

impl EscalationEngine {
    /// Create the engine.
    #[must_use]
    pub fn new(
        repos: Repositories,
        fanout: FanOut,
        emitter: Arc<EventEmitter>,
        batch_size: usize,
    ) -> Self {
        Self {
            repos,
            fanout,
            emitter,
            batch_size,
        }
    }

    /// Start escalation for a freshly created open alert with a policy.
    ///
    /// No notification fires here: the first level fires after its own
    /// delay, giving a grace period for an immediate human response.
    /// Returns `None` when the alert has no policy, is not open, or the
    /// policy has no rules.
    pub async fn start(
        &self,
        alert: &Alert,
        now: DateTime<Utc>,
    ) -> Result<Option<EscalationEvent>, PulsarError> {
        let Some(policy_id) = alert.escalation_policy_id else {
            return Ok(None);
        };
        if !alert.is_active() {
            return Ok(None);
        }
        let rules = self.repos.policies.rules(policy_id).await?;
        let Some(first) = rules.first() else {
            warn!(alert_id = %alert.id, policy_id = %policy_id, "policy has no rules, not escalating");
            return Ok(None);
        };

        let first_fire_at = now + first.delay();
        let event = EscalationEvent::start(
            alert.organization_id,
            alert.id,
            policy_id,
            first_fire_at,
            now,
        );
        self.repos.escalation_events.create(event.clone()).await?;
        debug!(
            alert_id = %alert.id,
            event_id = %event.id,
            next_fire_at = %first_fire_at,
            "escalation started"
        );
        Ok(Some(event))
    }

    /// Process every due escalation record at `now`.
    ///
    /// Running two ticks with no elapsed time between them makes the
    /// second a no-op: each fire pushes `next_fire_at` into the future or
    /// terminates the record.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<EscalationTickStats, StoreError> {
        let due = self.repos.escalation_events.due(now, self.batch_size).await?;
        let mut stats = EscalationTickStats {
            processed: due.len(),
            ..EscalationTickStats::default()
        };
        for event in due {
            match self.process_due(event, now).await {
                Ok(DueOutcome::Fired { completed }) => {
                    stats.fired += 1;
                    if completed {
                        stats.completed += 1;
                    }
                }
                Ok(DueOutcome::Cancelled) => stats.cancelled += 1,
                Ok(DueOutcome::Skipped) => {}
                Err(err) => {
                    warn!(error = %err, "escalation record processing failed, retrying next tick");
                }
            }
        }
        Ok(stats)
    }

    #[instrument(skip(self, event), fields(alert_id = %event.alert_id, event_id = %event.id))]
    async fn process_due(
        &self,
        event: EscalationEvent,
        now: DateTime<Utc>,
    ) -> Result<DueOutcome, StoreError> {
        let _guard = self.repos.alert_locks.lock(event.alert_id).await;

        // Reload under the lock: a concurrent acknowledge may have
        // cancelled the record while we waited.
        let mut event = self.repos.escalation_events.get(event.id).await?;
        if !event.is_due(now) {
            return Ok(DueOutcome::Skipped);
        }

        let alert = match self
            .repos
            .alerts
            .get(event.organization_id, event.alert_id)
            .await
        {
            Ok(alert) => alert,
            Err(StoreError::NotFound(_)) => {
                // Alert deleted out from under the record.
                self.terminate(&mut event, EscalationState::Acknowledged, now)
                    .await?;
                return Ok(DueOutcome::Cancelled);
            }
            Err(err) => return Err(err),
        };

        if !alert.is_active() {
            self.terminate(&mut event, EscalationState::Acknowledged, now)
                .await?;
            debug!(status = alert.status.as_str(), "alert no longer open, escalation cancelled");
            return Ok(DueOutcome::Cancelled);
        }

        let policy = match self
            .repos
            .policies
            .get(event.organization_id, event.policy_id)
            .await
        {
            Ok(policy) => policy,
            Err(StoreError::NotFound(_)) => {
                warn!(policy_id = %event.policy_id, "policy vanished, escalation cancelled");
                self.terminate(&mut event, EscalationState::Acknowledged, now)
                    .await?;
                return Ok(DueOutcome::Cancelled);
            }
            Err(err) => return Err(err),
        };
        let rules = self.repos.policies.rules(policy.id).await?;

        let fired_level = event.current_level as usize;
        let Some(rule) = rules.get(fired_level) else {
            // The policy shrank below the current level.
            self.terminate(&mut event, EscalationState::Completed, now)
                .await?;
            return Ok(DueOutcome::Fired { completed: true });
        };

        let report = self.fanout.fan_out(&alert, rule, event.repeat_count, now).await;
        debug!(
            level = fired_level,
            repeat = event.repeat_count,
            notified = report.notified,
            "escalation level fired"
        );
        event.current_rule_id = Some(rule.id);

        // Compute the next step.
        let mut completed = false;
        if fired_level + 1 < rules.len() {
            event.current_level += 1;
            event.next_fire_at = Some(now + rules[fired_level + 1].delay());
        } else if policy.repeat_enabled
            && policy
                .repeat_count
                .is_none_or(|cap| event.repeat_count < cap)
        {
            event.repeat_count += 1;
            event.current_level = 0;
            event.next_fire_at = Some(now + rules[0].delay());
        } else {
            event.state = EscalationState::Completed;
            event.next_fire_at = None;
            completed = true;
        }
        event.updated_at = now;

        // Persist the event and the alert's denormalised summary under the
        // same alert lock.
        let mut alert = alert;
        alert.escalation_level = alert.escalation_level.max(event.current_level);
        alert.last_escalated_at = Some(now);
        alert.updated_at = now;
        self.repos.escalation_events.update(event.clone()).await?;
        self.repos.alerts.update(alert.clone()).await?;

        if let Err(err) = self
            .repos
            .audit
            .record(
                AuditEntry::record(
                    alert.organization_id,
                    alert.id,
                    Actor::System,
                    "escalate",
                    now,
                )
                .with_detail(format!(
                    "level {fired_level} fired (cycle {})",
                    event.repeat_count
                )),
            )
            .await
        {
            warn!(error = %err, "failed to record escalation audit entry");
        }

        self.emitter
            .emit(
                EventType::AlertEscalated,
                alert.organization_id,
                serde_json::json!({
                    "alert_id": alert.id,
                    "level": fired_level,
                    "repeat_count": event.repeat_count,
                    "rule_id": rule.id,
                }),
                now,
            )
            .await;

        Ok(DueOutcome::Fired { completed })
    }

    async fn terminate(
        &self,
        event: &mut EscalationEvent,
        state: EscalationState,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        event
            .finish(state, now)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        self.repos.escalation_events.update(event.clone()).await
    }
}
