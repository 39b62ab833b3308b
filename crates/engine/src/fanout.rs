use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use pulsar_core::{
    Alert, ChannelKind, EscalationRule, EscalationTarget, NotificationId, NotificationRecord,
    TargetRef, UserId,
};
use pulsar_oncall::{OnCallResolver, is_suppressed};
use pulsar_store::{ChannelRepo, DndRepo, NotificationRepo, TeamRepo, UserRepo};

/// Port to the concrete channel providers (SMTP relay, Slack app, SMS
/// gateway). The in-tree sink logs; real providers are external
/// collaborators plugged in at startup.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, record: &NotificationRecord);
}

/// Default sink: structured log only.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, record: &NotificationRecord) {
        debug!(
            alert_id = %record.alert_id,
            user_id = %record.user_id,
            channel = %record.channel,
            subject = %record.subject,
            "notification dispatched"
        );
    }
}

/// Counts from one fan-out invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Notifications recorded and handed to the sink.
    pub notified: usize,
    /// Recipients skipped by DND.
    pub suppressed: usize,
    /// Duplicate `(alert, rule, cycle, recipient, channel)` tuples skipped.
    pub deduplicated: usize,
}

/// Turns one escalation fire into per-recipient, per-channel deliveries.
///
/// Targets resolve to users (teams to members, schedules through the
/// on-call resolver); each recipient is DND-checked with the alert
/// priority, then notified on the intersection of their preferred
/// channels with the organization's enabled channels, narrowed further by
/// a target-level channel override. The notification log enforces
/// at-most-once per `(alert, rule, cycle, recipient, channel)`.
pub struct FanOut {
    users: Arc<dyn UserRepo>,
    teams: Arc<dyn TeamRepo>,
    dnd: Arc<dyn DndRepo>,
    channels: Arc<dyn ChannelRepo>,
    notifications: Arc<dyn NotificationRepo>,
    resolver: OnCallResolver,
    sink: Arc<dyn NotificationSink>,
}

impl FanOut {
    /// Create the fan-out stage.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepo>,
        teams: Arc<dyn TeamRepo>,
        dnd: Arc<dyn DndRepo>,
        channels: Arc<dyn ChannelRepo>,
        notifications: Arc<dyn NotificationRepo>,
        resolver: OnCallResolver,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            users,
            teams,
            dnd,
            channels,
            notifications,
            resolver,
            sink,
        }
    }

    /// Fan out one fire of `rule` (repeat cycle `cycle`) for `alert`.
    #[instrument(skip_all, fields(alert_id = %alert.id, rule_id = %rule.id, cycle = cycle))]
    pub async fn fan_out(
        &self,
        alert: &Alert,
        rule: &EscalationRule,
        cycle: u32,
        now: DateTime<Utc>,
    ) -> FanOutReport {
        let org = alert.organization_id;
        let org_channels = match self.channels.enabled_kinds(org).await {
            Ok(kinds) => kinds,
            Err(err) => {
                warn!(error = %err, "failed to load enabled channels, skipping fan-out");
                return FanOutReport::default();
            }
        };

        let mut report = FanOutReport::default();
        for target in &rule.targets {
            let recipients = self.resolve_target(alert, target, now).await;
            for user_id in recipients {
                self.notify_recipient(
                    alert,
                    rule,
                    cycle,
                    target,
                    user_id,
                    &org_channels,
                    now,
                    &mut report,
                )
                .await;
            }
        }
        debug!(
            notified = report.notified,
            suppressed = report.suppressed,
            deduplicated = report.deduplicated,
            "fan-out complete"
        );
        report
    }

    /// Resolve one escalation target to concrete user ids. Resolution
    /// failures are logged and yield no recipients; the other targets of
    /// the rule still fan out.
    async fn resolve_target(
        &self,
        alert: &Alert,
        target: &EscalationTarget,
        now: DateTime<Utc>,
    ) -> Vec<UserId> {
        let org = alert.organization_id;
        match target.target {
            TargetRef::User(user_id) => vec![user_id],
            TargetRef::Team(team_id) => match self.teams.get(org, team_id).await {
                Ok(team) => team.member_ids(),
                Err(err) => {
                    warn!(team_id = %team_id, error = %err, "escalation target team missing");
                    Vec::new()
                }
            },
            TargetRef::Schedule(schedule_id) => {
                match self.resolver.resolve(org, schedule_id, now).await {
                    Ok(oncall) => vec![oncall.user_id],
                    Err(err) => {
                        warn!(schedule_id = %schedule_id, error = %err, "no on-call for escalation target");
                        Vec::new()
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn notify_recipient(
        &self,
        alert: &Alert,
        rule: &EscalationRule,
        cycle: u32,
        target: &EscalationTarget,
        user_id: UserId,
        org_channels: &BTreeSet<ChannelKind>,
        now: DateTime<Utc>,
        report: &mut FanOutReport,
    ) {
        let org = alert.organization_id;

        let settings = match self.dnd.get(org, user_id).await {
            Ok(settings) => settings,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to load DND settings");
                None
            }
        };
        if is_suppressed(settings.as_ref(), alert.priority, now) {
            debug!(user_id = %user_id, "recipient suppressed by DND");
            report.suppressed += 1;
            return;
        }

        let Ok(user) = self.users.get(org, user_id).await else {
            warn!(user_id = %user_id, "escalation recipient missing");
            return;
        };
        if !user.active {
            debug!(user_id = %user_id, "skipping inactive recipient");
            return;
        }

        // Preferred channels, narrowed to org-enabled, narrowed again by a
        // target-level override.
        let selected: Vec<ChannelKind> = user
            .preferred_channels
            .iter()
            .copied()
            .filter(|kind| org_channels.contains(kind))
            .filter(|kind| target.channel_override.is_none_or(|only| only == *kind))
            .collect();

        for channel in selected {
            match self
                .notifications
                .exists(alert.id, Some(rule.id), cycle, user_id, channel)
                .await
            {
                Ok(true) => {
                    report.deduplicated += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "idempotency check failed, skipping channel");
                    continue;
                }
            }

            let record = NotificationRecord {
                id: NotificationId::generate(),
                organization_id: org,
                alert_id: alert.id,
                escalation_rule_id: Some(rule.id),
                cycle,
                user_id,
                channel,
                priority: alert.priority,
                subject: format!("[{}] Alert Escalated: {}", alert.priority, alert.message),
                body: render_body(alert),
                created_at: now,
            };
            if let Err(err) = self.notifications.record(record.clone()).await {
                // A concurrent tick can win the race; either way the tuple
                // is covered.
                warn!(user_id = %user_id, channel = %channel, error = %err, "failed to record notification");
                continue;
            }
            self.sink.deliver(&record).await;
            report.notified += 1;
        }
    }
}

fn render_body(alert: &Alert) -> String {
    let mut body = format!(
        "Alert: {}\nPriority: {}\nSource: {}\nStatus: {}",
        alert.message,
        alert.priority,
        alert.source,
        alert.status.as_str()
    );
    if !alert.description.is_empty() {
        body.push_str("\n\n");
        body.push_str(&alert.description);
    }
    if !alert.tags.is_empty() {
        let tags: Vec<&str> = alert.tags.iter().map(String::as_str).collect();
        body.push_str("\nTags: ");
        body.push_str(&tags.join(", "));
    }
    body
}
