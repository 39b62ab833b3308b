//! Core domain model for Pulsar, a multi-tenant incident-response platform.
//!
//! This crate holds the entities shared across the workspace: alerts and
//! their lifecycle, on-call schedules and rotations, escalation policies
//! and state records, routing rules, notification channels, do-not-disturb
//! settings, webhook endpoints/deliveries, the event envelope, and the
//! platform error taxonomy. Engines and stores live in sibling crates.

pub mod alert;
pub mod audit;
pub mod channel;
pub mod dnd;
pub mod error;
pub mod escalation;
pub mod event;
pub mod org;
pub mod priority;
pub mod routing;
pub mod schedule;
pub mod types;
pub mod webhook;

pub use alert::{Alert, AlertStatus, NewAlert};
pub use audit::{Actor, AuditEntry};
pub use channel::{ChannelKind, NotificationChannel, NotificationRecord};
pub use dnd::{DndOverride, UserDndSettings, WeeklySlot};
pub use error::PulsarError;
pub use escalation::{
    EscalationEvent, EscalationPolicy, EscalationRule, EscalationState, EscalationTarget,
    TargetRef,
};
pub use event::{EventEnvelope, EventType};
pub use org::{Organization, Team, TeamMember, TeamRole, User};
pub use priority::{InvalidPriority, Priority};
pub use routing::{Condition, MatchCondition, RouteAction, RoutingRule};
pub use schedule::{
    DayOfWeek, Rotation, RotationKind, Schedule, ScheduleOverride, parse_timezone,
    validate_timezone,
};
pub use types::{
    AlertId, AuditId, ChannelId, DeliveryId, EndpointId, EscalationEventId, EventId, IncidentId,
    NotificationId, OrgId, OverrideId, PolicyId, RotationId, RoutingRuleId, RuleId, ScheduleId,
    TeamId, TokenId, UserId,
};
pub use webhook::{
    DeliveryState, IncomingWebhookToken, IntegrationKind, WebhookDelivery, WebhookEndpoint,
    generate_secret,
};
