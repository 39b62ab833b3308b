//! The alert lifecycle and escalation engine.
//!
//! This crate wires the load-bearing pieces together: the injectable
//! [`Clock`], the notification [`FanOut`], the [`EscalationEngine`] state
//! machine, the write-side [`AlertService`] façade, the [`EventEmitter`]
//! bridging mutations to the bus and the webhook queue, and the
//! background [`Workers`] that drive the ticks.

pub mod background;
pub mod clock;
pub mod emitter;
pub mod escalation;
pub mod fanout;
pub mod lifecycle;

pub use background::{BackgroundConfig, Workers};
pub use clock::{Clock, ManualClock, SystemClock};
pub use emitter::EventEmitter;
pub use escalation::{EscalationEngine, EscalationTickStats};
pub use fanout::{FanOut, FanOutReport, LogSink, NotificationSink};
pub use lifecycle::{AlertService, CreateOutcome};
