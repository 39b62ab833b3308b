//! On-call resolution and do-not-disturb evaluation.
//!
//! [`OnCallResolver`] deterministically answers "who is responsible for a
//! schedule at instant t" from rotations and manual overrides;
//! [`is_suppressed`] answers "should this user be disturbed at t" from
//! per-user DND settings.

pub mod dnd;
pub mod resolver;

pub use dnd::is_suppressed;
pub use resolver::{OnCall, OnCallError, OnCallResolver, rotation_shift};
