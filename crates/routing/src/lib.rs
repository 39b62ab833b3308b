//! The ingestion routing engine.
//!
//! Walks a tenant's ordered routing rules against a candidate alert and
//! produces a [`RouteOutcome`]: team/policy assignment, tag and priority
//! mutations, or suppression before persistence.

pub mod engine;

pub use engine::{RouteOutcome, RoutingEngine, route};
