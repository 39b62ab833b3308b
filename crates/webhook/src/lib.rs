//! Outgoing webhook delivery.
//!
//! [`WebhookWorker`] drains the persistent delivery queue: each due row is
//! serialised, HMAC-signed, POSTed with the endpoint's timeout, and either
//! marked successful, rescheduled with the endpoint's fixed retry delay,
//! or failed once the retry budget is exhausted.

pub mod signer;
pub mod worker;

pub use signer::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER, sign, verify};
pub use worker::{MAX_RESPONSE_BYTES, TickStats, WebhookWorker, WorkerConfig};
