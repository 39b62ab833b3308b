//! The incoming webhook adapter.
//!
//! Dispatches on a token's integration kind and maps vendor-specific JSON
//! payloads (Prometheus Alertmanager, Grafana, Datadog, generic) into
//! canonical [`NewAlert`] requests, then applies the token's defaults
//! (tag union, priority fill).

mod grafana;
mod prometheus;

use thiserror::Error;

use pulsar_core::{IncomingWebhookToken, IntegrationKind, NewAlert};

/// Errors from payload canonicalisation.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request body is not the shape the integration expects.
    #[error("malformed {integration} payload: {reason}")]
    Malformed {
        integration: &'static str,
        reason: String,
    },
}

/// Map a vendor payload into zero or more canonical alert requests.
///
/// Resolved/ok entries are filtered out, so an empty result is a valid
/// outcome, not an error.
pub fn canonicalise(
    kind: IntegrationKind,
    payload: &serde_json::Value,
) -> Result<Vec<NewAlert>, IngestError> {
    match kind {
        IntegrationKind::Prometheus => prometheus::canonicalise(payload),
        IntegrationKind::Grafana => grafana::canonicalise(payload),
        // Datadog posts a flat JSON body; the generic mapping covers it.
        IntegrationKind::Datadog => generic(payload, "datadog"),
        IntegrationKind::Generic => generic(payload, "generic"),
    }
}

/// Apply token defaults: tags are merged (set union); the default priority
/// fills only when the payload carried none.
pub fn apply_token_defaults(request: &mut NewAlert, token: &IncomingWebhookToken) {
    request.tags.extend(token.default_tags.iter().cloned());
    if request.priority.is_none() {
        request.priority = token.default_priority;
    }
}

/// Generic mapping: fields taken verbatim from the JSON body.
fn generic(
    payload: &serde_json::Value,
    default_source: &str,
) -> Result<Vec<NewAlert>, IngestError> {
    let object = payload.as_object().ok_or_else(|| IngestError::Malformed {
        integration: "generic",
        reason: "body must be a JSON object".into(),
    })?;

    let message = object
        .get("message")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| IngestError::Malformed {
            integration: "generic",
            reason: "missing required field: message".into(),
        })?;

    let priority = object
        .get("priority")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok());

    let tags = object
        .get("tags")
        .and_then(serde_json::Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    let mut request = NewAlert {
        source: object
            .get("source")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(default_source)
            .to_owned(),
        source_id: object
            .get("source_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned),
        message: message.to_owned(),
        description: object
            .get("description")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        priority,
        tags,
        ..NewAlert::default()
    };

    if let Some(details) = object.get("details").and_then(serde_json::Value::as_object) {
        request.custom_fields = details.clone().into_iter().collect();
    }

    Ok(vec![request])
}
