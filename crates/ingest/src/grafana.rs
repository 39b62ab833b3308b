use std::collections::BTreeSet;

use pulsar_core::{NewAlert, Priority};

use crate::IngestError;

/// Map a Grafana alert webhook body to canonical alerts.
///
/// `state == "ok"` notifications are skipped. `alerting` maps to P2,
/// `no_data` to P3; the title becomes the message and Grafana's `message`
/// becomes the description.
pub fn canonicalise(payload: &serde_json::Value) -> Result<Vec<NewAlert>, IngestError> {
    let object = payload.as_object().ok_or_else(|| IngestError::Malformed {
        integration: "grafana",
        reason: "body must be a JSON object".into(),
    })?;

    let state = object
        .get("state")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("alerting");
    if state == "ok" {
        return Ok(Vec::new());
    }

    let title = object
        .get("title")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| IngestError::Malformed {
            integration: "grafana",
            reason: "missing required field: title".into(),
        })?;

    let priority = match state {
        "no_data" => Priority::P3,
        // "alerting" and anything else that is not ok.
        _ => Priority::P2,
    };

    Ok(vec![NewAlert {
        source: "grafana".to_owned(),
        source_id: object
            .get("ruleId")
            .map(|id| id.to_string().trim_matches('"').to_owned()),
        message: title.to_owned(),
        description: object
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        priority: Some(priority),
        tags: BTreeSet::from(["grafana".to_owned()]),
        ..NewAlert::default()
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerting_state_maps_to_p2() {
        let body = serde_json::json!({
            "state": "alerting",
            "title": "Latency over threshold",
            "message": "p99 at 4s",
            "ruleId": 42
        });
        let alerts = canonicalise(&body).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].priority, Some(Priority::P2));
        assert_eq!(alerts[0].message, "Latency over threshold");
        assert_eq!(alerts[0].description, "p99 at 4s");
        assert_eq!(alerts[0].source, "grafana");
        assert_eq!(alerts[0].source_id.as_deref(), Some("42"));
    }

    #[test]
    fn no_data_maps_to_p3() {
        let body = serde_json::json!({"state": "no_data", "title": "No metrics"});
        let alerts = canonicalise(&body).unwrap();
        assert_eq!(alerts[0].priority, Some(Priority::P3));
    }

    #[test]
    fn ok_state_is_skipped() {
        let body = serde_json::json!({"state": "ok", "title": "Back to normal"});
        let alerts = canonicalise(&body).unwrap();
        assert!(alerts.is_empty());
    }

    #[test]
    fn missing_title_is_malformed() {
        let body = serde_json::json!({"state": "alerting"});
        assert!(canonicalise(&body).is_err());
    }
}
