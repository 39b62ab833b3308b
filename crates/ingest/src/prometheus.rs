use std::collections::BTreeSet;

use pulsar_core::{NewAlert, Priority};

use crate::IngestError;

/// Map an Alertmanager webhook body to canonical alerts.
///
/// Each entry of `alerts[]` that is not resolved becomes one alert:
/// `labels.severity` maps to priority, `annotations.summary` (falling back
/// to `labels.alertname`) becomes the message, and every label lands in
/// the tag set as `key:value` alongside the `prometheus` tag.
pub fn canonicalise(payload: &serde_json::Value) -> Result<Vec<NewAlert>, IngestError> {
    let entries = payload
        .get("alerts")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| IngestError::Malformed {
            integration: "prometheus",
            reason: "missing alerts[] array".into(),
        })?;

    let mut requests = Vec::new();
    for entry in entries {
        let status = entry
            .get("status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("firing");
        if status == "resolved" {
            continue;
        }

        let labels = entry.get("labels").and_then(serde_json::Value::as_object);
        let annotations = entry
            .get("annotations")
            .and_then(serde_json::Value::as_object);

        let alertname = labels
            .and_then(|l| l.get("alertname"))
            .and_then(serde_json::Value::as_str);
        let summary = annotations
            .and_then(|a| a.get("summary"))
            .and_then(serde_json::Value::as_str);
        let Some(message) = summary.or(alertname) else {
            return Err(IngestError::Malformed {
                integration: "prometheus",
                reason: "alert entry has neither annotations.summary nor labels.alertname".into(),
            });
        };

        let severity = labels
            .and_then(|l| l.get("severity"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        let mut tags: BTreeSet<String> = BTreeSet::from(["prometheus".to_owned()]);
        if let Some(labels) = labels {
            for (key, value) in labels {
                if let Some(value) = value.as_str() {
                    tags.insert(format!("{key}:{value}"));
                }
            }
        }

        requests.push(NewAlert {
            source: "prometheus".to_owned(),
            source_id: entry
                .get("fingerprint")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            message: message.to_owned(),
            description: annotations
                .and_then(|a| a.get("description"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            priority: Some(severity_to_priority(severity)),
            tags,
            ..NewAlert::default()
        });
    }

    Ok(requests)
}

fn severity_to_priority(severity: &str) -> Priority {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => Priority::P1,
        "error" | "high" => Priority::P2,
        "info" | "low" => Priority::P4,
        // "warning", "medium", and anything unrecognised.
        _ => Priority::P3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firing_critical_alert_maps_to_p1() {
        let body = serde_json::json!({
            "alerts": [{
                "status": "firing",
                "labels": {"severity": "critical", "alertname": "CPU"},
                "annotations": {"summary": "High CPU"}
            }]
        });
        let alerts = canonicalise(&body).unwrap();
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.priority, Some(Priority::P1));
        assert_eq!(alert.message, "High CPU");
        assert_eq!(alert.source, "prometheus");
        assert!(alert.tags.contains("prometheus"));
        assert!(alert.tags.contains("severity:critical"));
        assert!(alert.tags.contains("alertname:CPU"));
    }

    #[test]
    fn resolved_entries_are_skipped() {
        let body = serde_json::json!({
            "alerts": [
                {"status": "resolved", "labels": {"alertname": "Old"}},
                {"status": "firing", "labels": {"alertname": "New", "severity": "warning"}}
            ]
        });
        let alerts = canonicalise(&body).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "New");
        assert_eq!(alerts[0].priority, Some(Priority::P3));
    }

    #[test]
    fn message_falls_back_to_alertname() {
        let body = serde_json::json!({
            "alerts": [{"status": "firing", "labels": {"alertname": "DiskFull"}}]
        });
        let alerts = canonicalise(&body).unwrap();
        assert_eq!(alerts[0].message, "DiskFull");
    }

    #[test]
    fn severity_map_covers_aliases() {
        assert_eq!(severity_to_priority("critical"), Priority::P1);
        assert_eq!(severity_to_priority("ERROR"), Priority::P2);
        assert_eq!(severity_to_priority("high"), Priority::P2);
        assert_eq!(severity_to_priority("warning"), Priority::P3);
        assert_eq!(severity_to_priority("medium"), Priority::P3);
        assert_eq!(severity_to_priority("info"), Priority::P4);
        assert_eq!(severity_to_priority("low"), Priority::P4);
        assert_eq!(severity_to_priority("weird"), Priority::P3);
        assert_eq!(severity_to_priority(""), Priority::P3);
    }

    #[test]
    fn description_and_fingerprint_carry_over() {
        let body = serde_json::json!({
            "alerts": [{
                "status": "firing",
                "fingerprint": "fp-1234",
                "labels": {"alertname": "CPU"},
                "annotations": {"summary": "High CPU", "description": "90% for 10m"}
            }]
        });
        let alerts = canonicalise(&body).unwrap();
        assert_eq!(alerts[0].description, "90% for 10m");
        assert_eq!(alerts[0].source_id.as_deref(), Some("fp-1234"));
    }

    #[test]
    fn missing_alerts_array_is_malformed() {
        let err = canonicalise(&serde_json::json!({"status": "firing"})).unwrap_err();
        assert!(err.to_string().contains("prometheus"));
    }

    #[test]
    fn entry_without_any_name_is_malformed() {
        let body = serde_json::json!({"alerts": [{"status": "firing", "labels": {}}]});
        assert!(canonicalise(&body).is_err());
    }
}
