use chrono::{DateTime, Utc};
use pulsar_core::{AlertId, AlertStatus, DeliveryState, Priority, TeamId, UserId};
use serde::{Deserialize, Serialize};

/// A page of results with the total count before pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching records, independent of `limit`/`offset`.
    pub total: usize,
}

impl<T> Page<T> {
    /// An empty page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Pagination window shared by all listing filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl PageRequest {
    /// Apply this window to a fully materialised result set.
    #[must_use]
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect()
    }
}

/// Filter for alert listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertFilter {
    #[serde(default)]
    pub status: Option<AlertStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub assigned_user_id: Option<UserId>,
    #[serde(default)]
    pub assigned_team_id: Option<TeamId>,
    /// Matches alerts carrying this tag.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: Option<PageRequest>,
}

/// Filter for webhook delivery listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryFilter {
    #[serde(default)]
    pub state: Option<DeliveryState>,
    #[serde(default)]
    pub page: Option<PageRequest>,
}

/// Filter for notification log listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub alert_id: Option<AlertId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub page: Option<PageRequest>,
}

/// Filter for audit trail listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    #[serde(default)]
    pub alert_id: Option<AlertId>,
    #[serde(default)]
    pub page: Option<PageRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_slices() {
        let items: Vec<u32> = (0..10).collect();
        let window = PageRequest {
            limit: 3,
            offset: 4,
        };
        assert_eq!(window.slice(&items), vec![4, 5, 6]);
    }

    #[test]
    fn default_window() {
        let window = PageRequest::default();
        assert_eq!(window.limit, 50);
        assert_eq!(window.offset, 0);
    }

    #[test]
    fn empty_page() {
        let page: Page<u8> = Page::empty();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn alert_filter_deserializes_sparse() {
        let f: AlertFilter = serde_json::from_str(r#"{"status":"open"}"#).unwrap();
        assert_eq!(f.status, Some(AlertStatus::Open));
        assert!(f.priority.is_none());
    }
}
