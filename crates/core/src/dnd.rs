use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::DayOfWeek;
use crate::types::{OrgId, UserId};

/// A recurring weekly suppression window in the user's local timezone.
///
/// Slots are inclusive at both ends. Overnight slots where `start > end`
/// wrap across midnight and are interpreted as
/// `[start, 24:00) ∪ [00:00, end]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WeeklySlot {
    pub day: DayOfWeek,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WeeklySlot {
    /// Whether the local time of day falls inside this slot, given the
    /// local weekday. Overnight slots match the late portion on `day` and
    /// the early portion on the following day.
    #[must_use]
    pub fn contains(&self, weekday: DayOfWeek, time: NaiveTime) -> bool {
        if self.start <= self.end {
            weekday == self.day && self.start <= time && time <= self.end
        } else {
            // Overnight: [start, midnight) on `day`, [midnight, end] on day+1.
            (weekday == self.day && time >= self.start)
                || (weekday == next_day(self.day) && time <= self.end)
        }
    }
}

const fn next_day(day: DayOfWeek) -> DayOfWeek {
    match day {
        DayOfWeek::Monday => DayOfWeek::Tuesday,
        DayOfWeek::Tuesday => DayOfWeek::Wednesday,
        DayOfWeek::Wednesday => DayOfWeek::Thursday,
        DayOfWeek::Thursday => DayOfWeek::Friday,
        DayOfWeek::Friday => DayOfWeek::Saturday,
        DayOfWeek::Saturday => DayOfWeek::Sunday,
        DayOfWeek::Sunday => DayOfWeek::Monday,
    }
}

/// A one-off absolute suppression window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DndOverride {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DndOverride {
    /// Whether `t` falls inside the half-open window.
    #[must_use]
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Per-user do-not-disturb configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserDndSettings {
    pub user_id: UserId,
    pub organization_id: OrgId,
    #[serde(default)]
    pub enabled: bool,
    /// IANA timezone the weekly slots are evaluated in.
    pub timezone: String,
    #[serde(default)]
    pub weekly_slots: Vec<WeeklySlot>,
    #[serde(default)]
    pub overrides: Vec<DndOverride>,
    /// When set, P1 alerts always reach the user.
    #[serde(default)]
    pub allow_p1_override: bool,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn plain_slot_inclusive_ends() {
        let slot = WeeklySlot {
            day: DayOfWeek::Monday,
            start: t(9, 0),
            end: t(17, 0),
        };
        assert!(slot.contains(DayOfWeek::Monday, t(9, 0)));
        assert!(slot.contains(DayOfWeek::Monday, t(17, 0)));
        assert!(!slot.contains(DayOfWeek::Monday, t(17, 1)));
        assert!(!slot.contains(DayOfWeek::Tuesday, t(12, 0)));
    }

    #[test]
    fn overnight_slot_wraps_midnight() {
        let slot = WeeklySlot {
            day: DayOfWeek::Friday,
            start: t(22, 0),
            end: t(7, 0),
        };
        assert!(slot.contains(DayOfWeek::Friday, t(23, 30)));
        assert!(slot.contains(DayOfWeek::Saturday, t(3, 0)));
        assert!(slot.contains(DayOfWeek::Saturday, t(7, 0)));
        assert!(!slot.contains(DayOfWeek::Saturday, t(7, 1)));
        assert!(!slot.contains(DayOfWeek::Friday, t(21, 59)));
    }

    #[test]
    fn override_half_open() {
        let start = Utc::now();
        let ov = DndOverride {
            start,
            end: start + chrono::Duration::hours(2),
            reason: Some("travel".into()),
        };
        assert!(ov.covers(start));
        assert!(!ov.covers(start + chrono::Duration::hours(2)));
    }

    #[test]
    fn settings_serde_defaults() {
        let json = format!(
            r#"{{"user_id":"{}","organization_id":"{}","timezone":"UTC","updated_at":"2026-01-01T00:00:00Z"}}"#,
            UserId::generate(),
            OrgId::generate()
        );
        let settings: UserDndSettings = serde_json::from_str(&json).unwrap();
        assert!(!settings.enabled);
        assert!(settings.weekly_slots.is_empty());
        assert!(!settings.allow_p1_override);
    }
}
