use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::PulsarError;
use crate::types::{OrgId, OverrideId, RotationId, ScheduleId, TeamId, UserId};

/// Day of week for rotation handoffs and DND windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Convert to the chrono weekday.
    #[must_use]
    pub const fn to_weekday(self) -> Weekday {
        match self {
            Self::Monday => Weekday::Mon,
            Self::Tuesday => Weekday::Tue,
            Self::Wednesday => Weekday::Wed,
            Self::Thursday => Weekday::Thu,
            Self::Friday => Weekday::Fri,
            Self::Saturday => Weekday::Sat,
            Self::Sunday => Weekday::Sun,
        }
    }

    /// Convert from the chrono weekday.
    #[must_use]
    pub const fn from_weekday(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

/// An on-call schedule. Instants are stored UTC; shift boundaries are
/// computed in the schedule's IANA timezone so handoffs stay at local
/// wall-clock time across DST transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Schedule {
    pub id: ScheduleId,
    pub organization_id: OrgId,
    pub name: String,
    /// IANA timezone name (e.g. `"Europe/Berlin"`).
    pub timezone: String,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Create a schedule after validating the timezone.
    pub fn new(
        organization_id: OrgId,
        name: impl Into<String>,
        timezone: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, PulsarError> {
        let timezone = timezone.into();
        validate_timezone(&timezone)?;
        Ok(Self {
            id: ScheduleId::generate(),
            organization_id,
            name: name.into(),
            timezone,
            team_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Parse the stored timezone name.
    pub fn tz(&self) -> Result<chrono_tz::Tz, PulsarError> {
        parse_timezone(&self.timezone)
    }
}

/// Validate a timezone string against the IANA database.
pub fn validate_timezone(tz: &str) -> Result<(), PulsarError> {
    parse_timezone(tz).map(|_| ())
}

/// Parse an IANA timezone name.
pub fn parse_timezone(tz: &str) -> Result<chrono_tz::Tz, PulsarError> {
    tz.parse::<chrono_tz::Tz>()
        .map_err(|_| PulsarError::validation(format!("invalid timezone: {tz}")))
}

/// How a rotation's period length is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RotationKind {
    /// `length` counts days.
    Daily,
    /// `length` counts weeks.
    Weekly,
    /// `length` counts days with an arbitrary period.
    Custom,
}

/// A repeating assignment of an ordered participant list to consecutive
/// time slots. Rotations on the same schedule are independent lanes; the
/// first one (creation order) is the primary lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Rotation {
    pub id: RotationId,
    pub schedule_id: ScheduleId,
    pub kind: RotationKind,
    /// Number of periods (days or weeks per `kind`) each participant holds
    /// the shift. Must be positive.
    pub length: u32,
    /// First day of the rotation, in the schedule's timezone.
    pub start_date: NaiveDate,
    /// Local wall-clock time the first shift begins.
    pub start_time: NaiveTime,
    /// Local wall-clock time at which subsequent shifts hand off.
    pub handoff_time: NaiveTime,
    /// Weekly rotations only: the weekday the handoff occurs on.
    #[serde(default)]
    pub handoff_day: Option<DayOfWeek>,
    /// Ordered on-call participants.
    pub participants: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Rotation {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), PulsarError> {
        if self.length == 0 {
            return Err(PulsarError::validation("rotation length must be positive"));
        }
        if self.kind != RotationKind::Weekly && self.handoff_day.is_some() {
            return Err(PulsarError::validation(
                "handoff_day is only valid for weekly rotations",
            ));
        }
        Ok(())
    }

    /// Period length in whole days.
    #[must_use]
    pub const fn period_days(&self) -> i64 {
        match self.kind {
            RotationKind::Daily | RotationKind::Custom => self.length as i64,
            RotationKind::Weekly => 7 * self.length as i64,
        }
    }
}

/// A time-bounded manual assignment that supersedes rotation for any
/// instant inside `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ScheduleOverride {
    pub id: OverrideId,
    pub schedule_id: ScheduleId,
    pub user_id: UserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleOverride {
    /// Check that the window is non-empty.
    pub fn validate(&self) -> Result<(), PulsarError> {
        if self.end <= self.start {
            return Err(PulsarError::validation("override end must be after start"));
        }
        Ok(())
    }

    /// Whether `t` falls inside the half-open window.
    #[must_use]
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_rejects_bad_timezone() {
        let err = Schedule::new(OrgId::generate(), "primary", "Mars/Olympus", Utc::now());
        assert!(err.is_err());
    }

    #[test]
    fn schedule_parses_timezone() {
        let s = Schedule::new(OrgId::generate(), "primary", "Europe/Berlin", Utc::now()).unwrap();
        assert_eq!(s.tz().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn rotation_zero_length_invalid() {
        let r = Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Daily,
            length: 0,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            handoff_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            handoff_day: None,
            participants: vec![UserId::generate()],
            created_at: Utc::now(),
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn handoff_day_only_weekly() {
        let mut r = Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Daily,
            length: 1,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            handoff_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            handoff_day: Some(DayOfWeek::Monday),
            participants: vec![UserId::generate()],
            created_at: Utc::now(),
        };
        assert!(r.validate().is_err());
        r.kind = RotationKind::Weekly;
        r.validate().unwrap();
    }

    #[test]
    fn period_days_by_kind() {
        let mut r = Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Weekly,
            length: 2,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            handoff_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            handoff_day: None,
            participants: vec![],
            created_at: Utc::now(),
        };
        assert_eq!(r.period_days(), 14);
        r.kind = RotationKind::Custom;
        assert_eq!(r.period_days(), 2);
    }

    #[test]
    fn override_window_half_open() {
        let start = Utc::now();
        let end = start + chrono::Duration::hours(8);
        let ov = ScheduleOverride {
            id: OverrideId::generate(),
            schedule_id: ScheduleId::generate(),
            user_id: UserId::generate(),
            start,
            end,
            created_at: start,
        };
        ov.validate().unwrap();
        assert!(ov.covers(start));
        assert!(ov.covers(end - chrono::Duration::seconds(1)));
        assert!(!ov.covers(end));
    }

    #[test]
    fn override_empty_window_invalid() {
        let now = Utc::now();
        let ov = ScheduleOverride {
            id: OverrideId::generate(),
            schedule_id: ScheduleId::generate(),
            user_id: UserId::generate(),
            start: now,
            end: now,
            created_at: now,
        };
        assert!(ov.validate().is_err());
    }

    #[test]
    fn day_of_week_chrono_roundtrip() {
        for day in [
            DayOfWeek::Monday,
            DayOfWeek::Wednesday,
            DayOfWeek::Sunday,
        ] {
            assert_eq!(DayOfWeek::from_weekday(day.to_weekday()), day);
        }
    }
}
