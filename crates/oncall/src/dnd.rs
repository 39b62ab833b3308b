use chrono::{DateTime, Utc};
use tracing::warn;

use pulsar_core::{DayOfWeek, Priority, UserDndSettings};

/// Decide whether a notification to the user should be suppressed at `t`.
///
/// Rules, in order: absent/disabled settings never suppress; P1 bypasses
/// when `allow_p1_override` is set; an active absolute override suppresses;
/// otherwise the weekly slots are checked against the user's local weekday
/// and time of day. An invalid stored timezone fails open (not suppressed)
/// and is logged.
#[must_use]
pub fn is_suppressed(
    settings: Option<&UserDndSettings>,
    priority: Priority,
    t: DateTime<Utc>,
) -> bool {
    let Some(settings) = settings else {
        return false;
    };
    if !settings.enabled {
        return false;
    }
    if priority == Priority::P1 && settings.allow_p1_override {
        return false;
    }
    if settings.overrides.iter().any(|o| o.covers(t)) {
        return true;
    }

    let Ok(tz) = settings.timezone.parse::<chrono_tz::Tz>() else {
        warn!(
            user_id = %settings.user_id,
            timezone = %settings.timezone,
            "invalid DND timezone, not suppressing"
        );
        return false;
    };
    let local = t.with_timezone(&tz);
    let weekday = DayOfWeek::from_weekday(chrono::Datelike::weekday(&local));
    let time = local.time();

    settings
        .weekly_slots
        .iter()
        .any(|slot| slot.contains(weekday, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use pulsar_core::{DndOverride, OrgId, UserId, WeeklySlot};

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn weeknight_settings(allow_p1: bool) -> UserDndSettings {
        // Mon-Fri 22:00-07:00 in Berlin.
        let slots = [
            DayOfWeek::Monday,
            DayOfWeek::Tuesday,
            DayOfWeek::Wednesday,
            DayOfWeek::Thursday,
            DayOfWeek::Friday,
        ]
        .into_iter()
        .map(|day| WeeklySlot {
            day,
            start: time(22, 0),
            end: time(7, 0),
        })
        .collect();
        UserDndSettings {
            user_id: UserId::generate(),
            organization_id: OrgId::generate(),
            enabled: true,
            timezone: "Europe/Berlin".into(),
            weekly_slots: slots,
            overrides: vec![],
            allow_p1_override: allow_p1,
            updated_at: Utc::now(),
        }
    }

    /// Wednesday 2026-01-07 23:00 Berlin time.
    fn wednesday_night() -> DateTime<Utc> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2026, 1, 7, 23, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn absent_settings_do_not_suppress() {
        assert!(!is_suppressed(None, Priority::P3, Utc::now()));
    }

    #[test]
    fn disabled_settings_do_not_suppress() {
        let mut settings = weeknight_settings(false);
        settings.enabled = false;
        assert!(!is_suppressed(Some(&settings), Priority::P3, wednesday_night()));
    }

    #[test]
    fn weeknight_suppresses_p3_but_not_p1() {
        let settings = weeknight_settings(true);
        assert!(is_suppressed(Some(&settings), Priority::P3, wednesday_night()));
        assert!(!is_suppressed(Some(&settings), Priority::P1, wednesday_night()));
    }

    #[test]
    fn p1_suppressed_without_override_flag() {
        let settings = weeknight_settings(false);
        assert!(is_suppressed(Some(&settings), Priority::P1, wednesday_night()));
    }

    #[test]
    fn overnight_slot_covers_early_morning() {
        let settings = weeknight_settings(false);
        // Thursday 03:00 Berlin: covered by Wednesday's overnight slot.
        let t = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2026, 1, 8, 3, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(is_suppressed(Some(&settings), Priority::P4, t));
    }

    #[test]
    fn daytime_not_suppressed() {
        let settings = weeknight_settings(false);
        let t = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2026, 1, 7, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(!is_suppressed(Some(&settings), Priority::P3, t));
    }

    #[test]
    fn absolute_override_suppresses_any_priority_without_flag() {
        let mut settings = weeknight_settings(false);
        let start = Utc::now();
        settings.overrides.push(DndOverride {
            start,
            end: start + chrono::Duration::hours(4),
            reason: Some("vacation".into()),
        });
        assert!(is_suppressed(
            Some(&settings),
            Priority::P1,
            start + chrono::Duration::hours(1)
        ));
    }

    #[test]
    fn p1_override_flag_beats_absolute_override() {
        let mut settings = weeknight_settings(true);
        let start = Utc::now();
        settings.overrides.push(DndOverride {
            start,
            end: start + chrono::Duration::hours(4),
            reason: None,
        });
        assert!(!is_suppressed(
            Some(&settings),
            Priority::P1,
            start + chrono::Duration::hours(1)
        ));
        assert!(is_suppressed(
            Some(&settings),
            Priority::P2,
            start + chrono::Duration::hours(1)
        ));
    }

    #[test]
    fn invalid_timezone_fails_open() {
        let mut settings = weeknight_settings(false);
        settings.timezone = "Not/A/Zone".into();
        assert!(!is_suppressed(Some(&settings), Priority::P3, wednesday_night()));
    }

    #[test]
    fn slot_ends_are_inclusive() {
        let mut settings = weeknight_settings(false);
        settings.weekly_slots = vec![WeeklySlot {
            day: DayOfWeek::Wednesday,
            start: time(9, 0),
            end: time(17, 0),
        }];
        let at_end = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2026, 1, 7, 17, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(is_suppressed(Some(&settings), Priority::P3, at_end));
        let past_end = at_end + chrono::Duration::minutes(1);
        assert!(!is_suppressed(Some(&settings), Priority::P3, past_end));
    }
}
