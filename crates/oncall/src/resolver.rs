use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::debug;

use pulsar_core::{OrgId, PulsarError, Rotation, RotationKind, ScheduleId, UserId};
use pulsar_store::{ScheduleRepo, StoreError};

/// The answer to "who is responsible right now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCall {
    pub user_id: UserId,
    pub shift_start: DateTime<Utc>,
    pub shift_end: DateTime<Utc>,
    /// Whether a manual override produced this answer.
    pub is_override: bool,
}

/// Errors from on-call resolution.
#[derive(Debug, Error)]
pub enum OnCallError {
    /// The schedule has no responsible user at the requested instant.
    #[error("no one is on call for schedule {0}")]
    NoOnCall(ScheduleId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invalid(#[from] PulsarError),
}

/// Deterministically computes `(schedule, instant) -> user`.
///
/// Overrides win over rotation assignment; the first rotation (creation
/// order) is the primary lane. All shift arithmetic happens on local dates
/// in the schedule's IANA zone, so handoffs stay at local wall-clock time
/// across DST transitions.
pub struct OnCallResolver {
    schedules: Arc<dyn ScheduleRepo>,
}

impl OnCallResolver {
    /// Create a resolver over the schedule port.
    #[must_use]
    pub fn new(schedules: Arc<dyn ScheduleRepo>) -> Self {
        Self { schedules }
    }

    /// Resolve the on-call user for `schedule_id` at instant `t`.
    pub async fn resolve(
        &self,
        org: OrgId,
        schedule_id: ScheduleId,
        t: DateTime<Utc>,
    ) -> Result<OnCall, OnCallError> {
        let schedule = self.schedules.get(org, schedule_id).await?;

        // Overrides intersecting t win; earliest start is the tie-break.
        let overrides = self.schedules.overrides_at(schedule_id, t).await?;
        if let Some(hit) = overrides.first() {
            debug!(schedule_id = %schedule_id, user_id = %hit.user_id, "override on call");
            return Ok(OnCall {
                user_id: hit.user_id,
                shift_start: hit.start,
                shift_end: hit.end,
                is_override: true,
            });
        }

        let tz = schedule.tz()?;
        let rotations = self.schedules.rotations(schedule_id).await?;
        let Some(rotation) = rotations.first() else {
            return Err(OnCallError::NoOnCall(schedule_id));
        };

        rotation_shift(rotation, tz, t).ok_or(OnCallError::NoOnCall(schedule_id))
    }
}

/// Compute the rotation shift covering `t`, or `None` when the rotation
/// has no participants or has not started yet.
///
/// The period index counts handoff boundaries: the first shift runs from
/// the start anchor to the first handoff a full period after the start
/// (weekly lanes align the boundary to `handoff_day`); every later shift
/// spans exactly one period between handoffs at local `handoff_time`.
#[must_use]
pub fn rotation_shift(rotation: &Rotation, tz: Tz, t: DateTime<Utc>) -> Option<OnCall> {
    if rotation.participants.is_empty() {
        return None;
    }

    let local = t.with_timezone(&tz);
    let local_date = local.date_naive();
    let local_time = local.time();

    // Negative interval: t before the rotation start anchor.
    let mut days = (local_date - rotation.start_date).num_days();
    if days < 0 || (days == 0 && local_time < rotation.start_time) {
        return None;
    }

    // Day count ticks at the local handoff time.
    if local_time < rotation.handoff_time {
        days -= 1;
    }
    days = days.max(0);

    let period_days = rotation.period_days();
    let first_handoff = first_handoff_days(rotation, period_days);

    let period_index = if days < first_handoff {
        0
    } else {
        1 + (days - first_handoff) / period_days
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let participant_index = (period_index % rotation.participants.len() as i64) as usize;
    let user_id = rotation.participants[participant_index];

    let end_days = first_handoff + period_index * period_days;
    let shift_start = if period_index == 0 {
        local_datetime_to_utc(tz, rotation.start_date, rotation.start_time)
    } else {
        local_datetime_to_utc(
            tz,
            rotation.start_date + Duration::days(end_days - period_days),
            rotation.handoff_time,
        )
    };
    let shift_end = local_datetime_to_utc(
        tz,
        rotation.start_date + Duration::days(end_days),
        rotation.handoff_time,
    );

    Some(OnCall {
        user_id,
        shift_start,
        shift_end,
        is_override: false,
    })
}

/// Days from the rotation start to its first handoff boundary.
fn first_handoff_days(rotation: &Rotation, period_days: i64) -> i64 {
    if rotation.kind != RotationKind::Weekly {
        return period_days;
    }
    let Some(handoff_day) = rotation.handoff_day else {
        return period_days;
    };
    let start_dow = i64::from(rotation.start_date.weekday().num_days_from_monday());
    let handoff_dow = i64::from(handoff_day.to_weekday().num_days_from_monday());
    let offset = (handoff_dow - start_dow).rem_euclid(7);
    if offset == 0 { period_days } else { offset }
}

/// Resolve a local wall-clock datetime to UTC, absorbing DST boundaries.
/// Ambiguous times take the earlier instant; times inside a spring-forward
/// gap land on the first valid instant after it.
fn local_datetime_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        chrono::LocalResult::None => {
            // Spring-forward gap: step forward until the wall clock exists.
            let mut candidate = naive + Duration::minutes(30);
            loop {
                match tz.from_local_datetime(&candidate) {
                    chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                        return dt.with_timezone(&Utc);
                    }
                    chrono::LocalResult::None => candidate += Duration::minutes(30),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use pulsar_core::{DayOfWeek, RotationId, Schedule, ScheduleOverride};
    use pulsar_store::ScheduleRepo as _;
    use pulsar_store_memory::MemoryStore;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn weekly_rotation(participants: Vec<UserId>) -> Rotation {
        Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Weekly,
            length: 1,
            // Monday 2026-01-05.
            start_date: date(2026, 1, 5),
            start_time: time(9, 0),
            handoff_time: time(9, 0),
            handoff_day: Some(DayOfWeek::Monday),
            participants,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn weekly_first_week_is_first_participant() {
        let users: Vec<UserId> = (0..3).map(|_| UserId::generate()).collect();
        let rotation = weekly_rotation(users.clone());
        // Thursday 10:00 UTC of the first week.
        let shift = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 8, 10, 0)).unwrap();
        assert_eq!(shift.user_id, users[0]);
        assert!(!shift.is_override);
        assert_eq!(shift.shift_start, utc(2026, 1, 5, 9, 0));
        assert_eq!(shift.shift_end, utc(2026, 1, 12, 9, 0));
    }

    #[test]
    fn weekly_cycles_through_participants() {
        let users: Vec<UserId> = (0..3).map(|_| UserId::generate()).collect();
        let rotation = weekly_rotation(users.clone());
        // Week 2 -> users[1], week 3 -> users[2], week 4 -> users[0] again.
        let week2 = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 14, 12, 0)).unwrap();
        assert_eq!(week2.user_id, users[1]);
        let week3 = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 21, 12, 0)).unwrap();
        assert_eq!(week3.user_id, users[2]);
        let week4 = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 28, 12, 0)).unwrap();
        assert_eq!(week4.user_id, users[0]);
    }

    #[test]
    fn handoff_boundary_is_exact() {
        let users: Vec<UserId> = (0..2).map(|_| UserId::generate()).collect();
        let rotation = weekly_rotation(users.clone());
        // Monday 2026-01-12 08:59 is still week 1; 09:00 is week 2.
        let before = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 12, 8, 59)).unwrap();
        assert_eq!(before.user_id, users[0]);
        let after = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 12, 9, 0)).unwrap();
        assert_eq!(after.user_id, users[1]);
    }

    #[test]
    fn before_start_has_no_oncall() {
        let rotation = weekly_rotation(vec![UserId::generate()]);
        assert!(rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 4, 12, 0)).is_none());
        // Start day but before the start time.
        assert!(rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 5, 8, 59)).is_none());
        assert!(rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 5, 9, 0)).is_some());
    }

    #[test]
    fn empty_participants_has_no_oncall() {
        let rotation = weekly_rotation(vec![]);
        assert!(rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 8, 10, 0)).is_none());
    }

    #[test]
    fn daily_rotation_advances_each_day() {
        let users: Vec<UserId> = (0..3).map(|_| UserId::generate()).collect();
        let rotation = Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Daily,
            length: 1,
            start_date: date(2026, 3, 2),
            start_time: time(8, 0),
            handoff_time: time(8, 0),
            handoff_day: None,
            participants: users.clone(),
            created_at: Utc::now(),
        };
        let d0 = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 3, 2, 12, 0)).unwrap();
        assert_eq!(d0.user_id, users[0]);
        let d1 = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 3, 3, 12, 0)).unwrap();
        assert_eq!(d1.user_id, users[1]);
        // Before the 08:00 handoff the previous shift still holds.
        let d1_early = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 3, 3, 7, 59)).unwrap();
        assert_eq!(d1_early.user_id, users[0]);
        let d3 = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 3, 5, 12, 0)).unwrap();
        assert_eq!(d3.user_id, users[0]);
    }

    #[test]
    fn custom_rotation_uses_explicit_length() {
        let users: Vec<UserId> = (0..2).map(|_| UserId::generate()).collect();
        let rotation = Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Custom,
            length: 3,
            start_date: date(2026, 3, 2),
            start_time: time(0, 0),
            handoff_time: time(0, 0),
            handoff_day: None,
            participants: users.clone(),
            created_at: Utc::now(),
        };
        let first = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 3, 4, 12, 0)).unwrap();
        assert_eq!(first.user_id, users[0]);
        let second = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 3, 5, 12, 0)).unwrap();
        assert_eq!(second.user_id, users[1]);
    }

    #[test]
    fn dst_spring_forward_keeps_local_handoff() {
        // US DST: clocks jump forward on 2026-03-08 in America/New_York.
        let users: Vec<UserId> = (0..2).map(|_| UserId::generate()).collect();
        let rotation = Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Daily,
            length: 1,
            start_date: date(2026, 3, 6),
            start_time: time(9, 0),
            handoff_time: time(9, 0),
            handoff_day: None,
            participants: users,
            created_at: Utc::now(),
        };
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2026-03-07 20:00 local, inside the shift that spans the 02:00 jump.
        let t = utc(2026, 3, 8, 1, 0);
        let shift = rotation_shift(&rotation, tz, t).unwrap();
        // Both boundaries sit at 09:00 local wall-clock time.
        assert_eq!(shift.shift_start.with_timezone(&tz).time(), time(9, 0));
        assert_eq!(shift.shift_end.with_timezone(&tz).time(), time(9, 0));
        // The shift wrapping the jump is an hour short in absolute terms.
        assert_eq!(shift.shift_end - shift.shift_start, Duration::hours(23));
    }

    #[test]
    fn weekly_handoff_day_aligns_first_boundary() {
        // Start Wednesday, handoff on Monday: the first period is short.
        let users: Vec<UserId> = (0..2).map(|_| UserId::generate()).collect();
        let rotation = Rotation {
            id: RotationId::generate(),
            schedule_id: ScheduleId::generate(),
            kind: RotationKind::Weekly,
            length: 1,
            // Wednesday 2026-01-07.
            start_date: date(2026, 1, 7),
            start_time: time(9, 0),
            handoff_time: time(9, 0),
            handoff_day: Some(DayOfWeek::Monday),
            participants: users.clone(),
            created_at: Utc::now(),
        };
        // Friday of the start week: still the first participant.
        let friday = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 9, 12, 0)).unwrap();
        assert_eq!(friday.user_id, users[0]);
        // Monday 2026-01-12 10:00: first handoff happened at 09:00.
        let monday = rotation_shift(&rotation, chrono_tz::UTC, utc(2026, 1, 12, 10, 0)).unwrap();
        assert_eq!(monday.user_id, users[1]);
        assert_eq!(monday.shift_start, utc(2026, 1, 12, 9, 0));
        assert_eq!(monday.shift_end, utc(2026, 1, 19, 9, 0));
    }

    #[test]
    fn start_date_weekday_sanity() {
        assert_eq!(date(2026, 1, 5).weekday(), Weekday::Mon);
        assert_eq!(date(2026, 1, 7).weekday(), Weekday::Wed);
    }

    async fn seeded_schedule() -> (Arc<MemoryStore>, OrgId, ScheduleId, Vec<UserId>) {
        let store = Arc::new(MemoryStore::new());
        let org = OrgId::generate();
        let schedule = Schedule::new(org, "primary", "UTC", Utc::now()).unwrap();
        let schedule_id = schedule.id;
        store.create(schedule).await.unwrap();
        let users: Vec<UserId> = (0..3).map(|_| UserId::generate()).collect();
        let mut rotation = weekly_rotation(users.clone());
        rotation.schedule_id = schedule_id;
        store.add_rotation(rotation).await.unwrap();
        (store, org, schedule_id, users)
    }

    #[tokio::test]
    async fn resolver_uses_primary_rotation() {
        let (store, org, schedule_id, users) = seeded_schedule().await;
        let resolver = OnCallResolver::new(store);
        let oncall = resolver
            .resolve(org, schedule_id, utc(2026, 1, 8, 10, 0))
            .await
            .unwrap();
        assert_eq!(oncall.user_id, users[0]);
        assert!(!oncall.is_override);
    }

    #[tokio::test]
    async fn override_wins_and_reports_window() {
        let (store, org, schedule_id, users) = seeded_schedule().await;
        let substitute = UserId::generate();
        // Thursday 09:00-17:00.
        let ov = ScheduleOverride {
            id: pulsar_core::OverrideId::generate(),
            schedule_id,
            user_id: substitute,
            start: utc(2026, 1, 8, 9, 0),
            end: utc(2026, 1, 8, 17, 0),
            created_at: Utc::now(),
        };
        store.add_override(ov).await.unwrap();
        let resolver = OnCallResolver::new(store);

        let inside = resolver
            .resolve(org, schedule_id, utc(2026, 1, 8, 10, 0))
            .await
            .unwrap();
        assert_eq!(inside.user_id, substitute);
        assert!(inside.is_override);
        assert_eq!(inside.shift_start, utc(2026, 1, 8, 9, 0));
        assert_eq!(inside.shift_end, utc(2026, 1, 8, 17, 0));

        let outside = resolver
            .resolve(org, schedule_id, utc(2026, 1, 8, 18, 0))
            .await
            .unwrap();
        assert_eq!(outside.user_id, users[0]);
    }

    #[tokio::test]
    async fn overlapping_overrides_earliest_start_wins() {
        let (store, org, schedule_id, _) = seeded_schedule().await;
        let early = UserId::generate();
        let late = UserId::generate();
        for (user, start_h) in [(late, 9), (early, 8)] {
            store
                .add_override(ScheduleOverride {
                    id: pulsar_core::OverrideId::generate(),
                    schedule_id,
                    user_id: user,
                    start: utc(2026, 1, 8, start_h, 0),
                    end: utc(2026, 1, 8, 17, 0),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let resolver = OnCallResolver::new(store);
        let oncall = resolver
            .resolve(org, schedule_id, utc(2026, 1, 8, 10, 0))
            .await
            .unwrap();
        assert_eq!(oncall.user_id, early);
    }

    #[tokio::test]
    async fn schedule_without_rotations_errors() {
        let store = Arc::new(MemoryStore::new());
        let org = OrgId::generate();
        let schedule = Schedule::new(org, "empty", "UTC", Utc::now()).unwrap();
        let schedule_id = schedule.id;
        store.create(schedule).await.unwrap();
        let resolver = OnCallResolver::new(store);
        let err = resolver
            .resolve(org, schedule_id, utc(2026, 1, 8, 10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, OnCallError::NoOnCall(id) if id == schedule_id));
    }
}
