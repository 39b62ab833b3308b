use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulsar_core::{OrgId, OverrideId, Rotation, RotationId, Schedule, ScheduleId, ScheduleOverride};

use crate::error::StoreError;

/// Port over schedules, their rotations, and their overrides.
#[async_trait]
pub trait ScheduleRepo: Send + Sync {
    async fn create(&self, schedule: Schedule) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: ScheduleId) -> Result<Schedule, StoreError>;
    async fn update(&self, schedule: Schedule) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: ScheduleId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<Schedule>, StoreError>;

    /// Attach a rotation lane to a schedule.
    async fn add_rotation(&self, rotation: Rotation) -> Result<(), StoreError>;

    /// Rotations of a schedule, ordered by creation (the first lane is
    /// primary).
    async fn rotations(&self, schedule_id: ScheduleId) -> Result<Vec<Rotation>, StoreError>;

    async fn remove_rotation(&self, id: RotationId) -> Result<(), StoreError>;

    /// Attach a manual override window.
    async fn add_override(&self, record: ScheduleOverride) -> Result<(), StoreError>;

    /// All overrides covering the instant `t`.
    async fn overrides_at(
        &self,
        schedule_id: ScheduleId,
        t: DateTime<Utc>,
    ) -> Result<Vec<ScheduleOverride>, StoreError>;

    async fn list_overrides(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<ScheduleOverride>, StoreError>;

    async fn remove_override(&self, id: OverrideId) -> Result<(), StoreError>;
}
