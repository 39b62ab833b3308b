use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;

use pulsar_core::{OrgId, OverrideId, Rotation, RotationId, Schedule, ScheduleId, ScheduleOverride};
use pulsar_store::{ScheduleRepo, StoreError};

use crate::MemoryStore;

#[async_trait]
impl ScheduleRepo for MemoryStore {
    async fn create(&self, schedule: Schedule) -> Result<(), StoreError> {
        match self.schedules.entry(schedule.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "schedule {} already exists",
                schedule.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(schedule);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: ScheduleId) -> Result<Schedule, StoreError> {
        self.schedules
            .get(&id)
            .filter(|s| s.organization_id == org)
            .map(|s| s.clone())
            .ok_or_else(|| StoreError::not_found(format!("schedule {id}")))
    }

    async fn update(&self, schedule: Schedule) -> Result<(), StoreError> {
        match self.schedules.entry(schedule.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != schedule.organization_id {
                    return Err(StoreError::not_found(format!("schedule {}", schedule.id)));
                }
                occupied.insert(schedule);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("schedule {}", schedule.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: ScheduleId) -> Result<(), StoreError> {
        let removed = self
            .schedules
            .remove_if(&id, |_, s| s.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("schedule {id}")));
        }
        // Cascade the dependent lanes and windows.
        self.rotations.retain(|_, r| r.schedule_id != id);
        self.overrides.retain(|_, o| o.schedule_id != id);
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<Schedule>, StoreError> {
        let mut schedules: Vec<Schedule> = self
            .schedules
            .iter()
            .filter(|s| s.organization_id == org)
            .map(|s| s.clone())
            .collect();
        schedules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schedules)
    }

    async fn add_rotation(&self, rotation: Rotation) -> Result<(), StoreError> {
        rotation.validate().map_err(|e| StoreError::invalid(e.to_string()))?;
        if !self.schedules.contains_key(&rotation.schedule_id) {
            return Err(StoreError::not_found(format!(
                "schedule {}",
                rotation.schedule_id
            )));
        }
        self.rotations.insert(rotation.id, rotation);
        Ok(())
    }

    async fn rotations(&self, schedule_id: ScheduleId) -> Result<Vec<Rotation>, StoreError> {
        let mut rotations: Vec<Rotation> = self
            .rotations
            .iter()
            .filter(|r| r.schedule_id == schedule_id)
            .map(|r| r.clone())
            .collect();
        rotations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rotations)
    }

    async fn remove_rotation(&self, id: RotationId) -> Result<(), StoreError> {
        if self.rotations.remove(&id).is_none() {
            return Err(StoreError::not_found(format!("rotation {id}")));
        }
        Ok(())
    }

    async fn add_override(&self, record: ScheduleOverride) -> Result<(), StoreError> {
        record.validate().map_err(|e| StoreError::invalid(e.to_string()))?;
        if !self.schedules.contains_key(&record.schedule_id) {
            return Err(StoreError::not_found(format!(
                "schedule {}",
                record.schedule_id
            )));
        }
        self.overrides.insert(record.id, record);
        Ok(())
    }

    async fn overrides_at(
        &self,
        schedule_id: ScheduleId,
        t: DateTime<Utc>,
    ) -> Result<Vec<ScheduleOverride>, StoreError> {
        let mut hits: Vec<ScheduleOverride> = self
            .overrides
            .iter()
            .filter(|o| o.schedule_id == schedule_id && o.covers(t))
            .map(|o| o.clone())
            .collect();
        hits.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn list_overrides(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<ScheduleOverride>, StoreError> {
        let mut all: Vec<ScheduleOverride> = self
            .overrides
            .iter()
            .filter(|o| o.schedule_id == schedule_id)
            .map(|o| o.clone())
            .collect();
        all.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(all)
    }

    async fn remove_override(&self, id: OverrideId) -> Result<(), StoreError> {
        if self.overrides.remove(&id).is_none() {
            return Err(StoreError::not_found(format!("override {id}")));
        }
        Ok(())
    }
}
