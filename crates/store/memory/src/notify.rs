use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;

use pulsar_core::{
    AlertId, ChannelId, ChannelKind, NotificationChannel, NotificationRecord, OrgId, RuleId,
    UserDndSettings, UserId,
};
use pulsar_store::{ChannelRepo, DndRepo, NotificationFilter, NotificationRepo, Page, StoreError};

use crate::MemoryStore;

#[async_trait]
impl ChannelRepo for MemoryStore {
    async fn create(&self, channel: NotificationChannel) -> Result<(), StoreError> {
        match self.channels.entry(channel.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "channel {} already exists",
                channel.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(channel);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: ChannelId) -> Result<NotificationChannel, StoreError> {
        self.channels
            .get(&id)
            .filter(|c| c.organization_id == org)
            .map(|c| c.clone())
            .ok_or_else(|| StoreError::not_found(format!("channel {id}")))
    }

    async fn update(&self, channel: NotificationChannel) -> Result<(), StoreError> {
        match self.channels.entry(channel.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != channel.organization_id {
                    return Err(StoreError::not_found(format!("channel {}", channel.id)));
                }
                occupied.insert(channel);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("channel {}", channel.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: ChannelId) -> Result<(), StoreError> {
        let removed = self
            .channels
            .remove_if(&id, |_, c| c.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("channel {id}")));
        }
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<NotificationChannel>, StoreError> {
        let mut channels: Vec<NotificationChannel> = self
            .channels
            .iter()
            .filter(|c| c.organization_id == org)
            .map(|c| c.clone())
            .collect();
        channels.sort_by_key(|c| c.kind);
        Ok(channels)
    }

    async fn enabled_kinds(&self, org: OrgId) -> Result<BTreeSet<ChannelKind>, StoreError> {
        Ok(self
            .channels
            .iter()
            .filter(|c| c.organization_id == org && c.enabled)
            .map(|c| c.kind)
            .collect())
    }
}

#[async_trait]
impl DndRepo for MemoryStore {
    async fn get(
        &self,
        org: OrgId,
        user_id: UserId,
    ) -> Result<Option<UserDndSettings>, StoreError> {
        Ok(self.dnd.get(&(org, user_id)).map(|s| s.clone()))
    }

    async fn upsert(&self, settings: UserDndSettings) -> Result<(), StoreError> {
        self.dnd
            .insert((settings.organization_id, settings.user_id), settings);
        Ok(())
    }

    async fn delete(&self, org: OrgId, user_id: UserId) -> Result<(), StoreError> {
        if self.dnd.remove(&(org, user_id)).is_none() {
            return Err(StoreError::not_found(format!("dnd settings for {user_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn record(&self, record: NotificationRecord) -> Result<(), StoreError> {
        match self.notification_keys.entry(record.dedup_key()) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "notification already recorded for {}",
                record.dedup_key()
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(record.id);
                self.notifications.insert(record.id, record);
                Ok(())
            }
        }
    }

    async fn exists(
        &self,
        alert_id: AlertId,
        rule_id: Option<RuleId>,
        cycle: u32,
        user_id: UserId,
        channel: ChannelKind,
    ) -> Result<bool, StoreError> {
        let key = format!(
            "{}:{}:{}:{}:{}",
            alert_id,
            rule_id.map_or_else(|| "-".to_owned(), |r| r.to_string()),
            cycle,
            user_id,
            channel
        );
        Ok(self.notification_keys.contains_key(&key))
    }

    async fn list(
        &self,
        org: OrgId,
        filter: &NotificationFilter,
    ) -> Result<Page<NotificationRecord>, StoreError> {
        let mut records: Vec<NotificationRecord> = self
            .notifications
            .iter()
            .filter(|n| {
                n.organization_id == org
                    && filter.alert_id.is_none_or(|a| n.alert_id == a)
                    && filter.user_id.is_none_or(|u| n.user_id == u)
            })
            .map(|n| n.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = records.len();
        let items = filter.page.unwrap_or_default().slice(&records);
        Ok(Page { items, total })
    }

    async fn for_alert(&self, alert_id: AlertId) -> Result<Vec<NotificationRecord>, StoreError> {
        let mut records: Vec<NotificationRecord> = self
            .notifications
            .iter()
            .filter(|n| n.alert_id == alert_id)
            .map(|n| n.clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}
