use async_trait::async_trait;
use pulsar_core::{OrgId, Organization, Team, TeamId, User, UserId};

use crate::error::StoreError;

/// Port over organization records.
#[async_trait]
pub trait OrgRepo: Send + Sync {
    async fn create(&self, org: Organization) -> Result<(), StoreError>;
    async fn get(&self, id: OrgId) -> Result<Organization, StoreError>;
}

/// Port over user records. Emails are unique globally.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, user: User) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: UserId) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn update(&self, user: User) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: UserId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<User>, StoreError>;
}

/// Port over team records. Names are unique within an organization.
#[async_trait]
pub trait TeamRepo: Send + Sync {
    async fn create(&self, team: Team) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: TeamId) -> Result<Team, StoreError>;
    async fn update(&self, team: Team) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: TeamId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<Team>, StoreError>;
}
