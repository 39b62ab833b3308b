use async_trait::async_trait;
use dashmap::mapref::entry::Entry;

use pulsar_core::{OrgId, Organization, Team, TeamId, User, UserId};
use pulsar_store::{OrgRepo, StoreError, TeamRepo, UserRepo};

use crate::MemoryStore;

#[async_trait]
impl OrgRepo for MemoryStore {
    async fn create(&self, org: Organization) -> Result<(), StoreError> {
        match self.orgs.entry(org.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "organization {} already exists",
                org.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(org);
                Ok(())
            }
        }
    }

    async fn get(&self, id: OrgId) -> Result<Organization, StoreError> {
        self.orgs
            .get(&id)
            .map(|o| o.clone())
            .ok_or_else(|| StoreError::not_found(format!("organization {id}")))
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, user: User) -> Result<(), StoreError> {
        // Emails are unique across all organizations.
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        match self.users.entry(user.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "user {} already exists",
                user.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(user);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: UserId) -> Result<User, StoreError> {
        self.users
            .get(&id)
            .filter(|u| u.organization_id == org)
            .map(|u| u.clone())
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn update(&self, user: User) -> Result<(), StoreError> {
        match self.users.entry(user.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != user.organization_id {
                    return Err(StoreError::not_found(format!("user {}", user.id)));
                }
                occupied.insert(user);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("user {}", user.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: UserId) -> Result<(), StoreError> {
        let removed = self.users.remove_if(&id, |_, u| u.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.organization_id == org)
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}

#[async_trait]
impl TeamRepo for MemoryStore {
    async fn create(&self, team: Team) -> Result<(), StoreError> {
        if self
            .teams
            .iter()
            .any(|t| t.organization_id == team.organization_id && t.name == team.name)
        {
            return Err(StoreError::conflict(format!(
                "team name '{}' already used",
                team.name
            )));
        }
        match self.teams.entry(team.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "team {} already exists",
                team.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(team);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: TeamId) -> Result<Team, StoreError> {
        self.teams
            .get(&id)
            .filter(|t| t.organization_id == org)
            .map(|t| t.clone())
            .ok_or_else(|| StoreError::not_found(format!("team {id}")))
    }

    async fn update(&self, team: Team) -> Result<(), StoreError> {
        match self.teams.entry(team.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != team.organization_id {
                    return Err(StoreError::not_found(format!("team {}", team.id)));
                }
                occupied.insert(team);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("team {}", team.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: TeamId) -> Result<(), StoreError> {
        let removed = self.teams.remove_if(&id, |_, t| t.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("team {id}")));
        }
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<Team>, StoreError> {
        let mut teams: Vec<Team> = self
            .teams
            .iter()
            .filter(|t| t.organization_id == org)
            .map(|t| t.clone())
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }
}
