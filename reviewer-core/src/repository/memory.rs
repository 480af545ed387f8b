//! In-memory implementation of `ReviewRepository`.
//!
//! All state is held in memory and lost on restart. Used by tests and by
//! anything that wants the engine without a database.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ChangeSet, ReviewRepository};
use crate::error::RepositoryError;
use crate::model::{PullRequest, PullRequestId, Team, TeamName, User, UserId};

#[derive(Default)]
struct Tables {
    teams: BTreeSet<TeamName>,
    users: BTreeMap<UserId, User>,
    pull_requests: BTreeMap<PullRequestId, PullRequest>,
}

impl Tables {
    fn members_of(&self, team: &TeamName) -> Vec<User> {
        self.users
            .values()
            .filter(|u| u.team.as_ref() == Some(team))
            .cloned()
            .collect()
    }

    fn is_member(&self, id: &UserId, team: &TeamName) -> bool {
        self.users
            .get(id)
            .is_some_and(|u| u.team.as_ref() == Some(team))
    }
}

/// In-memory review repository.
///
/// All tables sit behind one `RwLock`, so every write method is atomic.
/// `BTreeMap` keeps listings in id order.
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewRepository for InMemoryRepository {
    async fn find_team(&self, name: &TeamName) -> Result<Option<Team>, RepositoryError> {
        let tables = self.tables.read().await;
        if !tables.teams.contains(name) {
            return Ok(None);
        }
        Ok(Some(Team {
            name: name.clone(),
            members: tables.members_of(name),
        }))
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(id).cloned())
    }

    async fn find_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.pull_requests.get(id).cloned())
    }

    async fn list_open_pull_requests(
        &self,
        team: &TeamName,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .pull_requests
            .values()
            .filter(|pr| pr.is_open())
            .filter(|pr| {
                tables.is_member(&pr.author, team)
                    || pr.reviewers.iter().any(|r| tables.is_member(r, team))
            })
            .cloned()
            .collect())
    }

    async fn list_reviews_for_user(
        &self,
        id: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .pull_requests
            .values()
            .filter(|pr| pr.has_reviewer(id))
            .cloned()
            .collect())
    }

    async fn save_user(&self, user: User) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn save_pull_request(&self, pr: PullRequest) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.pull_requests.insert(pr.id.clone(), pr);
        Ok(())
    }

    async fn commit_batch(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if let Some(team) = changes.team {
            tables.teams.insert(team);
        }
        for user in changes.users {
            tables.users.insert(user.id.clone(), user);
        }
        for pr in changes.pull_requests {
            tables.pull_requests.insert(pr.id.clone(), pr);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrStatus;
    use chrono::Utc;

    fn user(id: &str, team: Option<&str>) -> User {
        User {
            id: UserId::from(id),
            username: id.to_uppercase(),
            active: true,
            team: team.map(TeamName::from),
        }
    }

    fn pr(id: &str, author: &str, reviewers: &[&str], status: PrStatus) -> PullRequest {
        PullRequest {
            id: PullRequestId::from(id),
            name: format!("PR {}", id),
            author: UserId::from(author),
            status,
            reviewers: reviewers.iter().map(|r| UserId::from(*r)).collect(),
            created_at: Utc::now(),
            merged_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_team_returns_none_for_missing() {
        let repo = InMemoryRepository::new();
        let result = repo.find_team(&TeamName::from("nope")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_team_exists() {
        let repo = InMemoryRepository::new();
        let name = TeamName::from("backend");
        repo.save_team(&name, vec![]).await.unwrap();

        let team = repo.find_team(&name).await.unwrap().unwrap();
        assert!(team.members.is_empty());
    }

    #[tokio::test]
    async fn test_save_team_lists_only_its_members() {
        let repo = InMemoryRepository::new();
        let backend = TeamName::from("backend");
        let frontend = TeamName::from("frontend");
        repo.save_team(
            &backend,
            vec![user("u1", Some("backend")), user("u2", Some("backend"))],
        )
        .await
        .unwrap();
        repo.save_team(&frontend, vec![user("u3", Some("frontend"))])
            .await
            .unwrap();

        let team = repo.find_team(&backend).await.unwrap().unwrap();
        let ids: Vec<_> = team.members.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn test_moving_user_changes_membership() {
        let repo = InMemoryRepository::new();
        let backend = TeamName::from("backend");
        let frontend = TeamName::from("frontend");
        repo.save_team(&backend, vec![user("u1", Some("backend"))])
            .await
            .unwrap();
        repo.save_team(&frontend, vec![user("u1", Some("frontend"))])
            .await
            .unwrap();

        assert!(repo
            .find_team(&backend)
            .await
            .unwrap()
            .unwrap()
            .members
            .is_empty());
        assert!(repo
            .find_team(&frontend)
            .await
            .unwrap()
            .unwrap()
            .has_member(&UserId::from("u1")));
    }

    #[tokio::test]
    async fn test_list_open_pull_requests_filters_status_and_team() {
        let repo = InMemoryRepository::new();
        let backend = TeamName::from("backend");
        repo.save_team(
            &backend,
            vec![user("u1", Some("backend")), user("u2", Some("backend"))],
        )
        .await
        .unwrap();
        repo.save_user(user("x1", None)).await.unwrap();

        repo.save_pull_request(pr("pr-b", "u1", &["u2"], PrStatus::Open))
            .await
            .unwrap();
        repo.save_pull_request(pr("pr-a", "x1", &["u2"], PrStatus::Open))
            .await
            .unwrap();
        repo.save_pull_request(pr("pr-m", "u1", &["u2"], PrStatus::Merged))
            .await
            .unwrap();
        repo.save_pull_request(pr("pr-x", "x1", &[], PrStatus::Open))
            .await
            .unwrap();

        let open = repo.list_open_pull_requests(&backend).await.unwrap();
        let ids: Vec<_> = open.iter().map(|p| p.id.0.as_str()).collect();
        assert_eq!(ids, vec!["pr-a", "pr-b"]);
    }

    #[tokio::test]
    async fn test_list_reviews_for_user_includes_merged() {
        let repo = InMemoryRepository::new();
        repo.save_pull_request(pr("pr-1", "u1", &["u2"], PrStatus::Open))
            .await
            .unwrap();
        repo.save_pull_request(pr("pr-2", "u1", &["u2", "u3"], PrStatus::Merged))
            .await
            .unwrap();
        repo.save_pull_request(pr("pr-3", "u1", &["u3"], PrStatus::Open))
            .await
            .unwrap();

        let reviews = repo
            .list_reviews_for_user(&UserId::from("u2"))
            .await
            .unwrap();
        let ids: Vec<_> = reviews.iter().map(|p| p.id.0.as_str()).collect();
        assert_eq!(ids, vec!["pr-1", "pr-2"]);
    }

    #[tokio::test]
    async fn test_commit_batch_applies_all_writes() {
        let repo = InMemoryRepository::new();
        let mut inactive = user("u2", Some("backend"));
        inactive.active = false;

        repo.commit_batch(ChangeSet {
            team: Some(TeamName::from("backend")),
            users: vec![inactive],
            pull_requests: vec![pr("pr-1", "u1", &["u3"], PrStatus::Open)],
        })
        .await
        .unwrap();

        let team = repo
            .find_team(&TeamName::from("backend"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(team.members.len(), 1);

        assert!(!repo
            .find_user(&UserId::from("u2"))
            .await
            .unwrap()
            .unwrap()
            .active);
        assert!(repo
            .find_pull_request(&PullRequestId::from("pr-1"))
            .await
            .unwrap()
            .is_some());
    }
}
