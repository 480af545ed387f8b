//! Repository abstraction for teams, users and pull requests.
//!
//! This module defines the `ReviewRepository` trait that the engine reads
//! and writes through. Implementations provide the actual storage backend
//! (in-memory here, SQLite in the server crate).

mod memory;

pub use memory::InMemoryRepository;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::model::{PullRequest, PullRequestId, Team, TeamName, User, UserId};

/// Writes applied together by [`ReviewRepository::commit_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Team record to create if it does not exist yet.
    pub team: Option<TeamName>,
    pub users: Vec<User>,
    pub pull_requests: Vec<PullRequest>,
}

/// Storage collaborator for the assignment engine.
///
/// Every write method is a transactional upsert: either all of its changes
/// become visible or none do.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Get a team and its members, returning None if not found.
    async fn find_team(&self, name: &TeamName) -> Result<Option<Team>, RepositoryError>;

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, RepositoryError>;

    /// All OPEN pull requests touching `team`: the author or any reviewer is
    /// currently a member. Sorted by id.
    async fn list_open_pull_requests(
        &self,
        team: &TeamName,
    ) -> Result<Vec<PullRequest>, RepositoryError>;

    /// Pull requests of any status whose reviewer set contains `id`. Sorted by id.
    async fn list_reviews_for_user(&self, id: &UserId)
        -> Result<Vec<PullRequest>, RepositoryError>;

    /// Create the team record if needed and upsert `members` into it.
    async fn save_team(&self, name: &TeamName, members: Vec<User>) -> Result<(), RepositoryError> {
        self.commit_batch(ChangeSet {
            team: Some(name.clone()),
            users: members,
            pull_requests: Vec::new(),
        })
        .await
    }

    async fn save_user(&self, user: User) -> Result<(), RepositoryError>;

    async fn save_pull_request(&self, pr: PullRequest) -> Result<(), RepositoryError>;

    /// Apply a whole change set in a single transaction: create the team,
    /// then upsert users, then upsert pull requests.
    async fn commit_batch(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}
