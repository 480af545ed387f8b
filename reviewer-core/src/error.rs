//! Error taxonomy for engine operations.

use thiserror::Error;

use crate::model::{PullRequestId, TeamName, UserId};

/// Storage failures surfaced by a [`ReviewRepository`](crate::repository::ReviewRepository).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// The backend failed to perform `operation`.
    #[error("storage error during {operation}: {message}")]
    Storage { operation: String, message: String },

    /// Persisted data could not be decoded.
    #[error("corrupt data in {what}")]
    Corruption { what: String },
}

impl RepositoryError {
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }
}

/// Kind of entity a [`AssignmentError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Team,
    User,
    PullRequest,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Team => "team",
            Entity::User => "user",
            Entity::PullRequest => "pull request",
        })
    }
}

/// Failure of a single engine operation.
///
/// No mutation is persisted when an operation returns one of these.
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("pull request {0} is merged")]
    InvalidState(PullRequestId),

    #[error("{reviewer} is not a reviewer of pull request {pr}")]
    NotAssigned {
        pr: PullRequestId,
        reviewer: UserId,
    },

    #[error("no active replacement candidate for pull request {0}")]
    NoCandidate(PullRequestId),

    #[error("user {0} does not belong to any team")]
    NoTeam(UserId),

    #[error("pull request {0} already exists")]
    PrExists(PullRequestId),

    #[error("team {0} already exists")]
    TeamExists(TeamName),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AssignmentError {
    pub fn team_not_found(name: &TeamName) -> Self {
        Self::NotFound {
            entity: Entity::Team,
            id: name.to_string(),
        }
    }

    pub fn user_not_found(id: &UserId) -> Self {
        Self::NotFound {
            entity: Entity::User,
            id: id.to_string(),
        }
    }

    pub fn pr_not_found(id: &PullRequestId) -> Self {
        Self::NotFound {
            entity: Entity::PullRequest,
            id: id.to_string(),
        }
    }
}
