//! Reviewer assignment engine.
//!
//! Decides who reviews a pull request when it is created, swaps a single
//! reviewer on request, and repairs open pull requests when a batch of team
//! members is deactivated. Storage and randomness are injected through
//! [`ReviewRepository`] and [`RandomSource`].

pub mod assignment;
pub mod error;
pub mod model;
pub mod random;
pub mod reassignment;
pub mod reconciliation;
pub mod repository;
pub mod selector;
pub mod service;

#[cfg(test)]
mod test_support;

pub use assignment::MAX_INITIAL_REVIEWERS;
pub use error::{AssignmentError, Entity, RepositoryError};
pub use model::{
    PrStatus, PullRequest, PullRequestDraft, PullRequestId, Team, TeamMember, TeamName, User,
    UserId,
};
pub use random::{RandomSource, StdRandom};
pub use reassignment::Reassignment;
pub use reconciliation::DeactivationOutcome;
pub use repository::{ChangeSet, InMemoryRepository, ReviewRepository};
pub use selector::eligible_candidates;
pub use service::ReviewService;
