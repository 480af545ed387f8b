//! Fixtures shared by the engine's unit tests.

use std::sync::Arc;

use crate::model::{PullRequestDraft, PullRequestId, TeamMember, TeamName, UserId};
use crate::random::StdRandom;
use crate::repository::InMemoryRepository;
use crate::service::ReviewService;

pub const TEST_SEED: u64 = 42;

pub fn member(id: &str, active: bool) -> TeamMember {
    TeamMember {
        id: UserId::from(id),
        username: id.to_uppercase(),
        active,
    }
}

pub fn draft(id: &str, author: &str) -> PullRequestDraft {
    PullRequestDraft {
        id: PullRequestId::from(id),
        name: format!("Change {}", id),
        author: UserId::from(author),
    }
}

pub fn ids(names: &[&str]) -> Vec<UserId> {
    names.iter().map(|n| UserId::from(*n)).collect()
}

pub fn seeded_service(seed: u64) -> ReviewService {
    ReviewService::new(
        Arc::new(InMemoryRepository::new()),
        Arc::new(StdRandom::seeded(seed)),
    )
}

/// A service over an in-memory repository holding one team.
pub async fn service_with_team(team: &str, members: &[(&str, bool)]) -> ReviewService {
    let service = seeded_service(TEST_SEED);
    service
        .create_team(
            TeamName::from(team),
            members
                .iter()
                .map(|(id, active)| member(id, *active))
                .collect(),
        )
        .await
        .unwrap();
    service
}
