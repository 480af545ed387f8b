//! Single reviewer replacement on an open pull request.

use std::collections::HashSet;

use tracing::info;

use crate::error::AssignmentError;
use crate::model::{PullRequest, PullRequestId, UserId};
use crate::selector::eligible_candidates;
use crate::service::ReviewService;

/// Result of a successful reassignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub pull_request: PullRequest,
    pub replaced_by: UserId,
}

impl ReviewService {
    /// Replace `old_reviewer` on an open pull request with a random eligible
    /// member of the old reviewer's team.
    ///
    /// Preconditions are checked in order: the pull request exists, it is
    /// open, `old_reviewer` is assigned to it, and `old_reviewer` belongs to a
    /// team. On any error the pull request is left unchanged.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &PullRequestId,
        old_reviewer: &UserId,
    ) -> Result<Reassignment, AssignmentError> {
        let _gate = self.batch_gate.read().await;
        let pr_lock = self.pr_lock(pr_id).await;
        let _guard = pr_lock.lock().await;

        let mut pr = self.require_pull_request(pr_id).await?;
        if !pr.is_open() {
            return Err(AssignmentError::InvalidState(pr.id));
        }
        if !pr.has_reviewer(old_reviewer) {
            return Err(AssignmentError::NotAssigned {
                pr: pr.id,
                reviewer: old_reviewer.clone(),
            });
        }

        let old = self.require_user(old_reviewer).await?;
        let team_name = old
            .team
            .ok_or_else(|| AssignmentError::NoTeam(old_reviewer.clone()))?;
        let team = self.require_team(&team_name).await?;

        let pool = {
            let excluded: HashSet<&UserId> =
                std::iter::once(&pr.author).chain(&pr.reviewers).collect();
            eligible_candidates(&team.members, &excluded)
        };
        let replacement = self
            .random
            .pick(&pool)
            .ok_or_else(|| AssignmentError::NoCandidate(pr.id.clone()))?;

        pr.replace_reviewer(old_reviewer, replacement.clone());
        self.repository.save_pull_request(pr.clone()).await?;

        info!(
            "Reassigned pull request {}: {} -> {}",
            pr.id, old_reviewer, replacement
        );
        Ok(Reassignment {
            pull_request: pr,
            replaced_by: replacement,
        })
    }
}
