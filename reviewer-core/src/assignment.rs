//! Initial reviewer assignment at pull request creation.

use std::collections::HashSet;

use chrono::Utc;
use tracing::info;

use crate::error::AssignmentError;
use crate::model::{PrStatus, PullRequest, PullRequestDraft, Team, UserId};
use crate::selector::eligible_candidates;
use crate::service::ReviewService;

/// Maximum number of reviewers assigned when a pull request is created.
pub const MAX_INITIAL_REVIEWERS: usize = 2;

impl ReviewService {
    /// Create a pull request with up to [`MAX_INITIAL_REVIEWERS`] reviewers
    /// drawn uniformly at random from the author's active teammates.
    ///
    /// A small team yields fewer reviewers; that is not an error.
    pub async fn assign_initial_reviewers(
        &self,
        draft: PullRequestDraft,
    ) -> Result<PullRequest, AssignmentError> {
        let _gate = self.batch_gate.read().await;
        let pr_lock = self.pr_lock(&draft.id).await;
        let _guard = pr_lock.lock().await;

        if self.repository.find_pull_request(&draft.id).await?.is_some() {
            return Err(AssignmentError::PrExists(draft.id));
        }

        let author = self.require_user(&draft.author).await?;
        let team_name = author
            .team
            .clone()
            .ok_or_else(|| AssignmentError::NoTeam(author.id.clone()))?;
        let team = self.require_team(&team_name).await?;

        let reviewers = self.initial_reviewers(&team, &author.id);

        let pr = PullRequest {
            id: draft.id,
            name: draft.name,
            author: author.id,
            status: PrStatus::Open,
            reviewers,
            created_at: Utc::now(),
            merged_at: None,
        };
        self.repository.save_pull_request(pr.clone()).await?;

        info!(
            "Created pull request {} by {} with {} reviewer(s)",
            pr.id,
            pr.author,
            pr.reviewers.len()
        );
        Ok(pr)
    }

    fn initial_reviewers(&self, team: &Team, author: &UserId) -> Vec<UserId> {
        let excluded: HashSet<&UserId> = HashSet::from([author]);
        let mut pool = eligible_candidates(&team.members, &excluded);
        self.random.shuffle(&mut pool);
        pool.truncate(MAX_INITIAL_REVIEWERS);
        pool
    }
}
