//! Request and response bodies for the JSON API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reviewer_core::{DeactivationOutcome, PullRequest, Team, TeamMember, User, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberBody {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl From<TeamMemberBody> for TeamMember {
    fn from(body: TeamMemberBody) -> Self {
        TeamMember {
            id: UserId(body.user_id),
            username: body.username,
            active: body.is_active,
        }
    }
}

impl From<User> for TeamMemberBody {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username,
            is_active: user.active,
        }
    }
}

/// Body of `/team/add` and `/team/addMembers`.
#[derive(Debug, Deserialize)]
pub struct TeamMembersRequest {
    pub team_name: String,
    pub members: Vec<TeamMemberBody>,
}

#[derive(Debug, Serialize)]
pub struct TeamBody {
    pub team_name: String,
    pub members: Vec<TeamMemberBody>,
}

impl From<Team> for TeamBody {
    fn from(team: Team) -> Self {
        Self {
            team_name: team.name.0,
            members: team.members.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub team: TeamBody,
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateMembersRequest {
    pub team_name: String,
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeactivationResponse {
    pub deactivated_users: Vec<String>,
    pub reassigned_prs: Vec<String>,
    pub unresolved_prs: Vec<String>,
}

impl From<DeactivationOutcome> for DeactivationResponse {
    fn from(outcome: DeactivationOutcome) -> Self {
        Self {
            deactivated_users: outcome.deactivated.into_iter().map(|id| id.0).collect(),
            reassigned_prs: outcome.reassigned_prs.into_iter().map(|id| id.0).collect(),
            unresolved_prs: outcome.unresolved_prs.into_iter().map(|id| id.0).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user_id: String,
    pub username: String,
    pub team_name: Option<String>,
    pub is_active: bool,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username,
            team_name: user.team.map(|t| t.0),
            is_active: user.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserBody,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
}

impl From<PullRequest> for PullRequestShort {
    fn from(pr: PullRequest) -> Self {
        Self {
            pull_request_id: pr.id.0,
            pull_request_name: pr.name,
            author_id: pr.author.0,
            status: pr.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserReviewsResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergePullRequestRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequestBody {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
    pub assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mergedAt")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<PullRequest> for PullRequestBody {
    fn from(pr: PullRequest) -> Self {
        Self {
            pull_request_id: pr.id.0,
            pull_request_name: pr.name,
            author_id: pr.author.0,
            status: pr.status.as_str().to_string(),
            assigned_reviewers: pr.reviewers.into_iter().map(|r| r.0).collect(),
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
    pub pr: PullRequestBody,
}

#[derive(Debug, Serialize)]
pub struct ReassignResponse {
    pub pr: PullRequestBody,
    pub replaced_by: String,
}

/// Error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}
