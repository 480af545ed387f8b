use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use reviewer_core::{PullRequestDraft, PullRequestId, TeamName, UserId};

use super::error::ApiError;
use super::types::*;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Handler: POST /team/add
pub async fn add_team(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TeamMembersRequest>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    let members = body.members.into_iter().map(Into::into).collect();
    let team = state
        .service
        .create_team(TeamName(body.team_name), members)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TeamResponse { team: team.into() }),
    ))
}

/// Handler: POST /team/addMembers
pub async fn add_team_members(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TeamMembersRequest>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    let members = body.members.into_iter().map(Into::into).collect();
    let team = state
        .service
        .add_team_members(&TeamName(body.team_name), members)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TeamResponse { team: team.into() }),
    ))
}

/// Handler: GET /team/get?team_name=...
pub async fn get_team(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TeamQuery>,
) -> ApiResult<Json<TeamBody>> {
    let team = state.service.get_team(&TeamName(query.team_name)).await?;
    Ok(Json(team.into()))
}

/// Handler: POST /team/deactivateMembers
///
/// Bulk deactivation followed by reassignment of every affected open pull
/// request. Pull requests for which no replacement exists are reported in
/// `unresolved_prs`.
pub async fn deactivate_members(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeactivateMembersRequest>,
) -> ApiResult<Json<DeactivationResponse>> {
    let user_ids: Vec<UserId> = body.user_ids.into_iter().map(UserId).collect();
    let outcome = state
        .service
        .reconcile_deactivation(&TeamName(body.team_name), &user_ids)
        .await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /users/setIsActive
pub async fn set_is_active(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetIsActiveRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .service
        .set_user_active(&UserId(body.user_id), body.is_active)
        .await?;
    Ok(Json(UserResponse { user: user.into() }))
}

/// Handler: GET /users/getReview?user_id=...
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<UserReviewsResponse>> {
    let user_id = UserId(query.user_id);
    let prs = state.service.reviews_for_user(&user_id).await?;
    Ok(Json(UserReviewsResponse {
        user_id: user_id.0,
        pull_requests: prs.into_iter().map(Into::into).collect(),
    }))
}

/// Handler: POST /pullRequest/create
pub async fn create_pull_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePullRequestRequest>,
) -> ApiResult<(StatusCode, Json<PullRequestResponse>)> {
    let draft = PullRequestDraft {
        id: PullRequestId(body.pull_request_id),
        name: body.pull_request_name,
        author: UserId(body.author_id),
    };
    let pr = state.service.assign_initial_reviewers(draft).await?;
    Ok((StatusCode::CREATED, Json(PullRequestResponse { pr: pr.into() })))
}

/// Handler: POST /pullRequest/merge
pub async fn merge_pull_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MergePullRequestRequest>,
) -> ApiResult<Json<PullRequestResponse>> {
    let pr = state
        .service
        .merge_pull_request(&PullRequestId(body.pull_request_id))
        .await?;
    Ok(Json(PullRequestResponse { pr: pr.into() }))
}

/// Handler: POST /pullRequest/reassign
pub async fn reassign_reviewer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReassignRequest>,
) -> ApiResult<Json<ReassignResponse>> {
    let result = state
        .service
        .reassign_reviewer(
            &PullRequestId(body.pull_request_id),
            &UserId(body.old_user_id),
        )
        .await?;
    Ok(Json(ReassignResponse {
        pr: result.pull_request.into(),
        replaced_by: result.replaced_by.0,
    }))
}
