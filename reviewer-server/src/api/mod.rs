//! JSON API over the review engine.

pub mod error;
pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppState;

pub use error::ApiError;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/team/add", post(handlers::add_team))
        .route("/team/addMembers", post(handlers::add_team_members))
        .route("/team/get", get(handlers::get_team))
        .route("/team/deactivateMembers", post(handlers::deactivate_members))
        .route("/users/setIsActive", post(handlers::set_is_active))
        .route("/users/getReview", get(handlers::get_review))
        .route("/pullRequest/create", post(handlers::create_pull_request))
        .route("/pullRequest/merge", post(handlers::merge_pull_request))
        .route("/pullRequest/reassign", post(handlers::reassign_reviewer))
}
