//! The review service: engine entry points over an injected repository.
//!
//! # Concurrency
//!
//! Two layers of locks keep reviewer sets consistent:
//!
//! - `batch_gate` is taken shared by every per-PR operation and exclusively by
//!   anything that changes membership or active flags (team writes,
//!   `set_user_active`, deactivation reconciliation). Their reads, reviewer
//!   repair and writes are one logical transaction relative to everything
//!   else.
//! - `pr_locks` serialize operations on the same pull request (creation,
//!   reassignment, merge). Different pull requests proceed independently.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::AssignmentError;
use crate::model::{
    PrStatus, PullRequest, PullRequestId, Team, TeamMember, TeamName, User, UserId,
};
use crate::random::RandomSource;
use crate::repository::{ChangeSet, ReviewRepository};

pub struct ReviewService {
    pub(crate) repository: Arc<dyn ReviewRepository>,
    pub(crate) random: Arc<dyn RandomSource>,
    pub(crate) batch_gate: RwLock<()>,
    pr_locks: RwLock<HashMap<PullRequestId, Arc<Mutex<()>>>>,
}

impl ReviewService {
    pub fn new(repository: Arc<dyn ReviewRepository>, random: Arc<dyn RandomSource>) -> Self {
        Self {
            repository,
            random,
            batch_gate: RwLock::new(()),
            pr_locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn ReviewRepository> {
        &self.repository
    }

    /// Get or create the lock serializing operations on one pull request.
    pub(crate) async fn pr_lock(&self, id: &PullRequestId) -> Arc<Mutex<()>> {
        {
            let locks = self.pr_locks.read().await;
            if let Some(lock) = locks.get(id) {
                return lock.clone();
            }
        }

        // Double-check after acquiring the write lock
        let mut locks = self.pr_locks.write().await;
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) async fn require_team(&self, name: &TeamName) -> Result<Team, AssignmentError> {
        self.repository
            .find_team(name)
            .await?
            .ok_or_else(|| AssignmentError::team_not_found(name))
    }

    pub(crate) async fn require_user(&self, id: &UserId) -> Result<User, AssignmentError> {
        self.repository
            .find_user(id)
            .await?
            .ok_or_else(|| AssignmentError::user_not_found(id))
    }

    pub(crate) async fn require_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<PullRequest, AssignmentError> {
        self.repository
            .find_pull_request(id)
            .await?
            .ok_or_else(|| AssignmentError::pr_not_found(id))
    }

    // =========================================================================
    // Teams and users
    // =========================================================================

    /// Create a team. Existing users listed as members are moved into it and
    /// have their name and active flag overwritten.
    pub async fn create_team(
        &self,
        name: TeamName,
        members: Vec<TeamMember>,
    ) -> Result<Team, AssignmentError> {
        let _gate = self.batch_gate.write().await;

        if self.repository.find_team(&name).await?.is_some() {
            return Err(AssignmentError::TeamExists(name));
        }

        info!("Creating team {} with {} member(s)", name, members.len());
        self.write_members(&name, Vec::new(), members).await
    }

    /// Add (or move) members into an existing team.
    pub async fn add_team_members(
        &self,
        name: &TeamName,
        members: Vec<TeamMember>,
    ) -> Result<Team, AssignmentError> {
        let _gate = self.batch_gate.write().await;

        let team = self.require_team(name).await?;
        info!("Adding {} member(s) to team {}", members.len(), name);
        self.write_members(name, team.members, members).await
    }

    /// Upsert `members` into team `name`, whose current members are
    /// `current`. The caller holds `batch_gate` exclusively.
    ///
    /// Members whose stored flag goes from active to inactive are replaced on
    /// their open reviews, drawing from the team as it will be after the
    /// write. Users, team record and repaired pull requests are committed
    /// together.
    async fn write_members(
        &self,
        name: &TeamName,
        current: Vec<User>,
        members: Vec<TeamMember>,
    ) -> Result<Team, AssignmentError> {
        let users: Vec<User> = members.into_iter().map(|m| m.into_user(name)).collect();

        let mut roster = current;
        for user in &users {
            match roster.iter_mut().find(|u| u.id == user.id) {
                Some(existing) => *existing = user.clone(),
                None => roster.push(user.clone()),
            }
        }

        let mut deactivated: Vec<UserId> = Vec::new();
        for user in roster.iter().filter(|u| !u.active) {
            if !users.iter().any(|u| u.id == user.id) {
                continue;
            }
            let was_active = self
                .repository
                .find_user(&user.id)
                .await?
                .is_some_and(|stored| stored.active);
            if was_active {
                deactivated.push(user.id.clone());
            }
        }

        let mut open_prs: BTreeMap<PullRequestId, PullRequest> = BTreeMap::new();
        for id in &deactivated {
            for pr in self.repository.list_reviews_for_user(id).await? {
                if pr.is_open() {
                    open_prs.insert(pr.id.clone(), pr);
                }
            }
        }
        let repair =
            self.repair_reviewers(&roster, &deactivated, open_prs.into_values().collect());
        if !deactivated.is_empty() {
            debug!(
                "Team {}: {} member(s) deactivated, {} PR(s) reassigned, {} unresolved",
                name,
                deactivated.len(),
                repair.reassigned.len(),
                repair.unresolved.len()
            );
        }

        self.repository
            .commit_batch(ChangeSet {
                team: Some(name.clone()),
                users,
                pull_requests: repair.changed,
            })
            .await?;
        self.require_team(name).await
    }

    pub async fn get_team(&self, name: &TeamName) -> Result<Team, AssignmentError> {
        self.require_team(name).await
    }

    /// Set a user's active flag.
    ///
    /// Deactivating a team member runs deactivation reconciliation for that
    /// user alone, so no open pull request silently keeps them as a reviewer
    /// once this returns.
    pub async fn set_user_active(
        &self,
        id: &UserId,
        active: bool,
    ) -> Result<User, AssignmentError> {
        let _gate = self.batch_gate.write().await;
        let user = self.require_user(id).await?;

        if !active {
            if let Some(team) = &user.team {
                let outcome = self
                    .reconcile_deactivation_locked(team, std::slice::from_ref(id))
                    .await?;
                debug!(
                    "Deactivated {}: {} PR(s) reassigned, {} unresolved",
                    id,
                    outcome.reassigned_prs.len(),
                    outcome.unresolved_prs.len()
                );
                return self.require_user(id).await;
            }
        }

        let updated = User { active, ..user };
        info!("Setting user {} active={}", id, active);
        self.repository.save_user(updated.clone()).await?;
        Ok(updated)
    }

    /// Every pull request (any status) the user is a reviewer of.
    pub async fn reviews_for_user(&self, id: &UserId) -> Result<Vec<PullRequest>, AssignmentError> {
        self.require_user(id).await?;
        Ok(self.repository.list_reviews_for_user(id).await?)
    }

    // =========================================================================
    // Pull request lifecycle
    // =========================================================================

    /// Mark a pull request as merged. Merging an already merged pull request
    /// returns it unchanged; `merged_at` is only ever set once.
    pub async fn merge_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<PullRequest, AssignmentError> {
        let _gate = self.batch_gate.read().await;
        let pr_lock = self.pr_lock(id).await;
        let _guard = pr_lock.lock().await;

        let mut pr = self.require_pull_request(id).await?;
        if pr.status == PrStatus::Merged {
            debug!("Pull request {} already merged", id);
            return Ok(pr);
        }

        pr.status = PrStatus::Merged;
        pr.merged_at = Some(Utc::now());
        self.repository.save_pull_request(pr.clone()).await?;
        info!("Merged pull request {}", id);
        Ok(pr)
    }
}
