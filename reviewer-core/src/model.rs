//! Domain types for teams, users and pull requests.
//!
//! The engine never owns storage: these are plain values read from and
//! written back to a [`ReviewRepository`](crate::repository::ReviewRepository).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Newtype for a user identifier to prevent mixing with other strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a team's unique name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamName(pub String);

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TeamName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TeamName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a pull request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestId(pub String);

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PullRequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PullRequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A user as stored in the membership store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub active: bool,
    /// The team this user currently belongs to, if any.
    pub team: Option<TeamName>,
}

/// Membership data supplied when creating a team or adding members to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: UserId,
    pub username: String,
    pub active: bool,
}

impl TeamMember {
    /// The user record this member becomes once it joins `team`.
    pub fn into_user(self, team: &TeamName) -> User {
        User {
            id: self.id,
            username: self.username,
            active: self.active,
            team: Some(team.clone()),
        }
    }
}

/// A team together with its current members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: TeamName,
    pub members: Vec<User>,
}

impl Team {
    pub fn has_member(&self, id: &UserId) -> bool {
        self.members.iter().any(|m| &m.id == id)
    }
}

/// Lifecycle state of a pull request. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl PrStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
        }
    }

    /// Parse the stored representation. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(PrStatus::Open),
            "MERGED" => Some(PrStatus::Merged),
            _ => None,
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for pull request creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub id: PullRequestId,
    pub name: String,
    pub author: UserId,
}

/// A pull request and its current reviewer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PullRequestId,
    pub name: String,
    pub author: UserId,
    pub status: PrStatus,
    /// Unordered, duplicate-free. Order is only kept for stable display.
    pub reviewers: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.status == PrStatus::Open
    }

    pub fn has_reviewer(&self, id: &UserId) -> bool {
        self.reviewers.contains(id)
    }

    /// Swap `old` for `new` in place, keeping the reviewer count unchanged.
    ///
    /// Returns `false` (and leaves the set untouched) if `old` is not a
    /// reviewer or `new` already is one.
    pub fn replace_reviewer(&mut self, old: &UserId, new: UserId) -> bool {
        if self.has_reviewer(&new) {
            return false;
        }
        match self.reviewers.iter().position(|r| r == old) {
            Some(slot) => {
                self.reviewers[slot] = new;
                true
            }
            None => false,
        }
    }
}
