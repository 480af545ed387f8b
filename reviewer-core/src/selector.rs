//! Candidate selection.
//!
//! A pure function over a team's member list: no storage access, no
//! randomness. Callers decide how to pick from the returned pool.

use std::collections::HashSet;

use crate::model::{User, UserId};

/// Return the ids of members who are active and not in `excluded`.
///
/// Output order follows `members` but callers must not depend on it.
/// An empty result means "no candidates" and is not an error.
pub fn eligible_candidates(members: &[User], excluded: &HashSet<&UserId>) -> Vec<UserId> {
    members
        .iter()
        .filter(|m| m.active && !excluded.contains(&m.id))
        .map(|m| m.id.clone())
        .collect()
}
