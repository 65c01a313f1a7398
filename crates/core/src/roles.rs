//! Well-known role name constants and capability resolution.
//!
//! Role names must match the values carried in the access-token `role`
//! claim. The workflow guard never inspects role strings directly; the
//! boundary resolves them once into an [`NcrActor`] capability set.

use crate::types::DbId;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_QUALITY_MANAGER: &str = "quality_manager";
pub const ROLE_SUPERVISOR: &str = "supervisor";
pub const ROLE_ENGINEER: &str = "engineer";

/// Returns `true` if the role carries quality-review authority
/// (accepting/rejecting responses and granting closure approval).
pub fn can_review_quality(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_QUALITY_MANAGER
}

/// The acting user as seen by the workflow guard.
///
/// Resolved once from the authenticated role at the API boundary so the
/// guard works against a capability flag rather than role strings.
#[derive(Debug, Clone)]
pub struct NcrActor {
    pub user_id: DbId,
    /// Whether the actor holds quality-review authority.
    pub quality_reviewer: bool,
}

impl NcrActor {
    /// Resolve an actor from a user id and role name.
    pub fn from_role(user_id: DbId, role: &str) -> Self {
        Self {
            user_id,
            quality_reviewer: can_review_quality(role),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
