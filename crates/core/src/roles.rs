//! Well-known role name constants.
//!
//! These must match the `CHECK` constraint on `users.role`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_AGENT: &str = "agent";

/// All roles an audit rule can target.
pub const ALL_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_MANAGER, ROLE_AGENT];

/// Whether `role` is a known role name.
pub fn is_valid_role(role: &str) -> bool {
    ALL_ROLES.contains(&role)
}
