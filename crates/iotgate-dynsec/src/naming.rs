//! Role and topic naming for Apps and Device memberships.
//!
//! # Purpose
//! Provides the canonical role names and ACL topic patterns used by every
//! command the synchronizer emits.
//!
//! # Key invariants
//! - Unrestricted Apps share one role; a restricted App owns `$apps_{app_id}`.
//! - Membership topics are wildcard patterns scoped to one device, never
//!   literal topics.
//! - Nothing here performs I/O.
//!
//! # Common pitfalls
//! - Building these strings by hand drifts from what the broker already holds.
//! - Device ids are not escaped; a device id containing `/`, `+` or `#`
//!   produces a broader pattern. Validate device ids where they are created.
use crate::errors::{SyncError, SyncResult};

/// Role bound to every unrestricted App client.
pub const SHARED_ROLE: &str = "$apps";
/// Prefix of the exclusive role owned by a restricted App.
pub const EXCLUSIVE_ROLE_PREFIX: &str = "$apps_";
/// Role that identifies the broker administrator client.
pub const ADMIN_ROLE: &str = "admin";
/// App ids must not start with this character.
pub const RESERVED_PREFIX: char = '$';
/// App id reserved for the broker administrator.
pub const RESERVED_ADMIN_ID: &str = "admin";
/// First topic level of every device channel.
pub const TOPIC_ROOT: &str = "iot3";
/// Priority of the role binding given to App clients.
pub const APP_ROLE_PRIORITY: i32 = -1;
/// Priority of the ACL entries created by a membership grant.
pub const MEMBERSHIP_ACL_PRIORITY: i32 = -1;

/// Role an App client binds to.
///
/// # Returns
/// - [`SHARED_ROLE`] when `restricted` is false.
/// - `$apps_{app_id}` when `restricted` is true.
pub fn role_for_app(app_id: &str, restricted: bool) -> String {
    if restricted {
        format!("{EXCLUSIVE_ROLE_PREFIX}{app_id}")
    } else {
        SHARED_ROLE.to_string()
    }
}

/// Event and command topic patterns for a device membership.
///
/// The App id does not appear in the patterns; the grant is scoped by the
/// role the entries are attached to.
///
/// # Returns
/// - `(iot3/{dev_id}/evt/#, iot3/{dev_id}/cmd/#)`.
pub fn topics_for_membership(_app_id: &str, dev_id: &str) -> (String, String) {
    (
        format!("{TOPIC_ROOT}/{dev_id}/evt/#"),
        format!("{TOPIC_ROOT}/{dev_id}/cmd/#"),
    )
}

/// Reject App ids that would collide with broker-owned names.
///
/// # Errors
/// - [`SyncError::ReservedIdentifier`] if the id is empty, starts with
///   [`RESERVED_PREFIX`], or equals [`RESERVED_ADMIN_ID`].
pub fn validate_app_id(app_id: &str) -> SyncResult<()> {
    if app_id.is_empty() || app_id.starts_with(RESERVED_PREFIX) || app_id == RESERVED_ADMIN_ID {
        return Err(SyncError::ReservedIdentifier(app_id.to_string()));
    }
    Ok(())
}
