//! Dynamic-security synchronization primitives for the iotgate broker.
//!
//! # Purpose
//! Translates App and Device intents (register, delete, grant, revoke) into
//! ordered batches of dynamic-security admin commands, and answers read-only
//! queries against the broker's persisted security document.
//!
//! # How it fits
//! The `appsync` service owns the App registry and HTTP surface. It builds a
//! [`Synchronizer`] once at start-up around a [`CommandChannel`] (the MQTT
//! control connection in production, [`MemoryChannel`] in tests) and a
//! [`SecurityStateReader`] pointing at the broker's document.
//!
//! # Key invariants
//! - A restricted App's exclusive role is created before its client and deleted
//!   before its client.
//! - Membership is exactly the presence of two ACL entries on the App's role.
//! - The reader never writes the document; all mutation goes through the
//!   command channel.
//!
//! # Examples
//! ```rust
//! use iotgate_dynsec::{role_for_app, topics_for_membership};
//!
//! assert_eq!(role_for_app("dash", false), "$apps");
//! assert_eq!(role_for_app("dash", true), "$apps_dash");
//! let (evt, cmd) = topics_for_membership("dash", "dev-1");
//! assert_eq!(evt, "iot3/dev-1/evt/#");
//! assert_eq!(cmd, "iot3/dev-1/cmd/#");
//! ```
//!
//! # Common pitfalls
//! - Commands are fire-and-forget. A successful publish does not mean the
//!   broker applied the command.
//! - The document is only as fresh as the broker's last save.

mod channel;
mod command;
mod document;
mod errors;
mod naming;
mod reader;
mod sync;

pub use channel::{ChannelError, CommandChannel, MemoryChannel};
pub use command::{AclType, Command, CommandBatch, Password, RoleAcl, RoleBinding};
pub use document::{AclEntry, ClientRecord, ClientRole, Identity, RoleRecord, SecurityDocument};
pub use errors::{SyncError, SyncResult};
pub use naming::{
    ADMIN_ROLE, APP_ROLE_PRIORITY, EXCLUSIVE_ROLE_PREFIX, MEMBERSHIP_ACL_PRIORITY,
    RESERVED_ADMIN_ID, RESERVED_PREFIX, SHARED_ROLE, TOPIC_ROOT, role_for_app,
    topics_for_membership, validate_app_id,
};
pub use reader::{DocumentError, SecurityStateReader};
pub use sync::{NewApp, SyncConfig, Synchronizer};
