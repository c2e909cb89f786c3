//! Dynamic-security admin commands and the batch envelope.
//!
//! # Purpose
//! Models the control-topic payload `{"commands": [...]}` as a closed set of
//! command variants, each carrying only the fields the broker requires.
//!
//! # Key invariants
//! - Serialized commands carry a `command` tag with the broker's exact name
//!   (`createRole`, `addRoleACL`, ...).
//! - `removeRoleACL` never carries an `allow` field.
//! - Batch order is preserved; the broker applies commands in array order.
use serde::{Deserialize, Serialize};

/// ACL kinds this system writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AclType {
    SubscribePattern,
    PublishClientSend,
}

/// Client credential as sent in `createClient`.
///
/// `Debug` output is redacted so commands can be logged safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub rolename: String,
    pub priority: i32,
}

/// ACL entry carried inside `createRole`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAcl {
    pub acltype: AclType,
    pub topic: String,
    pub priority: i32,
    pub allow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    CreateRole {
        rolename: String,
        acls: Vec<RoleAcl>,
    },
    DeleteRole {
        rolename: String,
    },
    CreateClient {
        username: String,
        password: Password,
        roles: Vec<RoleBinding>,
    },
    DeleteClient {
        username: String,
    },
    #[serde(rename = "addRoleACL")]
    AddRoleAcl {
        rolename: String,
        acltype: AclType,
        topic: String,
        priority: i32,
        allow: bool,
    },
    #[serde(rename = "removeRoleACL")]
    RemoveRoleAcl {
        rolename: String,
        acltype: AclType,
        topic: String,
    },
}

impl Command {
    /// Broker-side command name, used for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRole { .. } => "createRole",
            Self::DeleteRole { .. } => "deleteRole",
            Self::CreateClient { .. } => "createClient",
            Self::DeleteClient { .. } => "deleteClient",
            Self::AddRoleAcl { .. } => "addRoleACL",
            Self::RemoveRoleAcl { .. } => "removeRoleACL",
        }
    }
}

/// One control-topic message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    pub commands: Vec<Command>,
}

impl CommandBatch {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn single(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
