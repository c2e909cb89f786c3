//! App and membership synchronization with the broker's dynamic-security plugin.
//!
//! # Purpose and responsibility
//! Turns App lifecycle and membership intents into ordered command batches and
//! publishes them on the command channel.
//!
//! # Key invariants and assumptions
//! - A restricted App's exclusive role is sent before its client on create, and
//!   before the client deletion on delete.
//! - Identifier validation happens before anything is published.
//! - Uniqueness of App ids against other Apps and Devices is the caller's job;
//!   it needs the App and Device stores.
//!
//! # Partial failure
//! Without `atomic_app_create`, a restricted create is two publishes. If the
//! second one fails the exclusive role is left behind without a client. The
//! error is returned as `ChannelUnavailable` and the orphaned role is logged;
//! nothing is rolled back and nothing is retried.
use crate::channel::CommandChannel;
use crate::command::{AclType, Command, CommandBatch, Password, RoleBinding};
use crate::errors::{SyncError, SyncResult};
use crate::naming::{
    APP_ROLE_PRIORITY, MEMBERSHIP_ACL_PRIORITY, SHARED_ROLE, role_for_app, topics_for_membership,
    validate_app_id,
};
use crate::reader::SecurityStateReader;
use std::sync::Arc;

/// App fields the synchronizer needs to create its broker client.
#[derive(Debug, Clone)]
pub struct NewApp {
    pub app_id: String,
    pub password: Password,
    pub restricted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Send role and client creation (and deletion) as one batch.
    pub atomic_app_create: bool,
    /// Create the shared role first when an unrestricted App is registered and
    /// the document does not list it. Needs a reader.
    pub ensure_shared_role: bool,
}

#[derive(Clone)]
pub struct Synchronizer {
    channel: Arc<dyn CommandChannel>,
    reader: Option<SecurityStateReader>,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(channel: Arc<dyn CommandChannel>, config: SyncConfig) -> Self {
        Self {
            channel,
            reader: None,
            config,
        }
    }

    pub fn with_reader(mut self, reader: SecurityStateReader) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn reader(&self) -> Option<&SecurityStateReader> {
        self.reader.as_ref()
    }

    /// Create the broker client for an App, and its exclusive role if restricted.
    ///
    /// # Errors
    /// - `ReservedIdentifier` before any publish.
    /// - `DocumentUnavailable` if `ensure_shared_role` is on and the document
    ///   cannot be read.
    /// - `ChannelUnavailable` if a publish fails.
    pub async fn create_app(&self, app: &NewApp) -> SyncResult<()> {
        validate_app_id(&app.app_id)?;
        let rolename = role_for_app(&app.app_id, app.restricted);

        let mut role_commands = Vec::new();
        if app.restricted {
            role_commands.push(Command::CreateRole {
                rolename: rolename.clone(),
                acls: Vec::new(),
            });
        } else if self.config.ensure_shared_role && !self.shared_role_exists()? {
            tracing::info!(role = SHARED_ROLE, "shared app role missing, creating it");
            role_commands.push(Command::CreateRole {
                rolename: SHARED_ROLE.to_string(),
                acls: Vec::new(),
            });
        }

        let client = Command::CreateClient {
            username: app.app_id.clone(),
            password: app.password.clone(),
            roles: vec![RoleBinding {
                rolename: rolename.clone(),
                priority: APP_ROLE_PRIORITY,
            }],
        };

        if self.config.atomic_app_create || !app.restricted {
            role_commands.push(client);
            self.send(CommandBatch::new(role_commands)).await?;
        } else {
            self.send(CommandBatch::new(role_commands)).await?;
            if let Err(err) = self.send(CommandBatch::single(client)).await {
                tracing::warn!(
                    app_id = %app.app_id,
                    role = %rolename,
                    "exclusive role created but client creation failed; role is orphaned"
                );
                return Err(err);
            }
        }

        tracing::info!(app_id = %app.app_id, restricted = app.restricted, "app client created");
        Ok(())
    }

    /// Remove an App's client, and its exclusive role first if restricted.
    ///
    /// Nothing is checked against the broker; deleting a missing client or
    /// role is left to the broker to ignore.
    pub async fn delete_app(&self, app_id: &str, restricted: bool) -> SyncResult<()> {
        let client = Command::DeleteClient {
            username: app_id.to_string(),
        };
        if restricted {
            let role = Command::DeleteRole {
                rolename: role_for_app(app_id, true),
            };
            if self.config.atomic_app_create {
                self.send(CommandBatch::new(vec![role, client])).await?;
            } else {
                self.send(CommandBatch::single(role)).await?;
                self.send(CommandBatch::single(client)).await?;
            }
        } else {
            self.send(CommandBatch::single(client)).await?;
        }
        tracing::info!(app_id = %app_id, restricted, "app client deleted");
        Ok(())
    }

    /// Attach a device's event and command channels to an App's exclusive role.
    ///
    /// Both entries are always written. A `false` flag becomes an explicit
    /// deny rather than a missing entry.
    pub async fn grant_membership(
        &self,
        app_id: &str,
        dev_id: &str,
        allow_event: bool,
        allow_command: bool,
    ) -> SyncResult<()> {
        let rolename = role_for_app(app_id, true);
        let (event_topic, command_topic) = topics_for_membership(app_id, dev_id);
        let batch = CommandBatch::new(vec![
            Command::AddRoleAcl {
                rolename: rolename.clone(),
                acltype: AclType::SubscribePattern,
                topic: event_topic,
                priority: MEMBERSHIP_ACL_PRIORITY,
                allow: allow_event,
            },
            Command::AddRoleAcl {
                rolename,
                acltype: AclType::PublishClientSend,
                topic: command_topic,
                priority: MEMBERSHIP_ACL_PRIORITY,
                allow: allow_command,
            },
        ]);
        self.send(batch).await?;
        tracing::info!(
            app_id = %app_id,
            dev_id = %dev_id,
            allow_event,
            allow_command,
            "device added to app"
        );
        Ok(())
    }

    pub async fn revoke_membership(&self, app_id: &str, dev_id: &str) -> SyncResult<()> {
        let rolename = role_for_app(app_id, true);
        let (event_topic, command_topic) = topics_for_membership(app_id, dev_id);
        let batch = CommandBatch::new(vec![
            Command::RemoveRoleAcl {
                rolename: rolename.clone(),
                acltype: AclType::SubscribePattern,
                topic: event_topic,
            },
            Command::RemoveRoleAcl {
                rolename,
                acltype: AclType::PublishClientSend,
                topic: command_topic,
            },
        ]);
        self.send(batch).await?;
        tracing::info!(app_id = %app_id, dev_id = %dev_id, "device removed from app");
        Ok(())
    }

    /// Username of the broker administrator, if a reader is configured.
    pub fn admin_client(&self) -> SyncResult<Option<String>> {
        match &self.reader {
            Some(reader) => Ok(reader.find_admin_client()?),
            None => Ok(None),
        }
    }

    fn shared_role_exists(&self) -> SyncResult<bool> {
        match &self.reader {
            Some(reader) => Ok(reader.role_exists(SHARED_ROLE)?),
            None => {
                tracing::warn!("ensure_shared_role is set but no security document is configured");
                Ok(true)
            }
        }
    }

    async fn send(&self, batch: CommandBatch) -> SyncResult<()> {
        match self.channel.publish(&batch).await {
            Ok(()) => {
                metrics::counter!("iotgate_dynsec_publishes_total", "outcome" => "ok").increment(1);
                for command in &batch.commands {
                    metrics::counter!("iotgate_dynsec_commands_total", "command" => command.name())
                        .increment(1);
                    tracing::debug!(command = command.name(), "dynsec command published");
                }
                Ok(())
            }
            Err(err) => {
                metrics::counter!("iotgate_dynsec_publishes_total", "outcome" => "error")
                    .increment(1);
                tracing::error!(
                    error = %err,
                    commands = batch.commands.len(),
                    "dynsec publish failed"
                );
                Err(SyncError::ChannelUnavailable(err))
            }
        }
    }
}
