//! App registry: request-side orchestration over the stores and the broker.
//!
//! # Purpose and responsibility
//! Owns the order of operations for every App intent: validate, check
//! identifier collisions, synchronize the broker, then update the App store.
//!
//! # Key invariants and assumptions
//! - Nothing is published for a request that fails validation or a collision
//!   check.
//! - The App store changes only after the synchronizer returned `Ok`. A broker
//!   command that succeeded followed by a store failure leaves the broker ahead
//!   of the store; the error is surfaced and nothing is undone.
//! - Membership only exists on exclusive roles, so it requires a restricted App.
//!
//! # Concurrency
//! Operations on the same App id are serialized by a per-id async mutex held
//! for the whole operation. Different ids proceed in parallel. The locks are
//! process-local.
use crate::model::App;
use crate::store::{AppStore, DeviceStore, StoreError};
use anyhow::anyhow;
use chrono::Utc;
use iotgate_dynsec::{NewApp, SyncError, Synchronizer, validate_app_id};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOwner {
    App,
    Device,
}

impl fmt::Display for IdOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdOwner::App => f.write_str("app"),
            IdOwner::Device => f.write_str("device"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("identifier {id} is already used by a {owner}")]
    IdentifierCollision { id: String, owner: IdOwner },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Document(err) => RegistryError::Sync(SyncError::DocumentUnavailable(err)),
            other => RegistryError::Store(other),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Per-key async mutexes. Entries are dropped once no guard or waiter holds
/// them.
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(AsyncMutex::new(()));
                    locks.insert(key.to_string(), Arc::downgrade(&created));
                    created
                }
            }
        };
        mutex.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

pub struct AppRegistry {
    apps: Arc<dyn AppStore>,
    devices: Arc<dyn DeviceStore>,
    sync: Synchronizer,
    locks: KeyedLocks,
}

impl AppRegistry {
    pub fn new(apps: Arc<dyn AppStore>, devices: Arc<dyn DeviceStore>, sync: Synchronizer) -> Self {
        Self {
            apps,
            devices,
            sync,
            locks: KeyedLocks::default(),
        }
    }

    pub fn app_store(&self) -> &Arc<dyn AppStore> {
        &self.apps
    }

    pub fn device_store(&self) -> &Arc<dyn DeviceStore> {
        &self.devices
    }

    pub async fn list(&self) -> RegistryResult<Vec<App>> {
        Ok(self.apps.list_apps().await?)
    }

    pub async fn get(&self, app_id: &str) -> RegistryResult<App> {
        self.apps.get_app(app_id).await.map_err(|err| match err {
            StoreError::NotFound(_) => app_not_found(app_id),
            other => other.into(),
        })
    }

    /// Register a new App and create its broker client.
    ///
    /// # Errors
    /// - `Sync(ReservedIdentifier)` for `$`-prefixed, `admin` or empty ids.
    /// - `IdentifierCollision` if the id names an existing App or Device.
    /// - `Sync(ChannelUnavailable)` if a publish failed; the store is untouched.
    pub async fn register(&self, app: NewApp) -> RegistryResult<App> {
        validate_app_id(&app.app_id)?;
        let _guard = self.locks.lock(&app.app_id).await;

        if self.apps.app_exists(&app.app_id).await? {
            return Err(RegistryError::IdentifierCollision {
                id: app.app_id,
                owner: IdOwner::App,
            });
        }
        if self.devices.device_exists(&app.app_id).await? {
            return Err(RegistryError::IdentifierCollision {
                id: app.app_id,
                owner: IdOwner::Device,
            });
        }

        self.sync.create_app(&app).await?;

        let record = App {
            app_id: app.app_id.clone(),
            password: app.password,
            restricted: app.restricted,
            created_date: Utc::now(),
        };
        match self.apps.create_app(record).await {
            Ok(created) => {
                tracing::info!(
                    app_id = %created.app_id,
                    restricted = created.restricted,
                    "app registered"
                );
                Ok(created)
            }
            // Another process sharing the store won the race.
            Err(StoreError::Conflict(_)) => Err(RegistryError::IdentifierCollision {
                id: app.app_id,
                owner: IdOwner::App,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove an App's broker client (and exclusive role), then its record.
    pub async fn remove(&self, app_id: &str) -> RegistryResult<()> {
        let _guard = self.locks.lock(app_id).await;
        let app = self.get(app_id).await?;

        self.sync.delete_app(&app.app_id, app.restricted).await?;

        match self.apps.delete_app(app_id).await {
            Ok(()) => {
                tracing::info!(app_id = %app_id, "app removed");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(app_not_found(app_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Grant a device's event and command channels to a restricted App.
    ///
    /// The device must exist when the device store is authoritative;
    /// otherwise the grant is written without a lookup.
    pub async fn add_member(
        &self,
        app_id: &str,
        dev_id: &str,
        allow_event: bool,
        allow_command: bool,
    ) -> RegistryResult<()> {
        let _guard = self.locks.lock(app_id).await;
        self.restricted_app(app_id).await?;
        if self.devices.is_authoritative() && !self.devices.device_exists(dev_id).await? {
            return Err(RegistryError::NotFound {
                kind: "device",
                id: dev_id.to_string(),
            });
        }
        self.sync
            .grant_membership(app_id, dev_id, allow_event, allow_command)
            .await?;
        Ok(())
    }

    /// Withdraw a device from a restricted App.
    ///
    /// The device is not looked up, so entries for a device that has since
    /// been deprovisioned can still be removed.
    pub async fn remove_member(&self, app_id: &str, dev_id: &str) -> RegistryResult<()> {
        let _guard = self.locks.lock(app_id).await;
        self.restricted_app(app_id).await?;
        self.sync.revoke_membership(app_id, dev_id).await?;
        Ok(())
    }

    /// Broker administrator username, read from the security document.
    pub async fn admin_client(&self) -> RegistryResult<Option<String>> {
        let sync = self.sync.clone();
        let admin = tokio::task::spawn_blocking(move || sync.admin_client())
            .await
            .map_err(|err| StoreError::Unexpected(anyhow!("admin lookup task: {err}")))??;
        Ok(admin)
    }

    async fn restricted_app(&self, app_id: &str) -> RegistryResult<App> {
        let app = self.get(app_id).await?;
        if !app.restricted {
            return Err(RegistryError::InvalidRequest(format!(
                "app {app_id} is not restricted and has no device memberships"
            )));
        }
        Ok(app)
    }
}

fn app_not_found(app_id: &str) -> RegistryError {
    RegistryError::NotFound {
        kind: "app",
        id: app_id.to_string(),
    }
}
