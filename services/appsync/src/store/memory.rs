//! In-memory App and Device stores.
//!
//! # Purpose
//! Keeps App records in a `HashMap` guarded by `tokio::sync::RwLock`. Used for
//! local development, tests, and deployments where App records may be rebuilt
//! from scratch.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart, while the broker
//!   keeps the clients and roles created for those Apps.
//! - Consistent within one process: writes take the write lock, reads the read
//!   lock.
use super::{AppStore, DeviceStore, StoreError, StoreResult};
use crate::model::App;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    /// App records keyed by `app_id`.
    apps: Arc<RwLock<HashMap<String, App>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppStore for InMemoryStore {
    async fn list_apps(&self) -> StoreResult<Vec<App>> {
        let mut apps: Vec<App> = self.apps.read().await.values().cloned().collect();
        apps.sort_by(|a, b| a.app_id.cmp(&b.app_id));
        Ok(apps)
    }

    async fn get_app(&self, app_id: &str) -> StoreResult<App> {
        self.apps
            .read()
            .await
            .get(app_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("app".into()))
    }

    async fn app_exists(&self, app_id: &str) -> StoreResult<bool> {
        Ok(self.apps.read().await.contains_key(app_id))
    }

    async fn create_app(&self, app: App) -> StoreResult<App> {
        let mut apps = self.apps.write().await;
        if apps.contains_key(&app.app_id) {
            return Err(StoreError::Conflict("app exists".into()));
        }
        apps.insert(app.app_id.clone(), app.clone());
        metrics::gauge!("iotgate_apps_total").set(apps.len() as f64);
        Ok(app)
    }

    async fn delete_app(&self, app_id: &str) -> StoreResult<()> {
        let mut apps = self.apps.write().await;
        if apps.remove(app_id).is_none() {
            return Err(StoreError::NotFound("app".into()));
        }
        metrics::gauge!("iotgate_apps_total").set(apps.len() as f64);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Fixed set of device ids, for tests and for deployments without a broker
/// document.
///
/// An empty store built with `new` knows no devices at all and is not
/// authoritative. A store seeded through `with_devices` is.
#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: RwLock<HashSet<String>>,
    authoritative: bool,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            devices: RwLock::new(devices.into_iter().map(Into::into).collect()),
            authoritative: true,
        }
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn device_exists(&self, dev_id: &str) -> StoreResult<bool> {
        Ok(self.devices.read().await.contains(dev_id))
    }

    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
