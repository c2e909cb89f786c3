//! JSON-file App store.
//!
//! # Purpose
//! Persists App records in a single JSON document (`{"apps": [...]}`) so they
//! survive restarts without an external database.
//!
//! # Durability and consistency
//! - Every mutation rewrites the whole file: the new contents go to a sibling
//!   temp file which is then renamed over the original.
//! - A process-local mutex serializes all access. Two processes sharing one
//!   file are not coordinated.
//! - A missing file is an empty store; it is created on the first write.
use super::{AppStore, StoreError, StoreResult};
use crate::model::App;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct AppFile {
    #[serde(default)]
    apps: Vec<App>,
}

pub struct FileAppStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAppStore {
    /// Open the store, validating the file if it already exists.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };
        let existing = store
            .read()
            .await
            .with_context(|| format!("open app store {}", store.path.display()))?;
        metrics::gauge!("iotgate_apps_total").set(existing.apps.len() as f64);
        Ok(store)
    }

    async fn read(&self) -> anyhow::Result<AppFile> {
        match tokio::fs::read(&self.path).await {
            Ok(contents) => serde_json::from_slice(&contents)
                .with_context(|| format!("parse {}", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AppFile::default()),
            Err(err) => Err(err).with_context(|| format!("read {}", self.path.display())),
        }
    }

    async fn write(&self, file: &AppFile) -> anyhow::Result<()> {
        let contents = serde_json::to_vec_pretty(file).context("encode app store")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))?;
        metrics::gauge!("iotgate_apps_total").set(file.apps.len() as f64);
        Ok(())
    }
}

#[async_trait]
impl AppStore for FileAppStore {
    async fn list_apps(&self) -> StoreResult<Vec<App>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.apps)
    }

    async fn get_app(&self, app_id: &str) -> StoreResult<App> {
        let _guard = self.lock.lock().await;
        self.read()
            .await?
            .apps
            .into_iter()
            .find(|app| app.app_id == app_id)
            .ok_or_else(|| StoreError::NotFound("app".into()))
    }

    async fn app_exists(&self, app_id: &str) -> StoreResult<bool> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.apps.iter().any(|app| app.app_id == app_id))
    }

    async fn create_app(&self, app: App) -> StoreResult<App> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        if file.apps.iter().any(|existing| existing.app_id == app.app_id) {
            return Err(StoreError::Conflict("app exists".into()));
        }
        file.apps.push(app.clone());
        self.write(&file).await?;
        Ok(app)
    }

    async fn delete_app(&self, app_id: &str) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let before = file.apps.len();
        file.apps.retain(|app| app.app_id != app_id);
        if file.apps.len() == before {
            return Err(StoreError::NotFound("app".into()));
        }
        self.write(&file).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        self.read().await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
