use crate::model::App;
use async_trait::async_trait;
use iotgate_dynsec::DocumentError;
use thiserror::Error;

pub mod dynsec;
pub mod file;
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner of App records.
#[async_trait]
pub trait AppStore: Send + Sync {
    async fn list_apps(&self) -> StoreResult<Vec<App>>;
    async fn get_app(&self, app_id: &str) -> StoreResult<App>;
    async fn app_exists(&self, app_id: &str) -> StoreResult<bool>;
    async fn create_app(&self, app: App) -> StoreResult<App>;
    async fn delete_app(&self, app_id: &str) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

/// Existence lookup for Device identifiers.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn device_exists(&self, dev_id: &str) -> StoreResult<bool>;
    /// Whether a `false` from `device_exists` means the device is unknown to
    /// the broker. Grants skip the lookup against a non-authoritative store.
    fn is_authoritative(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
