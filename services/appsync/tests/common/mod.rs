use appsync::api::types::FeatureFlags;
use appsync::app::{AppState, build_router};
use appsync::registry::AppRegistry;
use appsync::store::AppStore;
use appsync::store::memory::{InMemoryDeviceStore, InMemoryStore};
use axum::body::Body;
use iotgate_dynsec::{MemoryChannel, SecurityStateReader, SyncConfig, Synchronizer};
use std::sync::Arc;

pub type TestApp = axum::routing::RouterIntoService<Body, ()>;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn app_with_channel(
    channel: Arc<MemoryChannel>,
    devices: &[&str],
    reader: Option<SecurityStateReader>,
) -> TestApp {
    let apps = Arc::new(InMemoryStore::new());
    let device_store = Arc::new(InMemoryDeviceStore::with_devices(devices.iter().copied()));
    let mut sync = Synchronizer::new(channel, SyncConfig::default());
    if let Some(reader) = reader {
        sync = sync.with_reader(reader);
    }
    let state = AppState {
        api_version: "v1".to_string(),
        features: FeatureFlags {
            durable_storage: apps.is_durable(),
            atomic_app_create: false,
            ensure_shared_role: false,
            security_document: sync.reader().is_some(),
        },
        registry: Arc::new(AppRegistry::new(apps, device_store, sync)),
    };
    build_router(state).into_service()
}
