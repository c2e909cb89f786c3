//! iotgate app sync service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the broker command channel and the HTTP
//! router, then serves the API and the metrics endpoint.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use appsync::api::types::FeatureFlags;
use appsync::app::{AppState, build_router};
use appsync::config::{AppSyncConfig, StorageBackend};
use appsync::mqtt::MqttCommandChannel;
use appsync::observability;
use appsync::registry::AppRegistry;
use appsync::store::dynsec::DynsecDeviceStore;
use appsync::store::file::FileAppStore;
use appsync::store::memory::{InMemoryDeviceStore, InMemoryStore};
use appsync::store::{AppStore, DeviceStore};
use iotgate_dynsec::{CommandChannel, SecurityStateReader, Synchronizer};
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppSyncConfig::from_env_or_yaml().context("app sync config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: AppSyncConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("iotgate-appsync")?;
    let (channel, mqtt_task) = MqttCommandChannel::connect(&config.broker);
    let state = build_state(config.clone(), Arc::new(channel)).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, "app sync listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    mqtt_task.abort();
    let _ = metrics_task.await;
    let _ = mqtt_task.await;
    Ok(())
}

async fn build_state(
    config: AppSyncConfig,
    channel: Arc<dyn CommandChannel>,
) -> anyhow::Result<AppState> {
    let apps: Arc<dyn AppStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::File => Arc::new(
            FileAppStore::open(&config.app_store_path)
                .await
                .context("file app store")?,
        ),
    };

    let reader = config.dynsec_path.as_ref().map(SecurityStateReader::new);
    let devices: Arc<dyn DeviceStore> = match &reader {
        Some(reader) => Arc::new(DynsecDeviceStore::new(reader.clone())),
        None if !config.devices.is_empty() => {
            tracing::info!(
                devices = config.devices.len(),
                "using configured device list"
            );
            Arc::new(InMemoryDeviceStore::with_devices(config.devices.iter().cloned()))
        }
        None => {
            tracing::warn!(
                "no security document or device list configured; device ids are not checked"
            );
            Arc::new(InMemoryDeviceStore::new())
        }
    };

    let mut sync = Synchronizer::new(channel, config.sync);
    if let Some(reader) = reader {
        sync = sync.with_reader(reader);
    }

    let features = FeatureFlags {
        durable_storage: apps.is_durable(),
        atomic_app_create: config.sync.atomic_app_create,
        ensure_shared_role: config.sync.ensure_shared_role,
        security_document: sync.reader().is_some(),
    };
    tracing::info!(
        app_store = apps.backend_name(),
        device_store = devices.backend_name(),
        "app sync state built"
    );

    Ok(AppState {
        api_version: "v1".to_string(),
        features,
        registry: Arc::new(AppRegistry::new(apps, devices, sync)),
    })
}
