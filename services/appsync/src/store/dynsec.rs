//! Device lookups backed by the broker's security document.
//!
//! A Device is a broker client whose primary role is named like the client
//! itself. Devices are provisioned on the broker directly, so the document is
//! the authority on which device ids exist.
use super::{DeviceStore, StoreResult};
use anyhow::Context;
use async_trait::async_trait;
use iotgate_dynsec::SecurityStateReader;

pub struct DynsecDeviceStore {
    reader: SecurityStateReader,
}

impl DynsecDeviceStore {
    pub fn new(reader: SecurityStateReader) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl DeviceStore for DynsecDeviceStore {
    async fn device_exists(&self, dev_id: &str) -> StoreResult<bool> {
        let reader = self.reader.clone();
        let dev_id = dev_id.to_string();
        let device = tokio::task::spawn_blocking(move || reader.device_client(&dev_id))
            .await
            .context("device lookup task")??;
        Ok(device.is_some())
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "dynsec"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[tokio::test]
    async fn devices_are_self_named_clients() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("dynamic-security.json");
        std::fs::write(
            &path,
            r#"{
                "clients": [
                    { "username": "sensor-1", "roles": [{ "rolename": "sensor-1" }] },
                    { "username": "dash", "roles": [{ "rolename": "$apps" }] }
                ],
                "roles": []
            }"#,
        )
        .expect("write");
        let store = DynsecDeviceStore::new(SecurityStateReader::new(&path));

        assert!(store.device_exists("sensor-1").await.expect("lookup"));
        assert!(!store.device_exists("dash").await.expect("lookup"));
        assert!(!store.device_exists("ghost").await.expect("lookup"));
    }

    #[tokio::test]
    async fn missing_document_is_a_document_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = DynsecDeviceStore::new(SecurityStateReader::new(dir.path().join("none.json")));
        assert!(matches!(
            store.device_exists("sensor-1").await,
            Err(StoreError::Document(_))
        ));
    }
}
