use anyhow::{Context, Result, bail};
use iotgate_dynsec::SyncConfig;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONTROL_TOPIC: &str = "$CONTROL/dynamic-security/v1";

// App sync service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct AppSyncConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    /// Broker's persisted dynamic-security document. Without it, Device
    /// collisions are only checked against the in-memory device list.
    pub dynsec_path: Option<PathBuf>,
    /// Known Device ids, used as the device list when no security document
    /// is configured. Empty means device existence is not checked.
    pub devices: Vec<String>,
    pub broker: BrokerConfig,
    pub storage: StorageBackend,
    pub app_store_path: PathBuf,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub control_topic: String,
    pub qos: u8,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "mosquitto".to_string(),
            port: 1883,
            client_id: "iotgate-appsync".to_string(),
            username: None,
            password: None,
            control_topic: DEFAULT_CONTROL_TOPIC.to_string(),
            qos: 0,
            keep_alive: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            other => bail!("unknown storage backend {other:?}; expected memory or file"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AppSyncConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    dynsec_path: Option<PathBuf>,
    devices: Option<Vec<String>>,
    storage: Option<String>,
    app_store_path: Option<PathBuf>,
    atomic_app_create: Option<bool>,
    ensure_shared_role: Option<bool>,
    #[serde(default)]
    broker: BrokerConfigOverride,
}

#[derive(Debug, Default, Deserialize)]
struct BrokerConfigOverride {
    host: Option<String>,
    port: Option<u16>,
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    control_topic: Option<String>,
    qos: Option<u8>,
    keep_alive_secs: Option<u64>,
    reconnect_delay_ms: Option<u64>,
}

impl AppSyncConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("IOTGATE_APPSYNC_BIND", "0.0.0.0:8080")
            .parse()
            .with_context(|| "parse IOTGATE_APPSYNC_BIND")?;
        let metrics_bind = env_or("IOTGATE_METRICS_BIND", "0.0.0.0:9090")
            .parse()
            .with_context(|| "parse IOTGATE_METRICS_BIND")?;
        let dynsec_path = std::env::var("IOTGATE_DYNSEC_PATH").ok().map(PathBuf::from);
        let devices = env_list("IOTGATE_DEVICES");
        let storage = StorageBackend::parse(&env_or("IOTGATE_STORAGE", "memory"))
            .with_context(|| "parse IOTGATE_STORAGE")?;
        let app_store_path = PathBuf::from(env_or("IOTGATE_APP_STORE_PATH", "apps.json"));
        let sync = SyncConfig {
            atomic_app_create: env_bool("IOTGATE_ATOMIC_APP_CREATE")?.unwrap_or(false),
            ensure_shared_role: env_bool("IOTGATE_ENSURE_SHARED_ROLE")?.unwrap_or(false),
        };

        let defaults = BrokerConfig::default();
        let port = match std::env::var("IOTGATE_MQTT_PORT") {
            Ok(value) => value.parse().with_context(|| "parse IOTGATE_MQTT_PORT")?,
            Err(_) => defaults.port,
        };
        let qos = match std::env::var("IOTGATE_MQTT_QOS") {
            Ok(value) => value.parse().with_context(|| "parse IOTGATE_MQTT_QOS")?,
            Err(_) => defaults.qos,
        };
        let keep_alive = match std::env::var("IOTGATE_MQTT_KEEP_ALIVE_SECS") {
            Ok(value) => Duration::from_secs(
                value
                    .parse()
                    .with_context(|| "parse IOTGATE_MQTT_KEEP_ALIVE_SECS")?,
            ),
            Err(_) => defaults.keep_alive,
        };
        let broker = BrokerConfig {
            host: std::env::var("IOTGATE_MQTT_HOST").unwrap_or(defaults.host),
            port,
            client_id: std::env::var("IOTGATE_MQTT_CLIENT_ID").unwrap_or(defaults.client_id),
            username: std::env::var("IOTGATE_MQTT_USERNAME").ok(),
            password: std::env::var("IOTGATE_MQTT_PASSWORD").ok(),
            control_topic: std::env::var("IOTGATE_CONTROL_TOPIC")
                .unwrap_or(defaults.control_topic),
            qos,
            keep_alive,
            reconnect_delay: defaults.reconnect_delay,
        };

        let config = Self {
            bind_addr,
            metrics_bind,
            dynsec_path,
            devices,
            broker,
            storage,
            app_store_path,
            sync,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("IOTGATE_APPSYNC_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read IOTGATE_APPSYNC_CONFIG: {path}"))?;
            let override_cfg: AppSyncConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse appsync config yaml")?;
            config.apply(override_cfg)?;
            config.validate()?;
        }
        Ok(config)
    }

    fn apply(&mut self, override_cfg: AppSyncConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.dynsec_path {
            self.dynsec_path = Some(value);
        }
        if let Some(value) = override_cfg.devices {
            self.devices = value;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = StorageBackend::parse(&value).with_context(|| "parse storage")?;
        }
        if let Some(value) = override_cfg.app_store_path {
            self.app_store_path = value;
        }
        if let Some(value) = override_cfg.atomic_app_create {
            self.sync.atomic_app_create = value;
        }
        if let Some(value) = override_cfg.ensure_shared_role {
            self.sync.ensure_shared_role = value;
        }

        let broker = override_cfg.broker;
        if let Some(value) = broker.host {
            self.broker.host = value;
        }
        if let Some(value) = broker.port {
            self.broker.port = value;
        }
        if let Some(value) = broker.client_id {
            self.broker.client_id = value;
        }
        if broker.username.is_some() {
            self.broker.username = broker.username;
        }
        if broker.password.is_some() {
            self.broker.password = broker.password;
        }
        if let Some(value) = broker.control_topic {
            self.broker.control_topic = value;
        }
        if let Some(value) = broker.qos {
            self.broker.qos = value;
        }
        if let Some(value) = broker.keep_alive_secs {
            self.broker.keep_alive = Duration::from_secs(value);
        }
        if let Some(value) = broker.reconnect_delay_ms {
            self.broker.reconnect_delay = Duration::from_millis(value);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.broker.qos > 2 {
            bail!("mqtt qos must be 0, 1 or 2 (got {})", self.broker.qos);
        }
        if self.sync.ensure_shared_role && self.dynsec_path.is_none() {
            bail!("ensure_shared_role requires IOTGATE_DYNSEC_PATH");
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    match std::env::var(key) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => bail!("parse {key}: expected a boolean, got {other:?}"),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    const KEYS: &[&str] = &[
        "IOTGATE_APPSYNC_BIND",
        "IOTGATE_METRICS_BIND",
        "IOTGATE_DYNSEC_PATH",
        "IOTGATE_DEVICES",
        "IOTGATE_STORAGE",
        "IOTGATE_APP_STORE_PATH",
        "IOTGATE_ATOMIC_APP_CREATE",
        "IOTGATE_ENSURE_SHARED_ROLE",
        "IOTGATE_MQTT_HOST",
        "IOTGATE_MQTT_PORT",
        "IOTGATE_MQTT_CLIENT_ID",
        "IOTGATE_MQTT_USERNAME",
        "IOTGATE_MQTT_PASSWORD",
        "IOTGATE_CONTROL_TOPIC",
        "IOTGATE_MQTT_QOS",
        "IOTGATE_MQTT_KEEP_ALIVE_SECS",
        "IOTGATE_APPSYNC_CONFIG",
    ];

    fn clean_env() -> Vec<EnvGuard> {
        KEYS.iter().map(|key| EnvGuard::unset(*key)).collect()
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        let _clean = clean_env();
        let config = AppSyncConfig::from_env().expect("config");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.metrics_bind.port(), 9090);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.dynsec_path, None);
        assert!(config.devices.is_empty());
        assert_eq!(config.broker, BrokerConfig::default());
        assert_eq!(config.broker.control_topic, "$CONTROL/dynamic-security/v1");
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        let _clean = clean_env();
        let _g1 = EnvGuard::set("IOTGATE_MQTT_HOST", "broker.local");
        let _g2 = EnvGuard::set("IOTGATE_MQTT_PORT", "8883");
        let _g3 = EnvGuard::set("IOTGATE_MQTT_QOS", "1");
        let _g4 = EnvGuard::set("IOTGATE_STORAGE", "File");
        let _g5 = EnvGuard::set("IOTGATE_ATOMIC_APP_CREATE", "true");
        let _g6 = EnvGuard::set("IOTGATE_DYNSEC_PATH", "/var/lib/mosquitto/dynamic-security.json");
        let _g7 = EnvGuard::set("IOTGATE_DEVICES", "sensor-1, sensor-2,,");

        let config = AppSyncConfig::from_env().expect("config");
        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.broker.qos, 1);
        assert_eq!(config.storage, StorageBackend::File);
        assert!(config.sync.atomic_app_create);
        assert!(!config.sync.ensure_shared_role);
        assert_eq!(config.devices, vec!["sensor-1", "sensor-2"]);
        assert_eq!(
            config.dynsec_path,
            Some(PathBuf::from("/var/lib/mosquitto/dynamic-security.json"))
        );
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        let _clean = clean_env();
        {
            let _g = EnvGuard::set("IOTGATE_MQTT_QOS", "3");
            assert!(AppSyncConfig::from_env().is_err());
        }
        {
            let _g = EnvGuard::set("IOTGATE_STORAGE", "postgres");
            assert!(AppSyncConfig::from_env().is_err());
        }
        {
            let _g = EnvGuard::set("IOTGATE_ATOMIC_APP_CREATE", "maybe");
            assert!(AppSyncConfig::from_env().is_err());
        }
        {
            let _g = EnvGuard::set("IOTGATE_ENSURE_SHARED_ROLE", "1");
            let err = AppSyncConfig::from_env().expect_err("needs document");
            assert!(err.to_string().contains("IOTGATE_DYNSEC_PATH"));
        }
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        let _clean = clean_env();
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "bind_addr: \"127.0.0.1:18080\"\n\
             storage: file\n\
             app_store_path: /tmp/apps.json\n\
             dynsec_path: /tmp/dynamic-security.json\n\
             ensure_shared_role: true\n\
             devices: [sensor-1]\n\
             broker:\n  host: mqtt.internal\n  username: appsync\n  password: secret\n  reconnect_delay_ms: 250\n"
        )
        .expect("write yaml");
        let path = file.path().to_string_lossy().to_string();
        let _g = EnvGuard::set("IOTGATE_APPSYNC_CONFIG", &path);

        let config = AppSyncConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.bind_addr.port(), 18080);
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.app_store_path, PathBuf::from("/tmp/apps.json"));
        assert!(config.sync.ensure_shared_role);
        assert_eq!(config.devices, vec!["sensor-1"]);
        assert_eq!(config.broker.host, "mqtt.internal");
        assert_eq!(config.broker.username.as_deref(), Some("appsync"));
        assert_eq!(config.broker.password.as_deref(), Some("secret"));
        assert_eq!(config.broker.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.broker.port, 1883);
    }

    #[test]
    #[serial]
    fn missing_yaml_file_is_an_error() {
        let _clean = clean_env();
        let _g = EnvGuard::set("IOTGATE_APPSYNC_CONFIG", "/nonexistent/appsync.yaml");
        let err = AppSyncConfig::from_env_or_yaml().expect_err("missing file");
        assert!(err.to_string().contains("IOTGATE_APPSYNC_CONFIG"));
    }
}
