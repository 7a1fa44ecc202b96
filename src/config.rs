//! Device identity and link configuration
//!
//! Identity and credentials live in a [`ConfigStore`] that is read again on
//! every connect attempt, so changes made between attempts are picked up
//! without restarting the service.

use anyhow::{Context, Result};
use reverse_link_shared::protocol;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Path of an optional JSON file holding a [`DeviceConfig`]
pub const CONFIG_PATH_ENV: &str = "REVERSE_LINK_CONFIG";

/// Identity and credentials presented to the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Host URL template, may contain `{deviceId}`
    pub host_url: String,
    /// Bearer token for the reverse connection
    pub auth_token: String,
    pub user_id: String,
    pub device_id: String,
    pub device_name: String,
    /// Locale/country code of the device
    pub country_code: String,
}

/// Source of the current device configuration
pub trait ConfigStore: Send + Sync {
    /// Current configuration; never cached by callers
    fn snapshot(&self) -> DeviceConfig;
}

/// In-memory configuration store that can be updated at runtime
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<DeviceConfig>>,
}

impl SharedConfig {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Apply a change to the stored configuration
    pub fn update(&self, change: impl FnOnce(&mut DeviceConfig)) {
        let mut config = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut config);
    }
}

impl ConfigStore for SharedConfig {
    fn snapshot(&self) -> DeviceConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Configuration for the connection manager and router
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Delay before reconnecting after the link drops
    pub reconnect_delay: Duration,
    /// Command handled off the receive path
    pub long_running_method: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(protocol::DEFAULT_RECONNECT_DELAY_MS),
            long_running_method: protocol::DEFAULT_LONG_RUNNING_METHOD.into(),
        }
    }
}

/// Everything needed to start the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub device: DeviceConfig,
    pub link: LinkConfig,
}

impl Settings {
    /// Load settings from the optional config file and the environment
    pub fn load() -> Result<Self> {
        let device = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => read_device_config(Path::new(&path))?,
            Err(_) => DeviceConfig::default(),
        };

        let mut settings = Settings {
            device,
            link: LinkConfig::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Override fields from `lookup`, which maps variable names to values
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let device = &mut self.device;
        let fields: [(&str, &mut String); 6] = [
            ("REVERSE_LINK_URL", &mut device.host_url),
            ("REVERSE_LINK_TOKEN", &mut device.auth_token),
            ("REVERSE_LINK_USER_ID", &mut device.user_id),
            ("REVERSE_LINK_DEVICE_ID", &mut device.device_id),
            ("REVERSE_LINK_DEVICE_NAME", &mut device.device_name),
            ("REVERSE_LINK_COUNTRY", &mut device.country_code),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }

        if let Some(ms) = lookup("REVERSE_LINK_RECONNECT_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("REVERSE_LINK_RECONNECT_MS is not a number: {}", ms))?;
            self.link.reconnect_delay = Duration::from_millis(ms);
        }

        if let Some(method) = lookup("REVERSE_LINK_LONG_RUNNING_METHOD") {
            self.link.long_running_method = method;
        }

        Ok(())
    }
}

/// Read a [`DeviceConfig`] from a JSON file
pub fn read_device_config(path: &Path) -> Result<DeviceConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}
