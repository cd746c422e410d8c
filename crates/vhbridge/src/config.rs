use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::client::ConnectTarget;
use crate::tracker::DEFAULT_POLL_INTERVAL_TICKS;

pub const DEFAULT_CONFIG_PATH: &str = "config/vhbridge_connection.json";
pub const DEFAULT_PORT: u16 = 38281;

/// Persisted connection settings plus bridge tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub slot_name: String,
    pub password: String,
    pub auto_connect: bool,
    pub poll_interval_ticks: u32,
    pub clear_unlocks_on_logout: bool,
    pub debug_bypass: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            slot_name: String::new(),
            password: String::new(),
            auto_connect: false,
            poll_interval_ticks: DEFAULT_POLL_INTERVAL_TICKS,
            clear_unlocks_on_logout: false,
            debug_bypass: false,
        }
    }
}

impl BridgeConfig {
    /// Missing file yields defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let s = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => anyhow::bail!("failed to read config {:?}: {e}", path),
        };
        serde_json::from_str(&s)
            .map_err(|e| anyhow::anyhow!("failed to parse config {:?}: {e}", path))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("failed to create config dir {:?}: {e}", parent))?;
        }
        let s = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, s)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// `VHB_HOST`, `VHB_PORT`, `VHB_SLOT`, `VHB_PASSWORD`, `VHB_AUTO_CONNECT`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|k| std::env::var(k).ok());
    }

    pub fn apply_env_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("VHB_HOST") {
            self.host = v;
        }
        if let Some(p) = get("VHB_PORT").and_then(|v| v.trim().parse().ok()) {
            self.port = p;
        }
        if let Some(v) = get("VHB_SLOT") {
            self.slot_name = v;
        }
        if let Some(v) = get("VHB_PASSWORD") {
            self.password = v;
        }
        if let Some(v) = get("VHB_AUTO_CONNECT") {
            self.auto_connect = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
    }

    pub fn has_connection_info(&self) -> bool {
        !self.host.trim().is_empty() && self.port > 0 && !self.slot_name.trim().is_empty()
    }

    pub fn ws_url(&self) -> String {
        let host = self.host.trim();
        if host.starts_with("ws://") || host.starts_with("wss://") {
            return host.to_string();
        }
        format!("ws://{host}:{}", self.port)
    }

    pub fn password_opt(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(self.password.as_str())
        }
    }

    pub fn target(&self) -> ConnectTarget {
        ConnectTarget {
            url: self.ws_url(),
            slot_name: self.slot_name.trim().to_string(),
            password: self.password_opt().map(str::to_string),
        }
    }
}
