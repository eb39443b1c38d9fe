//! # Bridge Configuration
//!
//! Names of the engine globals, the first correlation id, and the
//! thresholds used by registry diagnostics.
//!
//! Two loading paths:
//!
//! - [`BridgeConfig::from_env`] reads the explicit `SCRIPT_BRIDGE_*`
//!   variables and reports parse failures precisely.
//! - [`BridgeConfig::load`] layers the defaults and the `SCRIPT_BRIDGE_`
//!   environment through the `config` crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{env, globals, MAX_SAFE_TOKEN};
use crate::error::{BridgeError, Result};
use crate::registry::CorrelationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the global fetch function
    pub fetch_global: String,
    /// Name of the global socket host object
    pub websocket_global: String,
    /// First id produced by each allocator
    pub id_base: CorrelationId,
    /// Registry entries older than this are reported as aging
    pub pending_age_warning_ms: u64,
    pub event_loop_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fetch_global: globals::FETCH.to_string(),
            websocket_global: globals::WEBSOCKET.to_string(),
            id_base: 0,
            pending_age_warning_ms: 30_000,
            event_loop_thread_name: "script-bridge-loop".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var(env::FETCH_GLOBAL) {
            config.fetch_global = name;
        }

        if let Ok(name) = std::env::var(env::WEBSOCKET_GLOBAL) {
            config.websocket_global = name;
        }

        if let Ok(id_base) = std::env::var(env::ID_BASE) {
            config.id_base = id_base.parse().map_err(|e| {
                BridgeError::Configuration(format!("Invalid id_base: {e}"))
            })?;
        }

        if let Ok(warning_ms) = std::env::var(env::PENDING_AGE_WARNING_MS) {
            config.pending_age_warning_ms = warning_ms.parse().map_err(|e| {
                BridgeError::Configuration(format!("Invalid pending_age_warning_ms: {e}"))
            })?;
        }

        if let Ok(name) = std::env::var(env::EVENT_LOOP_THREAD_NAME) {
            config.event_loop_thread_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the `SCRIPT_BRIDGE_` environment
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let config: Self = ::config::Config::builder()
            .set_default("fetch_global", defaults.fetch_global)
            .and_then(|b| b.set_default("websocket_global", defaults.websocket_global))
            .and_then(|b| b.set_default("id_base", defaults.id_base))
            .and_then(|b| b.set_default("pending_age_warning_ms", defaults.pending_age_warning_ms))
            .and_then(|b| {
                b.set_default("event_loop_thread_name", defaults.event_loop_thread_name)
            })
            .map_err(|e| BridgeError::Configuration(e.to_string()))?
            .add_source(::config::Environment::with_prefix(env::PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BridgeError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_global.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "fetch_global must not be empty".to_string(),
            ));
        }
        if self.websocket_global.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "websocket_global must not be empty".to_string(),
            ));
        }
        if self.fetch_global == self.websocket_global {
            return Err(BridgeError::Configuration(format!(
                "fetch_global and websocket_global are both '{}'",
                self.fetch_global
            )));
        }
        if !(0..=MAX_SAFE_TOKEN).contains(&self.id_base) {
            return Err(BridgeError::Configuration(format!(
                "id_base {} is outside 0..={MAX_SAFE_TOKEN}",
                self.id_base
            )));
        }
        Ok(())
    }

    pub fn pending_age_warning(&self) -> Duration {
        Duration::from_millis(self.pending_age_warning_ms)
    }
}
