use crate::cartridge::CARTRIDGE_PATH;
use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

/// Host-side bridge settings. Every field has a default so partial configs are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Sandbox filesystem entry used for every cartridge.
    pub cartridge_path: String,
    /// Issue the `run` entry point as soon as the runtime is ready.
    pub start_on_ready: bool,
    /// Report an error if the runtime has not signalled readiness after this long.
    pub ready_timeout_ms: Option<u64>,
    /// Maximum number of retained log lines; unbounded when absent.
    pub log_capacity: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cartridge_path: CARTRIDGE_PATH.to_string(),
            start_on_ready: true,
            ready_timeout_ms: Some(15_000),
            log_capacity: None,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.cartridge_path.is_empty() {
            return Err(BridgeError::Config {
                message: "cartridgePath must not be empty".into(),
            });
        }
        if self.cartridge_path.contains('/') {
            return Err(BridgeError::Config {
                message: format!(
                    "cartridgePath must be a bare file name, found '{}'",
                    self.cartridge_path
                ),
            });
        }
        if self.log_capacity == Some(0) {
            return Err(BridgeError::Config {
                message: "logCapacity must be at least 1".into(),
            });
        }
        Ok(())
    }
}
