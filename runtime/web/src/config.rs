use nesbridge_core::{BridgeConfig, BridgeError};
use serde::Deserialize;
use wasm_bindgen::JsValue;

/// Bridge settings plus the ids of the page elements the bridge drives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageConfig {
    #[serde(flatten)]
    pub bridge: BridgeConfig,
    pub canvas_id: String,
    pub log_id: String,
    pub file_input_id: String,
    /// Read-only text field showing the picked file name.
    pub rom_name_id: Option<String>,
    /// URL of the Emscripten loader, appended once `Module` is defined.
    pub module_script: Option<String>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            canvas_id: "canvas".to_string(),
            log_id: "log".to_string(),
            file_input_id: "romFile".to_string(),
            rom_name_id: Some("romName".to_string()),
            module_script: None,
        }
    }
}

impl PageConfig {
    /// Parse a plain JS object. `undefined` and `null` select the defaults.
    pub fn from_js(value: JsValue) -> Result<Self, BridgeError> {
        if value.is_undefined() || value.is_null() {
            return Ok(Self::default());
        }
        serde_wasm_bindgen::from_value(value).map_err(|e| BridgeError::Config {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        self.bridge.validate()?;
        for (key, id) in [
            ("canvasId", &self.canvas_id),
            ("logId", &self.log_id),
            ("fileInputId", &self.file_input_id),
        ] {
            if id.is_empty() {
                return Err(BridgeError::Config {
                    message: format!("{key} must not be empty"),
                });
            }
        }
        if matches!(&self.module_script, Some(src) if src.is_empty()) {
            return Err(BridgeError::Config {
                message: "moduleScript must not be empty".into(),
            });
        }
        Ok(())
    }
}
