use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Could not read {name}: {message}")]
    ReadError { name: String, message: String },

    #[error("Cartridge hand-off attempted before the sandbox runtime was ready")]
    PrematureLoadAttempt,

    #[error("Sandbox call {entry}() failed: {message}")]
    SandboxCallFailure { entry: &'static str, message: String },

    #[error("Sandbox runtime did not signal readiness within {timeout_ms} ms")]
    InitTimeout { timeout_ms: u64 },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl BridgeError {
    pub fn read(name: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::ReadError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn sandbox(entry: &'static str, message: impl Into<String>) -> Self {
        BridgeError::SandboxCallFailure {
            entry,
            message: message.into(),
        }
    }

    /// Whether the error should be shown to the user at all.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            BridgeError::NoFileSelected | BridgeError::PrematureLoadAttempt
        )
    }
}
