//! Readiness-gated cartridge hand-off between a host page and a sandboxed emulator runtime.
//!
//! The host provides three seams: a [`Sandbox`] (filesystem write plus the `run` / `loadRom`
//! entry points), a [`LogSink`] for user-visible diagnostics, and a [`FileSource`] per picked
//! file. [`BootstrapController`] sequences readiness and hand-off; [`FileIntake`] turns picked
//! files into cartridge submissions.

pub mod controller;
pub mod intake;
pub mod log_sink;
pub mod sandbox;

pub use controller::{
    BootstrapController, DisplaySurface, EmulatorSession, ReadyHooks, ReadySignal, Readiness,
    Submission,
};
pub use intake::{FileIntake, FileSource, Intake};
pub use log_sink::{LogSink, MemoryLog};
pub use sandbox::Sandbox;

pub use nesbridge_common::cartridge::{CartridgeBlob, CARTRIDGE_PATH};
pub use nesbridge_common::config::BridgeConfig;
pub use nesbridge_common::error::BridgeError;
pub use nesbridge_common::log::{LogLine, Severity};
