//! Native host for the bridge: an in-process sandbox and filesystem-backed file sources.

pub mod file;
pub mod sandbox;

pub use file::FsFile;
pub use sandbox::{MemorySandbox, SandboxCall};
