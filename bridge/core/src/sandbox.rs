use nesbridge_common::error::BridgeError;
use std::future::Future;
use std::rc::Rc;

/// The foreign-call boundary into the sandboxed emulator runtime.
///
/// Both entry points use one calling convention: the call is issued when the method is
/// invoked, and the returned future resolves when the entry point returns. A synchronous
/// boundary returns an already-completed future.
pub trait Sandbox {
    /// Write `bytes` to `path` in the sandbox filesystem, replacing any existing entry.
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), BridgeError>;

    /// Start the emulator with no cartridge. Resolves when the emulator loop exits.
    fn run(&self) -> impl Future<Output = Result<(), BridgeError>> + 'static;

    /// Hot-load the cartridge stored at `path`.
    fn load_rom(&self, path: &str) -> impl Future<Output = Result<(), BridgeError>> + 'static;
}

impl<T: Sandbox> Sandbox for Rc<T> {
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), BridgeError> {
        (**self).write_file(path, bytes)
    }

    fn run(&self) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        (**self).run()
    }

    fn load_rom(&self, path: &str) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        (**self).load_rom(path)
    }
}
