use futures::channel::oneshot;
use indexmap::IndexMap;
use nesbridge_core::{BridgeError, LogSink, Sandbox};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use tracing::debug;

/// One call that crossed into the sandbox, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCall {
    WriteFile { path: String, len: usize },
    Run,
    LoadRom { path: String },
}

/// In-process stand-in for the emulator runtime: an in-memory filesystem plus the two entry
/// points. Every call is recorded so the hand-off sequence can be inspected afterwards.
#[derive(Default)]
pub struct MemorySandbox {
    files: RefCell<IndexMap<String, Vec<u8>>>,
    calls: RefCell<Vec<SandboxCall>>,
    output: Option<Rc<dyn LogSink>>,
    fail_load: RefCell<Option<String>>,
    running: RefCell<Option<oneshot::Sender<()>>>,
}

impl MemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the runtime's own output lines to `output`.
    pub fn with_output(output: Rc<dyn LogSink>) -> Self {
        Self {
            output: Some(output),
            ..Self::default()
        }
    }

    /// Make every following `loadRom` call fail with `message`.
    pub fn fail_loads(&self, message: impl Into<String>) {
        *self.fail_load.borrow_mut() = Some(message.into());
    }

    pub fn accept_loads(&self) {
        self.fail_load.borrow_mut().take();
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<SandboxCall> {
        self.calls.borrow().clone()
    }

    pub fn load_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, SandboxCall::LoadRom { .. }))
            .count()
    }

    pub fn is_running(&self) -> bool {
        self.running.borrow().is_some()
    }

    /// End the emulator loop started by `run`.
    pub fn stop(&self) {
        if let Some(tx) = self.running.borrow_mut().take() {
            let _ = tx.send(());
        }
    }

    fn print(&self, text: &str) {
        if let Some(output) = &self.output {
            output.info(text);
        }
    }
}

impl Sandbox for MemorySandbox {
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), BridgeError> {
        self.calls.borrow_mut().push(SandboxCall::WriteFile {
            path: path.to_string(),
            len: bytes.len(),
        });
        self.files
            .borrow_mut()
            .insert(path.to_string(), bytes.to_vec());
        debug!(path, len = bytes.len(), "memfs write");
        Ok(())
    }

    fn run(&self) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        self.calls.borrow_mut().push(SandboxCall::Run);
        // A second `run` leaves the first loop's stop handle in place.
        let stopped = {
            let mut running = self.running.borrow_mut();
            if running.is_some() {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                *running = Some(tx);
                Some(rx)
            }
        };
        if stopped.is_some() {
            self.print("emulator started");
        }
        async move {
            let Some(stopped) = stopped else {
                return Err(BridgeError::sandbox("run", "emulator already running"));
            };
            let _ = stopped.await;
            Ok(())
        }
    }

    fn load_rom(&self, path: &str) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        self.calls.borrow_mut().push(SandboxCall::LoadRom {
            path: path.to_string(),
        });
        let result = match (self.fail_load.borrow().clone(), self.files.borrow().get(path)) {
            (Some(message), _) => Err(BridgeError::sandbox("loadRom", message)),
            (None, None) => Err(BridgeError::sandbox(
                "loadRom",
                format!("{path}: no such file"),
            )),
            (None, Some(bytes)) => Ok(bytes.len()),
        };
        let result = result.map(|len| self.print(&format!("mapped {path} ({len} bytes)")));
        futures::future::ready(result)
    }
}
