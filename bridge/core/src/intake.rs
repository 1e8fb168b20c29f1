use crate::controller::{BootstrapController, Submission};
use crate::sandbox::Sandbox;
use nesbridge_common::cartridge::CartridgeBlob;
use nesbridge_common::error::BridgeError;
use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use tracing::debug;

/// A host file the user picked. Reading it is asynchronous and may fail.
pub trait FileSource {
    /// The file name shown to the user.
    fn name(&self) -> String;

    /// Read the whole file into memory.
    fn read(&self) -> impl Future<Output = Result<Vec<u8>, BridgeError>> + 'static;
}

/// What happened to one picked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    Submitted(Submission),
    /// Nothing was picked.
    NoFile,
    /// Another file was picked before this one finished reading.
    Superseded,
    /// The read failed; the error was written to the log sink.
    Failed,
}

#[derive(Default)]
struct Reads {
    latest: Cell<u64>,
    outstanding: Cell<usize>,
}

/// Counts one outstanding read for as long as it lives, even if the read is abandoned.
struct Outstanding(Rc<Reads>);

impl Outstanding {
    fn start(reads: &Rc<Reads>) -> Self {
        reads.outstanding.set(reads.outstanding.get() + 1);
        Self(Rc::clone(reads))
    }
}

impl Drop for Outstanding {
    fn drop(&mut self) {
        self.0.outstanding.set(self.0.outstanding.get() - 1);
    }
}

/// Reads picked files and forwards the bytes to the controller.
pub struct FileIntake<S: Sandbox> {
    controller: BootstrapController<S>,
    reads: Rc<Reads>,
}

impl<S: Sandbox> Clone for FileIntake<S> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            reads: Rc::clone(&self.reads),
        }
    }
}

impl<S: Sandbox + 'static> FileIntake<S> {
    pub fn new(controller: BootstrapController<S>) -> Self {
        Self {
            controller,
            reads: Rc::default(),
        }
    }

    pub fn controller(&self) -> &BootstrapController<S> {
        &self.controller
    }

    /// A read is outstanding; the host should keep its picker disabled.
    pub fn is_busy(&self) -> bool {
        self.reads.outstanding.get() > 0
    }

    /// Read the picked file into a cartridge blob.
    pub async fn read_selected<F: FileSource>(
        &self,
        file: Option<F>,
    ) -> Result<CartridgeBlob, BridgeError> {
        let file = file.ok_or(BridgeError::NoFileSelected)?;
        let name = file.name();
        let bytes = file.read().await?;
        Ok(CartridgeBlob::new(name, bytes))
    }

    /// Read the picked file and submit it. Only the most recently picked file is submitted;
    /// reads that finish after a newer pick are discarded.
    pub async fn load_selected<F: FileSource>(&self, file: Option<F>) -> Intake {
        if file.is_none() {
            debug!("no file selected");
            return Intake::NoFile;
        }

        let ticket = self.reads.latest.get() + 1;
        self.reads.latest.set(ticket);

        let outstanding = Outstanding::start(&self.reads);
        let result = self.read_selected(file).await;
        drop(outstanding);

        if self.reads.latest.get() != ticket {
            debug!("discarding superseded read");
            return Intake::Superseded;
        }

        match result {
            Ok(blob) => {
                debug!(name = blob.name(), len = blob.len(), "file read");
                Intake::Submitted(self.controller.submit_cartridge(blob).await)
            }
            Err(BridgeError::NoFileSelected) => Intake::NoFile,
            Err(err) => {
                self.controller.log().error(&err.to_string());
                Intake::Failed
            }
        }
    }
}
