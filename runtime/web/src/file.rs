use crate::sandbox::js_message;
use futures::channel::oneshot;
use js_sys::Uint8Array;
use nesbridge_core::{BridgeError, FileSource};
use std::future::Future;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{File, FileReader, ProgressEvent};

/// A file picked through an `<input type="file">`.
pub struct BrowserFile {
    file: File,
}

impl BrowserFile {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl FileSource for BrowserFile {
    fn name(&self) -> String {
        self.file.name()
    }

    fn read(&self) -> impl Future<Output = Result<Vec<u8>, BridgeError>> + 'static {
        let name = self.file.name();
        let started = start_read(&self.file);
        async move {
            let (rx, _onloadend) = started.map_err(|e| BridgeError::read(&name, js_message(&e)))?;
            match rx.await {
                Ok(result) => result.map_err(|message| BridgeError::read(&name, message)),
                Err(_) => Err(BridgeError::read(&name, "read was cancelled")),
            }
        }
    }
}

type ReadResult = Result<Vec<u8>, String>;

/// Issue `readAsArrayBuffer` with the `loadend` handler already attached. The handler must
/// outlive the read, so it is handed back to the caller together with the receiver.
fn start_read(
    file: &File,
) -> Result<(oneshot::Receiver<ReadResult>, Closure<dyn FnMut(ProgressEvent)>), JsValue> {
    let reader = FileReader::new()?;
    let (tx, rx) = oneshot::channel();

    let done = reader.clone();
    let onloadend = Closure::once(move |_: ProgressEvent| {
        let _ = tx.send(read_result(&done));
    });
    reader.set_onloadend(Some(onloadend.as_ref().unchecked_ref()));
    reader.read_as_array_buffer(file)?;
    Ok((rx, onloadend))
}

fn read_result(reader: &FileReader) -> ReadResult {
    if let Some(err) = reader.error() {
        return Err(err.message());
    }
    let buffer = reader.result().map_err(|e| js_message(&e))?;
    if buffer.is_null() {
        return Err("no data".to_string());
    }
    Ok(Uint8Array::new(&buffer).to_vec())
}
