//! Small DOM helpers: element lookup, the canvas surface and readiness-time fixups.

use nesbridge_core::{BridgeError, DisplaySurface};
use tracing::debug;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlCanvasElement, HtmlInputElement};

pub fn element(document: &Document, id: &str) -> Result<Element, BridgeError> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| BridgeError::Config {
            message: format!("no element with id '{id}'"),
        })
}

pub fn element_as<T: JsCast>(document: &Document, id: &str) -> Result<T, BridgeError> {
    element(document, id)?
        .dyn_into::<T>()
        .map_err(|_| BridgeError::Config {
            message: format!("element '{id}' has the wrong type"),
        })
}

/// The emulator canvas, sized to its parent when the runtime becomes ready.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas }
    }
}

impl DisplaySurface for CanvasSurface {
    fn container_size(&self) -> Option<(u32, u32)> {
        let parent = self.canvas.parent_element()?;
        let width = u32::try_from(parent.client_width()).ok()?;
        let height = u32::try_from(parent.client_height()).ok()?;
        Some((width, height))
    }

    fn resize(&self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }
}

/// Move the page's stylesheets back to the end of `<head>`, after anything the runtime
/// injected during startup, so page styles win again.
pub fn reappend_stylesheets(document: &Document) {
    let Some(head) = document.head() else {
        return;
    };
    let Ok(nodes) = document.query_selector_all("head link[rel='stylesheet'], head style") else {
        return;
    };
    for i in 0..nodes.length() {
        if let Some(node) = nodes.get(i) {
            let _ = head.append_child(&node);
        }
    }
    debug!(count = nodes.length(), "stylesheets re-appended");
}

/// Show the picked file name in the read-only name field.
pub fn show_rom_name(field: Option<&HtmlInputElement>, name: &str) {
    if let Some(field) = field {
        field.set_value(name);
    }
}
