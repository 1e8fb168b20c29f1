use nesbridge_core::{LogSink, Severity};
use web_sys::{Document, Element};

/// Appends one `<div class="log-info|log-error">` per line to a container element.
pub struct DomLog {
    document: Document,
    container: Element,
    capacity: Option<usize>,
}

impl DomLog {
    pub fn new(document: Document, container: Element, capacity: Option<usize>) -> Self {
        Self {
            document,
            container,
            capacity,
        }
    }

    fn append(&self, severity: Severity, text: &str) -> Result<(), wasm_bindgen::JsValue> {
        let line = self.document.create_element("div")?;
        line.set_class_name(severity.css_class());
        line.set_text_content(Some(text));
        self.container.append_child(&line)?;

        if let Some(cap) = self.capacity {
            while self.container.child_element_count() as usize > cap.max(1) {
                match self.container.first_element_child() {
                    Some(oldest) => oldest.remove(),
                    None => break,
                }
            }
        }
        Ok(())
    }
}

impl LogSink for DomLog {
    fn write(&self, severity: Severity, text: &str) {
        if self.append(severity, text).is_err() {
            // The page is gone or the container detached; the console still works.
            let text = wasm_bindgen::JsValue::from_str(text);
            match severity {
                Severity::Info => web_sys::console::log_1(&text),
                Severity::Error => web_sys::console::error_1(&text),
            }
        }
    }
}
