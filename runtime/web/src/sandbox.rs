use js_sys::{Array, Function, Object, Promise, Reflect, Uint8Array};
use nesbridge_core::{BridgeError, Sandbox};
use std::future::Future;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

/// The Emscripten `Module` object. The loader fills in `FS` and `ccall` on the object the page
/// defined, so both are looked up on every call rather than captured up front.
pub struct EmscriptenSandbox {
    module: Object,
}

impl EmscriptenSandbox {
    pub fn new(module: Object) -> Self {
        Self { module }
    }

    pub fn module(&self) -> &Object {
        &self.module
    }

    /// `Module.FS`, or the global `FS` when the build does not export it on `Module`.
    fn fs(&self) -> Result<JsValue, JsValue> {
        let fs = Reflect::get(&self.module, &"FS".into())?;
        if !fs.is_undefined() {
            return Ok(fs);
        }
        let fs = Reflect::get(&js_sys::global(), &"FS".into())?;
        if fs.is_undefined() {
            return Err("the runtime filesystem is not available".into());
        }
        Ok(fs)
    }

    fn method(target: &JsValue, name: &str) -> Result<Function, JsValue> {
        Reflect::get(target, &name.into())?
            .dyn_into::<Function>()
            .map_err(|_| JsValue::from_str(&format!("{name} is not a function")))
    }

    /// `Module.ccall(ident, null, argTypes, args, { async: true })`.
    ///
    /// The call is made immediately; only its completion is deferred. A synchronous return
    /// value is wrapped in a resolved promise so every entry point looks the same to callers.
    fn ccall(&self, ident: &str, args: &[&str]) -> Result<Promise, JsValue> {
        let ccall = Self::method(&self.module, "ccall")?;
        let arg_types: Array = args.iter().map(|_| JsValue::from_str("string")).collect();
        let arg_values: Array = args.iter().map(|a| JsValue::from_str(a)).collect();
        let opts = Object::new();
        Reflect::set(&opts, &"async".into(), &JsValue::TRUE)?;

        let call_args = Array::of5(
            &ident.into(),
            &JsValue::NULL,
            &arg_types,
            &arg_values,
            &opts,
        );
        let value = ccall.apply(&self.module, &call_args)?;
        Ok(Promise::resolve(&value))
    }

    fn call(
        &self,
        entry: &'static str,
        args: &[&str],
    ) -> impl Future<Output = Result<(), BridgeError>> + 'static + use<> {
        let issued = self
            .ccall(entry, args)
            .map_err(|e| BridgeError::sandbox(entry, js_message(&e)));
        async move {
            JsFuture::from(issued?)
                .await
                .map(|_| ())
                .map_err(|e| BridgeError::sandbox(entry, js_message(&e)))
        }
    }
}

impl Sandbox for EmscriptenSandbox {
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), BridgeError> {
        let write = || -> Result<(), JsValue> {
            let fs = self.fs()?;
            let write_file = Self::method(&fs, "writeFile")?;
            // Uint8Array::from copies; the host buffer may be dropped afterwards.
            let data = Uint8Array::from(bytes);
            write_file.call2(&fs, &path.into(), &data)?;
            Ok(())
        };
        write().map_err(|e| BridgeError::sandbox("writeFile", js_message(&e)))
    }

    fn run(&self) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        self.call("run", &[])
    }

    fn load_rom(&self, path: &str) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        self.call("loadRom", &[path])
    }
}

/// Best-effort text of a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    if let Some(text) = value.as_string() {
        return text;
    }
    format!("{value:?}")
}
