//! Browser glue for the bridge.
//!
//! [`bootstrap`] defines the Emscripten `Module` object before the runtime script loads, so the
//! DOM log receives the runtime's very first output line. It then wires the file input and the
//! readiness watchdog and hands a [`Bridge`] back to the page.

pub mod config;
pub mod file;
pub mod log;
pub mod page;
pub mod sandbox;
pub mod trace;

pub use config::PageConfig;
pub use file::BrowserFile;
pub use log::DomLog;
pub use page::CanvasSurface;
pub use sandbox::EmscriptenSandbox;

use js_sys::{Object, Promise, Reflect};
use nesbridge_core::{
    BootstrapController, BridgeError, FileIntake, Intake, LogSink, ReadyHooks, ReadySignal,
    Readiness, Severity, Submission,
};
use std::rc::Rc;
use tracing::{Level, debug, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, HtmlCanvasElement, HtmlInputElement, HtmlScriptElement, Window};

type Controller = BootstrapController<EmscriptenSandbox>;

/// Handle returned to page scripts.
#[wasm_bindgen]
pub struct Bridge {
    intake: FileIntake<EmscriptenSandbox>,
    input: HtmlInputElement,
    rom_name: Option<HtmlInputElement>,
}

#[wasm_bindgen]
impl Bridge {
    /// Open the browser's file picker.
    #[wasm_bindgen(js_name = pickFile)]
    pub fn pick_file(&self) {
        self.input.click();
    }

    /// Load the file currently selected in the input. Resolves to the outcome name.
    #[wasm_bindgen(js_name = loadSelected)]
    pub fn load_selected(&self) -> Promise {
        let load = load_from_input(
            self.intake.clone(),
            self.input.clone(),
            self.rom_name.clone(),
        );
        wasm_bindgen_futures::future_to_promise(async move {
            Ok(JsValue::from_str(outcome_name(load.await)))
        })
    }

    pub fn readiness(&self) -> String {
        match self.intake.controller().readiness() {
            Readiness::NotReady => "not-ready".to_string(),
            Readiness::Ready => "ready".to_string(),
        }
    }

    #[wasm_bindgen(js_name = activeCartridge)]
    pub fn active_cartridge(&self) -> Option<String> {
        self.intake.controller().active_cartridge()
    }
}

/// Install the bridge on the current page.
///
/// `config` is a plain object of [`PageConfig`] fields; `undefined` selects the defaults.
#[wasm_bindgen]
pub fn bootstrap(config: JsValue) -> Result<Bridge, JsValue> {
    trace::init(Level::INFO);

    let config = PageConfig::from_js(config).map_err(to_js)?;
    config.validate().map_err(to_js)?;

    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;

    let canvas: HtmlCanvasElement =
        page::element_as(&document, &config.canvas_id).map_err(to_js)?;
    let input: HtmlInputElement =
        page::element_as(&document, &config.file_input_id).map_err(to_js)?;
    let rom_name = config
        .rom_name_id
        .as_deref()
        .map(|id| page::element_as::<HtmlInputElement>(&document, id))
        .transpose()
        .map_err(to_js)?;
    let log_container = page::element(&document, &config.log_id).map_err(to_js)?;

    // The sink exists before `Module` so no runtime output is ever dropped.
    let log = Rc::new(DomLog::new(
        document.clone(),
        log_container,
        config.bridge.log_capacity,
    ));

    let module = Object::new();
    let hooks = ReadyHooks::new()
        .normalize({
            let document = document.clone();
            move || page::reappend_stylesheets(&document)
        })
        .display(CanvasSurface::new(canvas.clone()));
    let controller = BootstrapController::new(
        EmscriptenSandbox::new(module.clone()),
        log.clone(),
        config.bridge.clone(),
        hooks,
    )
    .map_err(to_js)?;
    let intake = FileIntake::new(controller.clone());

    define_module(&window, &module, &canvas, log, &controller)?;
    watch_input(&intake, &input, rom_name.as_ref())?;
    if let Some(timeout_ms) = config.bridge.ready_timeout_ms {
        arm_watchdog(&window, &controller, timeout_ms)?;
    }
    if let Some(src) = &config.module_script {
        let script: HtmlScriptElement = document.create_element("script")?.dyn_into()?;
        script.set_src(src);
        let parent = document.head().ok_or("no <head>")?;
        parent.append_child(&script)?;
        debug!(src, "runtime script injected");
    }

    info!("bridge installed");
    Ok(Bridge {
        intake,
        input,
        rom_name,
    })
}

/// Define `window.Module` with the output relays, the canvas and the readiness callback.
///
/// The callbacks live as long as the page, so they are leaked to JS.
fn define_module(
    window: &Window,
    module: &Object,
    canvas: &HtmlCanvasElement,
    log: Rc<dyn LogSink>,
    controller: &Controller,
) -> Result<(), JsValue> {
    let print = relay(Rc::clone(&log), Severity::Info);
    let print_err = relay(log, Severity::Error);
    Reflect::set(module, &"print".into(), print.as_ref())?;
    Reflect::set(module, &"printErr".into(), print_err.as_ref())?;
    Reflect::set(module, &"canvas".into(), canvas)?;

    // The runtime may fire this more than once; the controller ignores repeats.
    let controller = controller.clone();
    let on_ready: Closure<dyn FnMut()> = Closure::new(move || {
        let controller = controller.clone();
        spawn_local(async move {
            if let ReadySignal::Accepted {
                session: Some(session),
                ..
            } = controller.on_runtime_ready().await
            {
                session.await;
            }
        });
    });
    Reflect::set(module, &"onRuntimeInitialized".into(), on_ready.as_ref())?;

    print.forget();
    print_err.forget();
    on_ready.forget();

    Reflect::set(window, &"Module".into(), module)?;
    Ok(())
}

fn relay(log: Rc<dyn LogSink>, severity: Severity) -> Closure<dyn FnMut(JsValue)> {
    Closure::new(move |text: JsValue| {
        let text = text.as_string().unwrap_or_else(|| format!("{text:?}"));
        log.write(severity, &text);
    })
}

fn watch_input(
    intake: &FileIntake<EmscriptenSandbox>,
    input: &HtmlInputElement,
    rom_name: Option<&HtmlInputElement>,
) -> Result<(), JsValue> {
    let intake = intake.clone();
    let target = input.clone();
    let rom_name = rom_name.cloned();
    let on_change: Closure<dyn FnMut(Event)> = Closure::new(move |_: Event| {
        let load = load_from_input(intake.clone(), target.clone(), rom_name.clone());
        spawn_local(async move {
            let outcome = load.await;
            debug!(?outcome, "picked file processed");
        });
    });
    input.add_event_listener_with_callback("change", on_change.as_ref().unchecked_ref())?;
    on_change.forget();
    Ok(())
}

fn arm_watchdog(window: &Window, controller: &Controller, timeout_ms: u64) -> Result<(), JsValue> {
    let controller = controller.clone();
    let deadline: Closure<dyn FnMut()> = Closure::once(move || {
        controller.on_ready_deadline();
    });
    window.set_timeout_with_callback_and_timeout_and_arguments_0(
        deadline.as_ref().unchecked_ref(),
        i32::try_from(timeout_ms).unwrap_or(i32::MAX),
    )?;
    deadline.forget();
    Ok(())
}

/// Read the input's first file and submit it. The input stays disabled while a read is
/// outstanding.
async fn load_from_input(
    intake: FileIntake<EmscriptenSandbox>,
    input: HtmlInputElement,
    rom_name: Option<HtmlInputElement>,
) -> Intake {
    let file = input.files().and_then(|files| files.get(0));
    if let Some(file) = &file {
        page::show_rom_name(rom_name.as_ref(), &file.name());
    }

    input.set_disabled(true);
    let outcome = intake.load_selected(file.map(BrowserFile::new)).await;
    if !intake.is_busy() {
        input.set_disabled(false);
    }
    outcome
}

fn outcome_name(outcome: Intake) -> &'static str {
    match outcome {
        Intake::Submitted(Submission::Loaded) => "loaded",
        Intake::Submitted(Submission::Queued) => "queued",
        Intake::Submitted(Submission::Superseded) | Intake::Superseded => "superseded",
        Intake::Submitted(Submission::Failed) | Intake::Failed => "failed",
        Intake::NoFile => "no-file",
    }
}

fn to_js(err: BridgeError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
