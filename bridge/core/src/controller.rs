//! Readiness state machine and cartridge hand-off.
//!
//! The gate has four internal phases. `Closed` until the runtime signals readiness,
//! `Normalizing` while the environment fixups run, `Opening` while `run` is issued and the
//! display is sized, `Open` afterwards. Outside callers only see [`Readiness`], which turns
//! `Ready` once the fixups are done. A cartridge reaches the sandbox only through an `Open`
//! gate, so every hand-off observes the completed readiness effects.

use crate::log_sink::LogSink;
use crate::sandbox::Sandbox;
use futures::future::LocalBoxFuture;
use nesbridge_common::cartridge::CartridgeBlob;
use nesbridge_common::config::BridgeConfig;
use nesbridge_common::error::BridgeError;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NotReady,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Closed,
    Normalizing,
    Opening,
    Open,
}

/// A drawable region owned by the bridge, sized once when the emulator starts.
pub trait DisplaySurface {
    /// Layout size of the surface's container, `None` if it has not been laid out.
    fn container_size(&self) -> Option<(u32, u32)>;

    fn resize(&self, width: u32, height: u32);
}

/// One-time effects applied when the runtime signals readiness.
#[derive(Default)]
pub struct ReadyHooks {
    normalize: Vec<Box<dyn FnOnce()>>,
    display: Option<Box<dyn DisplaySurface>>,
}

impl ReadyHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment fixup run before the readiness transition, in registration order.
    pub fn normalize(mut self, hook: impl FnOnce() + 'static) -> Self {
        self.normalize.push(Box::new(hook));
        self
    }

    pub fn display(mut self, surface: impl DisplaySurface + 'static) -> Self {
        self.display = Some(Box::new(surface));
        self
    }
}

/// Outcome of a single cartridge submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The sandbox accepted `loadRom` for this cartridge.
    Loaded,
    /// Parked in the pending slot until the gate opens or the in-flight load completes.
    Queued,
    /// A newer cartridge was submitted before this load completed.
    Superseded,
    /// The hand-off failed and the error was written to the log sink.
    Failed,
}

/// The running emulator loop. Resolves when the `run` entry point returns.
pub struct EmulatorSession(LocalBoxFuture<'static, ()>);

impl Future for EmulatorSession {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.0.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for EmulatorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EmulatorSession")
    }
}

#[derive(Debug)]
pub enum ReadySignal {
    /// First signal: readiness effects applied and any pending cartridge flushed.
    Accepted {
        session: Option<EmulatorSession>,
        flushed: Option<Submission>,
    },
    /// The runtime signalled readiness again; nothing happened.
    Ignored,
}

struct PendingLoad {
    ticket: u64,
    blob: CartridgeBlob,
}

struct State {
    gate: Gate,
    pending: Option<PendingLoad>,
    in_flight: bool,
    latest: u64,
    active: Option<String>,
    timeout_reported: bool,
}

struct Inner<S> {
    sandbox: S,
    log: Rc<dyn LogSink>,
    config: BridgeConfig,
    hooks: RefCell<Option<ReadyHooks>>,
    state: RefCell<State>,
}

/// Owns readiness and the single cartridge slot. Cheap to clone; clones share state.
pub struct BootstrapController<S: Sandbox> {
    inner: Rc<Inner<S>>,
}

impl<S: Sandbox> Clone for BootstrapController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: Sandbox + 'static> BootstrapController<S> {
    pub fn new(
        sandbox: S,
        log: Rc<dyn LogSink>,
        config: BridgeConfig,
        hooks: ReadyHooks,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self {
            inner: Rc::new(Inner {
                sandbox,
                log,
                config,
                hooks: RefCell::new(Some(hooks)),
                state: RefCell::new(State {
                    gate: Gate::Closed,
                    pending: None,
                    in_flight: false,
                    latest: 0,
                    active: None,
                    timeout_reported: false,
                }),
            }),
        })
    }

    pub fn readiness(&self) -> Readiness {
        match self.inner.state.borrow().gate {
            Gate::Closed | Gate::Normalizing => Readiness::NotReady,
            Gate::Opening | Gate::Open => Readiness::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    pub fn has_pending(&self) -> bool {
        self.inner.state.borrow().pending.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().in_flight
    }

    /// Name of the cartridge most recently accepted by the sandbox.
    pub fn active_cartridge(&self) -> Option<String> {
        self.inner.state.borrow().active.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn log(&self) -> Rc<dyn LogSink> {
        Rc::clone(&self.inner.log)
    }

    pub fn sandbox(&self) -> &S {
        &self.inner.sandbox
    }

    /// Called by the runtime once its initialization completes.
    ///
    /// Only the first call has any effect. Normalization hooks run, readiness becomes
    /// `Ready`, `run` is issued (not awaited), the display is fitted to its container, and
    /// finally the pending cartridge, if any, is handed off.
    pub async fn on_runtime_ready(&self) -> ReadySignal {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.gate != Gate::Closed {
                warn!("ignoring repeated runtime-ready signal");
                return ReadySignal::Ignored;
            }
            state.gate = Gate::Normalizing;
        }

        let ReadyHooks { normalize, display } =
            self.inner.hooks.borrow_mut().take().unwrap_or_default();
        for hook in normalize {
            hook();
        }
        self.inner.state.borrow_mut().gate = Gate::Opening;
        debug!("environment normalized");

        let session = if self.inner.config.start_on_ready {
            Some(self.start_emulator())
        } else {
            None
        };

        if let Some(display) = display.as_deref() {
            fit_display(display);
        }

        self.inner.state.borrow_mut().gate = Gate::Open;
        info!("sandbox runtime ready");

        let flushed = self.flush_pending().await;
        ReadySignal::Accepted { session, flushed }
    }

    /// Hand a cartridge to the sandbox, or park it until that is allowed.
    ///
    /// Returns once the sandbox has accepted (or rejected) the load. Failures are written to
    /// the log sink rather than returned.
    pub async fn submit_cartridge(&self, blob: CartridgeBlob) -> Submission {
        let load = {
            let mut state = self.inner.state.borrow_mut();
            state.latest += 1;
            let load = PendingLoad {
                ticket: state.latest,
                blob,
            };
            if state.gate != Gate::Open || state.in_flight {
                debug!(name = load.blob.name(), "cartridge queued");
                if let Some(replaced) = state.pending.replace(load) {
                    debug!(name = replaced.blob.name(), "pending cartridge superseded");
                }
                return Submission::Queued;
            }
            // Left behind by an abandoned hand-off; this submission is newer.
            if let Some(stale) = state.pending.take() {
                debug!(name = stale.blob.name(), "pending cartridge superseded");
            }
            state.in_flight = true;
            load
        };
        self.drive(load).await
    }

    /// Hand off a cartridge still parked in the pending slot. Only needed after a caller
    /// dropped its `submit_cartridge` future mid-load; otherwise the slot drains by itself.
    pub async fn resume(&self) -> Option<Submission> {
        if self.inner.state.borrow().gate != Gate::Open {
            return None;
        }
        self.flush_pending().await
    }

    /// Report a missed readiness deadline. Returns `true` the first time it fires while the
    /// runtime is still not ready.
    pub fn on_ready_deadline(&self) -> bool {
        let Some(timeout_ms) = self.inner.config.ready_timeout_ms else {
            return false;
        };
        {
            let mut state = self.inner.state.borrow_mut();
            if state.gate != Gate::Closed || state.timeout_reported {
                return false;
            }
            state.timeout_reported = true;
        }
        let err = BridgeError::InitTimeout { timeout_ms };
        warn!("{err}");
        self.inner.log.error(&err.to_string());
        true
    }

    fn start_emulator(&self) -> EmulatorSession {
        info!("starting emulator");
        let run = self.inner.sandbox.run();
        let log = Rc::clone(&self.inner.log);
        EmulatorSession(Box::pin(async move {
            match run.await {
                Ok(()) => {
                    info!("emulator loop exited");
                    log.info("Emulator stopped");
                }
                Err(err) => {
                    warn!("{err}");
                    log.error(&err.to_string());
                }
            }
        }))
    }

    async fn flush_pending(&self) -> Option<Submission> {
        let load = {
            let mut state = self.inner.state.borrow_mut();
            if state.in_flight {
                return None;
            }
            let load = state.pending.take()?;
            state.in_flight = true;
            load
        };
        Some(self.drive(load).await)
    }

    /// Run hand-offs back to back until the pending slot is empty. Returns the outcome of the
    /// first load.
    async fn drive(&self, mut load: PendingLoad) -> Submission {
        let mut guard = InFlight {
            inner: Rc::clone(&self.inner),
            finished: false,
        };
        let first = load.ticket;
        let mut outcome = Submission::Superseded;
        loop {
            let result = self.hand_off(&load.blob).await;
            let (superseded, next) = {
                let mut state = self.inner.state.borrow_mut();
                let superseded = state.latest != load.ticket;
                if result.is_ok() && !superseded {
                    state.active = Some(load.blob.name().to_string());
                }
                let next = state.pending.take();
                if next.is_none() {
                    state.in_flight = false;
                    guard.finished = true;
                }
                (superseded, next)
            };
            let this = self.report(&load.blob, result, superseded);
            if load.ticket == first {
                outcome = this;
            }
            match next {
                Some(pending) => load = pending,
                None => return outcome,
            }
        }
    }

    async fn hand_off(&self, blob: &CartridgeBlob) -> Result<(), BridgeError> {
        if self.inner.state.borrow().gate != Gate::Open {
            return Err(BridgeError::PrematureLoadAttempt);
        }
        let path = self.inner.config.cartridge_path.as_str();
        self.inner.sandbox.write_file(path, blob.bytes())?;
        debug!(path, len = blob.len(), "cartridge written to sandbox filesystem");
        self.inner.sandbox.load_rom(path).await
    }

    fn report(
        &self,
        blob: &CartridgeBlob,
        result: Result<(), BridgeError>,
        superseded: bool,
    ) -> Submission {
        match result {
            _ if superseded => {
                debug!(name = blob.name(), "discarding result of superseded load");
                Submission::Superseded
            }
            Ok(()) => {
                info!(name = blob.name(), len = blob.len(), "cartridge loaded");
                self.inner.log.info(&format!("Loaded {}", blob.summary()));
                Submission::Loaded
            }
            Err(err) => {
                warn!(name = blob.name(), "cartridge hand-off failed: {err}");
                if err.is_user_visible() {
                    self.inner.log.error(&err.to_string());
                }
                Submission::Failed
            }
        }
    }
}

/// Clears the in-flight flag when a hand-off loop is dropped before it drains.
struct InFlight<S> {
    inner: Rc<Inner<S>>,
    finished: bool,
}

impl<S> Drop for InFlight<S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(mut state) = self.inner.state.try_borrow_mut() {
            state.in_flight = false;
            warn!(
                pending = state.pending.is_some(),
                "cartridge hand-off abandoned before completion"
            );
        }
    }
}

fn fit_display(display: &dyn DisplaySurface) {
    match display.container_size() {
        Some((width, height)) if width > 0 && height > 0 => {
            display.resize(width, height);
            debug!(width, height, "display sized to container");
        }
        _ => warn!("display container has no layout size; leaving display unsized"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLog;
    use futures::channel::oneshot;
    use futures::FutureExt;
    use futures::executor::{LocalPool, block_on};
    use futures::task::LocalSpawnExt;
    use nesbridge_common::log::LogLine;
    use std::cell::Cell;
    use std::collections::{HashMap, VecDeque};

    #[derive(Default)]
    struct FakeSandbox {
        files: RefCell<HashMap<String, Vec<u8>>>,
        calls: RefCell<Vec<String>>,
        loaded: RefCell<Vec<Vec<u8>>>,
        deferred: Cell<bool>,
        waiting: RefCell<VecDeque<oneshot::Sender<Result<(), BridgeError>>>>,
        fail_load: RefCell<Option<String>>,
    }

    impl FakeSandbox {
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn complete_next(&self, result: Result<(), BridgeError>) {
            let tx = self.waiting.borrow_mut().pop_front().expect("no load in flight");
            let _ = tx.send(result);
        }
    }

    impl Sandbox for FakeSandbox {
        fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), BridgeError> {
            self.calls
                .borrow_mut()
                .push(format!("writeFile {path} ({} bytes)", bytes.len()));
            self.files.borrow_mut().insert(path.to_string(), bytes.to_vec());
            Ok(())
        }

        fn run(&self) -> impl Future<Output = Result<(), BridgeError>> + 'static {
            self.calls.borrow_mut().push("run".into());
            futures::future::pending()
        }

        fn load_rom(&self, path: &str) -> impl Future<Output = Result<(), BridgeError>> + 'static {
            self.calls.borrow_mut().push(format!("loadRom {path}"));
            let contents = self.files.borrow().get(path).cloned();
            self.loaded
                .borrow_mut()
                .push(contents.clone().unwrap_or_default());
            let (tx, rx) = oneshot::channel();
            if self.deferred.get() {
                self.waiting.borrow_mut().push_back(tx);
            } else {
                let result = match (self.fail_load.borrow().clone(), contents) {
                    (Some(message), _) => Err(BridgeError::sandbox("loadRom", message)),
                    (None, None) => Err(BridgeError::sandbox("loadRom", "no such file")),
                    (None, Some(_)) => Ok(()),
                };
                let _ = tx.send(result);
            }
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(BridgeError::sandbox("loadRom", "call abandoned")))
            }
        }
    }

    struct FakeDisplay {
        sandbox: Rc<FakeSandbox>,
        size: Option<(u32, u32)>,
    }

    impl DisplaySurface for FakeDisplay {
        fn container_size(&self) -> Option<(u32, u32)> {
            self.size
        }

        fn resize(&self, width: u32, height: u32) {
            self.sandbox
                .calls
                .borrow_mut()
                .push(format!("resize {width}x{height}"));
        }
    }

    fn setup(
        config: BridgeConfig,
        hooks: ReadyHooks,
    ) -> (BootstrapController<Rc<FakeSandbox>>, Rc<FakeSandbox>, Rc<MemoryLog>) {
        let sandbox = Rc::new(FakeSandbox::default());
        let log = Rc::new(MemoryLog::new());
        let controller =
            BootstrapController::new(Rc::clone(&sandbox), log.clone(), config, hooks).unwrap();
        (controller, sandbox, log)
    }

    fn rom(name: &str, fill: u8, len: usize) -> CartridgeBlob {
        CartridgeBlob::new(name, vec![fill; len])
    }

    #[test]
    fn test_ready_then_load() {
        let (controller, sandbox, log) = setup(BridgeConfig::default(), ReadyHooks::new());
        assert_eq!(controller.readiness(), Readiness::NotReady);

        let signal = block_on(controller.on_runtime_ready());
        assert!(matches!(
            signal,
            ReadySignal::Accepted { session: Some(_), flushed: None }
        ));
        assert!(controller.is_ready());

        let blob = rom("game.nes", 0xEA, 40 * 1024);
        let outcome = block_on(controller.submit_cartridge(blob.clone()));
        assert_eq!(outcome, Submission::Loaded);
        assert_eq!(
            sandbox.calls(),
            vec!["run", "writeFile rom.nes (40960 bytes)", "loadRom rom.nes"]
        );
        assert_eq!(sandbox.files.borrow()["rom.nes"], blob.bytes());
        assert!(log.errors().is_empty());
        assert_eq!(controller.active_cartridge().as_deref(), Some("game.nes"));
    }

    #[test]
    fn test_submission_before_ready_is_flushed_once() {
        let (controller, sandbox, _log) = setup(BridgeConfig::default(), ReadyHooks::new());
        let blob = rom("early.nes", 0x4C, 2048);

        assert_eq!(block_on(controller.submit_cartridge(blob.clone())), Submission::Queued);
        assert!(sandbox.calls().is_empty());
        assert!(controller.has_pending());

        let signal = block_on(controller.on_runtime_ready());
        assert!(matches!(
            signal,
            ReadySignal::Accepted { flushed: Some(Submission::Loaded), .. }
        ));
        assert!(!controller.has_pending());
        assert_eq!(
            sandbox.calls(),
            vec!["run", "writeFile rom.nes (2048 bytes)", "loadRom rom.nes"]
        );
        assert_eq!(*sandbox.loaded.borrow(), vec![blob.bytes().to_vec()]);

        assert!(matches!(block_on(controller.on_runtime_ready()), ReadySignal::Ignored));
        assert_eq!(sandbox.loaded.borrow().len(), 1);
    }

    #[test]
    fn test_latest_early_submission_wins() {
        let (controller, sandbox, _log) = setup(BridgeConfig::default(), ReadyHooks::new());
        block_on(controller.submit_cartridge(rom("first.nes", 1, 16)));
        block_on(controller.submit_cartridge(rom("second.nes", 2, 32)));

        block_on(controller.on_runtime_ready());
        assert_eq!(*sandbox.loaded.borrow(), vec![vec![2u8; 32]]);
        assert_eq!(controller.active_cartridge().as_deref(), Some("second.nes"));
    }

    #[test]
    fn test_repeated_ready_signal_is_ignored() {
        let (controller, sandbox, _log) = setup(BridgeConfig::default(), ReadyHooks::new());
        block_on(controller.on_runtime_ready());
        for _ in 0..3 {
            assert!(matches!(block_on(controller.on_runtime_ready()), ReadySignal::Ignored));
        }
        assert_eq!(sandbox.calls(), vec!["run"]);
        assert_eq!(controller.readiness(), Readiness::Ready);
    }

    #[test]
    fn test_readiness_effects_are_ordered() {
        let sandbox = Rc::new(FakeSandbox::default());
        let hook_sandbox = Rc::clone(&sandbox);
        let observed = Rc::new(RefCell::new(None::<BootstrapController<Rc<FakeSandbox>>>));
        let hook_observed = Rc::clone(&observed);
        let hooks = ReadyHooks::new()
            .normalize(move || {
                let readiness = hook_observed.borrow().as_ref().map(|c| c.readiness());
                hook_sandbox
                    .calls
                    .borrow_mut()
                    .push(format!("normalize ({readiness:?})"));
            })
            .display(FakeDisplay {
                sandbox: Rc::clone(&sandbox),
                size: Some((640, 480)),
            });
        let log = Rc::new(MemoryLog::new());
        let controller =
            BootstrapController::new(Rc::clone(&sandbox), log, BridgeConfig::default(), hooks)
                .unwrap();
        *observed.borrow_mut() = Some(controller.clone());

        block_on(controller.submit_cartridge(rom("queued.nes", 0, 8)));
        block_on(controller.on_runtime_ready());
        assert_eq!(
            sandbox.calls(),
            vec![
                "normalize (Some(NotReady))",
                "run",
                "resize 640x480",
                "writeFile rom.nes (8 bytes)",
                "loadRom rom.nes",
            ]
        );
        assert_eq!(controller.readiness(), Readiness::Ready);
        observed.borrow_mut().take();
    }

    #[test]
    fn test_dropped_submission_does_not_block_later_loads() {
        let (controller, sandbox, log) = setup(BridgeConfig::default(), ReadyHooks::new());
        block_on(controller.on_runtime_ready());

        sandbox.deferred.set(true);
        assert_eq!(controller.submit_cartridge(rom("a.nes", 0xA, 16)).now_or_never(), None);
        assert!(!controller.is_loading());

        sandbox.deferred.set(false);
        let outcome = block_on(controller.submit_cartridge(rom("b.nes", 0xB, 32)));
        assert_eq!(outcome, Submission::Loaded);
        assert_eq!(sandbox.loaded.borrow().last(), Some(&vec![0xB; 32]));
        assert_eq!(controller.active_cartridge().as_deref(), Some("b.nes"));
        assert_eq!(
            log.lines(),
            vec![LogLine::info("Loaded b.nes (32 bytes, no iNES header)")]
        );
    }

    #[test]
    fn test_pending_load_survives_dropped_driver() {
        let (controller, sandbox, _log) = setup(BridgeConfig::default(), ReadyHooks::new());
        block_on(controller.on_runtime_ready());

        sandbox.deferred.set(true);
        let mut first = Box::pin(controller.submit_cartridge(rom("a.nes", 0xA, 16)));
        assert_eq!((&mut first).now_or_never(), None);
        assert_eq!(
            block_on(controller.submit_cartridge(rom("b.nes", 0xB, 32))),
            Submission::Queued
        );
        drop(first);
        assert!(!controller.is_loading());
        assert!(controller.has_pending());

        sandbox.deferred.set(false);
        assert_eq!(block_on(controller.resume()), Some(Submission::Loaded));
        assert_eq!(sandbox.loaded.borrow().last(), Some(&vec![0xB; 32]));
        assert!(!controller.has_pending());
        assert_eq!(block_on(controller.resume()), None);
    }

    #[test]
    fn test_newer_submission_replaces_stale_pending() {
        let (controller, sandbox, _log) = setup(BridgeConfig::default(), ReadyHooks::new());
        block_on(controller.on_runtime_ready());

        sandbox.deferred.set(true);
        let mut first = Box::pin(controller.submit_cartridge(rom("a.nes", 0xA, 16)));
        assert_eq!((&mut first).now_or_never(), None);
        block_on(controller.submit_cartridge(rom("b.nes", 0xB, 32)));
        drop(first);

        sandbox.deferred.set(false);
        let outcome = block_on(controller.submit_cartridge(rom("c.nes", 0xC, 64)));
        assert_eq!(outcome, Submission::Loaded);
        assert_eq!(sandbox.loaded.borrow().last(), Some(&vec![0xC; 64]));
        assert!(!controller.has_pending());
        assert_eq!(controller.active_cartridge().as_deref(), Some("c.nes"));
    }

    #[test]
    fn test_unlaid_display_is_left_alone() {
        let sandbox = Rc::new(FakeSandbox::default());
        let hooks = ReadyHooks::new().display(FakeDisplay {
            sandbox: Rc::clone(&sandbox),
            size: Some((0, 0)),
        });
        let controller = BootstrapController::new(
            Rc::clone(&sandbox),
            Rc::new(MemoryLog::new()),
            BridgeConfig::default(),
            hooks,
        )
        .unwrap();
        block_on(controller.on_runtime_ready());
        assert_eq!(sandbox.calls(), vec!["run"]);
    }

    #[test]
    fn test_start_on_ready_disabled() {
        let config = BridgeConfig {
            start_on_ready: false,
            ..BridgeConfig::default()
        };
        let (controller, sandbox, _log) = setup(config, ReadyHooks::new());
        let signal = block_on(controller.on_runtime_ready());
        assert!(matches!(signal, ReadySignal::Accepted { session: None, .. }));
        assert!(sandbox.calls().is_empty());
    }

    #[test]
    fn test_load_failure_is_logged_once() {
        let (controller, sandbox, log) = setup(BridgeConfig::default(), ReadyHooks::new());
        *sandbox.fail_load.borrow_mut() = Some("unsupported mapper".into());
        block_on(controller.on_runtime_ready());

        let outcome = block_on(controller.submit_cartridge(rom("bad.nes", 0, 4)));
        assert_eq!(outcome, Submission::Failed);
        assert_eq!(
            log.lines(),
            vec![LogLine::error("Sandbox call loadRom() failed: unsupported mapper")]
        );
        assert_eq!(controller.active_cartridge(), None);
        assert!(!controller.is_loading());
    }

    #[test]
    fn test_log_after_success_and_failure() {
        let (controller, sandbox, log) = setup(BridgeConfig::default(), ReadyHooks::new());
        block_on(controller.on_runtime_ready());
        block_on(controller.submit_cartridge(rom("game.nes", 0, 40 * 1024)));
        *sandbox.fail_load.borrow_mut() = Some("unsupported mapper".into());
        block_on(controller.submit_cartridge(rom("bad.nes", 0, 4)));

        insta::assert_debug_snapshot!(log.lines(), @r###"
        [
            LogLine {
                severity: Info,
                text: "Loaded game.nes (40960 bytes, no iNES header)",
            },
            LogLine {
                severity: Error,
                text: "Sandbox call loadRom() failed: unsupported mapper",
            },
        ]
        "###);
    }

    #[test]
    fn test_in_flight_load_is_superseded() {
        let (controller, sandbox, log) = setup(BridgeConfig::default(), ReadyHooks::new());
        sandbox.deferred.set(true);
        block_on(controller.on_runtime_ready());

        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        for (name, fill) in [("a.nes", 0xA), ("b.nes", 0xB), ("c.nes", 0xC)] {
            let controller = controller.clone();
            let outcomes = Rc::clone(&outcomes);
            spawner
                .spawn_local(async move {
                    let outcome = controller.submit_cartridge(rom(name, fill, 64)).await;
                    outcomes.borrow_mut().push((name, outcome));
                })
                .unwrap();
        }
        pool.run_until_stalled();

        // a.nes is in flight, c.nes replaced b.nes in the pending slot.
        assert!(controller.is_loading());
        assert_eq!(
            *outcomes.borrow(),
            vec![("b.nes", Submission::Queued), ("c.nes", Submission::Queued)]
        );
        assert_eq!(sandbox.loaded.borrow().len(), 1);

        sandbox.complete_next(Ok(()));
        pool.run_until_stalled();
        assert_eq!(sandbox.loaded.borrow().len(), 2);
        assert_eq!(sandbox.loaded.borrow()[1], vec![0xC; 64]);

        sandbox.complete_next(Ok(()));
        pool.run_until_stalled();
        assert_eq!(
            outcomes.borrow().last(),
            Some(&("a.nes", Submission::Superseded))
        );
        assert!(!controller.is_loading());
        assert_eq!(controller.active_cartridge().as_deref(), Some("c.nes"));
        assert_eq!(
            log.lines(),
            vec![LogLine::info("Loaded c.nes (64 bytes, no iNES header)")]
        );
    }

    #[test]
    fn test_ready_deadline() {
        let (controller, _sandbox, log) = setup(BridgeConfig::default(), ReadyHooks::new());
        assert!(controller.on_ready_deadline());
        assert!(!controller.on_ready_deadline());
        assert_eq!(
            log.lines(),
            vec![LogLine::error(
                "Sandbox runtime did not signal readiness within 15000 ms"
            )]
        );

        // A late readiness signal is still honoured.
        block_on(controller.on_runtime_ready());
        assert!(controller.is_ready());
    }

    #[test]
    fn test_ready_deadline_after_ready_or_disabled() {
        let (controller, _sandbox, log) = setup(BridgeConfig::default(), ReadyHooks::new());
        block_on(controller.on_runtime_ready());
        assert!(!controller.on_ready_deadline());

        let config = BridgeConfig {
            ready_timeout_ms: None,
            ..BridgeConfig::default()
        };
        let (controller, _sandbox, _) = setup(config, ReadyHooks::new());
        assert!(!controller.on_ready_deadline());
        assert!(log.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BridgeConfig {
            cartridge_path: String::new(),
            ..BridgeConfig::default()
        };
        let result = BootstrapController::new(
            Rc::new(FakeSandbox::default()),
            Rc::new(MemoryLog::new()),
            config,
            ReadyHooks::new(),
        );
        assert!(matches!(result, Err(BridgeError::Config { .. })));
    }
}
