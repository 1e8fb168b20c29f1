use clap::Parser as ClapParser;
use colored::Colorize;
use futures::executor::block_on;
use nesbridge_core::{
    BootstrapController, BridgeConfig, FileIntake, LogSink, MemoryLog, ReadyHooks, ReadySignal,
    Severity,
};
use nesbridge_runtime_native::{FsFile, MemorySandbox};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "nesbridge")]
#[command(version)]
#[command(about = "Replay the browser bootstrap and cartridge hand-off against an in-process sandbox", long_about = None)]
struct Cli {
    /// Cartridge images to pick, in order (.nes)
    roms: Vec<PathBuf>,

    /// Pick the cartridges before the runtime signals readiness
    #[arg(long)]
    before_ready: bool,

    /// Never signal readiness; the readiness deadline fires instead
    #[arg(long, conflicts_with = "before_ready")]
    never_ready: bool,

    /// Make the sandbox reject every loadRom call with this message
    #[arg(long, value_name = "MESSAGE")]
    fail_load: Option<String>,

    /// Do not issue `run` when the runtime becomes ready
    #[arg(long)]
    no_run: bool,

    /// Bridge configuration (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print every call that crossed into the sandbox
    #[arg(long)]
    dump_calls: bool,
}

/// Terminal log sink: info lines on stdout, error lines on stderr.
struct TermLog {
    lines: MemoryLog,
}

impl TermLog {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            lines: MemoryLog::with_capacity(capacity),
        }
    }

    fn error_count(&self) -> usize {
        self.lines.errors().len()
    }
}

impl LogSink for TermLog {
    fn write(&self, severity: Severity, text: &str) {
        match severity {
            Severity::Info => println!("{}: {}", "info".cyan(), text),
            Severity::Error => eprintln!("{}: {}", "error".red().bold(), text),
        }
        self.lines.write(severity, text);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BridgeConfig, String> {
    let Some(path) = path else {
        return Ok(BridgeConfig::default());
    };
    let source = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&source).map_err(|e| format!("{}: {}", path.display(), e))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", "error".red().bold(), message);
    process::exit(1);
}

async fn signal_ready(controller: &BootstrapController<Rc<MemorySandbox>>) {
    // The emulator loop is left running until the replay ends.
    if let ReadySignal::Accepted { session, .. } = controller.on_runtime_ready().await {
        drop(session);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref()).unwrap_or_else(|e| fail(e));
    if cli.no_run {
        config.start_on_ready = false;
    }

    // The sink exists before the sandbox so runtime output from startup is never lost.
    let log = Rc::new(TermLog::new(config.log_capacity));
    let sandbox = Rc::new(MemorySandbox::with_output(log.clone()));
    if let Some(message) = &cli.fail_load {
        sandbox.fail_loads(message.clone());
    }

    let controller =
        BootstrapController::new(Rc::clone(&sandbox), log.clone(), config, ReadyHooks::new())
            .unwrap_or_else(|e| fail(e));
    let intake = FileIntake::new(controller.clone());

    block_on(async {
        if !cli.before_ready && !cli.never_ready {
            signal_ready(&controller).await;
        }
        for rom in &cli.roms {
            let outcome = intake.load_selected(Some(FsFile::new(rom))).await;
            tracing::debug!(rom = %rom.display(), ?outcome, "picked");
        }
        if cli.never_ready {
            controller.on_ready_deadline();
        } else if cli.before_ready {
            signal_ready(&controller).await;
        }
    });
    sandbox.stop();

    if cli.dump_calls {
        for call in sandbox.calls() {
            println!("{call:?}");
        }
    }

    if let Some(name) = controller.active_cartridge() {
        println!(
            "{}: {} active as {} ({} loadRom call(s))",
            "ok".green().bold(),
            name,
            controller.config().cartridge_path,
            sandbox.load_count()
        );
    }

    if log.error_count() > 0 {
        process::exit(1);
    }
}
