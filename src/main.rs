// src/main.rs - CMM probe host entry point
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use cmm_host::config::{self, Config};
use cmm_host::console::{Console, RawModeWriter};
use cmm_host::file_manager;
use cmm_host::gcode::{GcodeLink, LinkTiming};
use cmm_host::hardware::serial::SerialConfig;
use cmm_host::hardware::{SerialTransport, SimulatedMachine, Transport};
use cmm_host::input::{KeySource, Mode, ScriptedKeys, TerminalKeys};
use cmm_host::session::{self, MachineSession};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Rectangle scan over a grid
    Scan,
    /// Free manual control
    Free,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Scan => Mode::Scan,
            ModeArg::Free => Mode::Free,
        }
    }
}

/// Drive a G-code machine as a coordinate measuring probe.
#[derive(Parser, Debug)]
#[command(name = "cmm-host", version, about)]
struct Cli {
    /// Path to a TOML (or legacy settings .json) config file
    #[arg(short, long, default_value = "cmm.toml")]
    config: PathBuf,

    /// Serial port, overriding the config file
    #[arg(short, long)]
    port: Option<String>,

    /// Skip the mode prompt
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Talk to a simulated machine instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// Replay key presses from a file instead of the terminal
    #[arg(long)]
    script: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn load(cli: &Cli) -> Result<Config, BoxError> {
    let mut config = if cli.config.exists() {
        tracing::info!("Loading configuration from: {}", cli.config.display());
        config::load_config(&cli.config)?
    } else {
        tracing::warn!(
            "Config file '{}' not found, using defaults",
            cli.config.display()
        );
        Config::default()
    };
    if let Some(port) = &cli.port {
        config.link.port = port.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    // Key presses from the terminal put it in raw mode, where a bare `\n`
    // does not return the cursor.
    let writer = if cli.script.is_none() {
        BoxMakeWriter::new(|| RawModeWriter::new(std::io::stderr()))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .init();

    tracing::info!("Starting CMM host {}", env!("CARGO_PKG_VERSION"));

    let config = load(&cli).map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let (transport, timing): (Box<dyn Transport>, LinkTiming) = if cli.simulate {
        let (machine, _handle) = SimulatedMachine::new();
        (Box::new(machine), LinkTiming::immediate())
    } else {
        tracing::info!("Link: {} @ {} baud", config.link.port, config.link.baud);
        (
            Box::new(SerialTransport::new(SerialConfig::from(&config.link))),
            LinkTiming::from(&config.link),
        )
    };
    tracing::info!(
        "Scan layout: {} x {} points over {} x {} mm, output {}",
        config.scan.points_x,
        config.scan.points_y,
        config.scan.dist_x,
        config.scan.dist_y,
        config.output.path.display()
    );

    let mut keys: Box<dyn KeySource> = match &cli.script {
        Some(path) => Box::new(ScriptedKeys::new(file_manager::read_key_script(path).await?)),
        None => Box::new(TerminalKeys::new()?),
    };

    let mut machine = MachineSession::new(GcodeLink::new(transport, timing), &config);
    let outcome = session::run_session(
        &mut machine,
        cli.mode.map(Mode::from),
        keys.as_mut(),
        &Console::stdout(),
    )
    .await?;

    tracing::info!("Done: {:?}", outcome);
    Ok(())
}
