// src/main.rs - Send a PES design to the embroidery rig
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

use pes_stitcher::communication::{SimulatedController, Transport, open_serial};
use pes_stitcher::config::{self, Config};
use pes_stitcher::{Color, ColorCheckpoint, Session, SessionError, StitcherError, parse_pes, plan_speeds};

/// Sends the stitches of a PES file to the embroidery machine.
#[derive(Parser, Debug)]
#[command(name = "stitcher", about = "Sends data from a PES file to the embroidery machine.")]
struct Cli {
    /// Path to the PES file
    #[arg(short, long)]
    file: PathBuf,

    /// Serial port of the controller (overrides the config file)
    #[arg(short, long)]
    serial: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Path to a TOML rig configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run against a simulated controller instead of the serial port
    #[arg(long)]
    dry_run: bool,

    /// Continue at color changes without waiting for the operator
    #[arg(long)]
    no_prompt: bool,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Prompts on the terminal at every color change and waits for return.
struct TerminalCheckpoint {
    stdin: BufReader<Stdin>,
    prompt: bool,
}

#[async_trait]
impl ColorCheckpoint for TerminalCheckpoint {
    async fn color_change(&mut self, block: usize, color: &'static Color) -> Result<(), SessionError> {
        println!("\nNext color: {} {}", color.ansi_swatch(), color.name);
        if !self.prompt {
            return Ok(());
        }
        println!("hit return when ready");
        let mut line = String::new();
        match self.stdin.read_line(&mut line).await {
            Ok(0) => Err(SessionError::Aborted { block }),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!("Failed to read from stdin: {}", e);
                Err(SessionError::Aborted { block })
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), StitcherError> {
    let mut config = match cli.config {
        Some(ref path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            config::load_config(&path.to_string_lossy())?
        }
        None => Config::default(),
    };
    if let Some(port) = cli.serial {
        config.serial.port = port;
    }
    if let Some(baud) = cli.baud {
        config.serial.baud = baud;
    }

    tracing::info!("Reading {}", cli.file.display());
    let data = tokio::fs::read(&cli.file).await?;
    let mut pattern = parse_pes(&data)?;
    drop(data);

    plan_speeds(&mut pattern, &config.speed);
    if let Some(bounds) = pattern.bounds {
        tracing::info!(
            "Pattern: {} blocks, {} stitches, {} x {} units",
            pattern.blocks.len(),
            pattern.stitch_count(),
            bounds.width(),
            bounds.height()
        );
    }

    let mut transport: Box<dyn Transport> = if cli.dry_run {
        tracing::info!("Dry run against the simulated controller");
        Box::new(SimulatedController::new(config.session.magic))
    } else {
        if config.serial.port.is_empty() {
            let ports = pes_stitcher::communication::serial::available_ports();
            tracing::error!("No serial port given; available: {:?}", ports);
            return Err(StitcherError::Config(config::ConfigError::Invalid(
                "serial.port is required unless --dry-run is used".to_string(),
            )));
        }
        Box::new(open_serial(&config.serial)?)
    };

    let mut checkpoint = TerminalCheckpoint {
        stdin: BufReader::new(tokio::io::stdin()),
        prompt: !cli.no_prompt,
    };

    let mut session = Session::for_pattern(transport.as_mut(), &mut checkpoint, &config, &pattern);
    let report = session.run(&pattern).await?;
    println!(
        "Sewed {} blocks, {} stitches with {} commands",
        report.blocks, report.stitches, report.commands_sent
    );
    Ok(())
}
