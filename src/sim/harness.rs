//! CLI entry point for the dry-run harness: decode, plan and stream a PES file
//! into the simulated controller, then print what the rig would have done.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pes_stitcher::communication::SimulatedController;
use pes_stitcher::config::{Config, load_config};
use pes_stitcher::{AutoConfirm, Pattern, Session, StitcherError, parse_pes, plan_speeds};

/// Simulation Harness CLI
#[derive(Parser, Debug)]
#[command(name = "stitch-sim", about = "Dry-run harness for PES files against a simulated controller.")]
pub struct Cli {
    /// Path to the PES file
    file: PathBuf,

    /// Path to a TOML config file (overrides defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Answer every n-th record with a busy marker first
    #[arg(long)]
    busy_every: Option<usize>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the per-block summary only
    Summary,
    /// Stream the pattern through the simulated controller (default)
    Run,
}

fn print_summary(pattern: &Pattern) {
    println!("{:>5}  {:<24} {:>8} {:>6} {:>6} {:>6}", "block", "color", "stitches", "jumps", "min", "max");
    for (index, block) in pattern.blocks.iter().enumerate() {
        let min = block.stitches.iter().map(|s| s.speed).min().unwrap_or(0);
        let max = block.stitches.iter().map(|s| s.speed).max().unwrap_or(0);
        println!(
            "{:>5}  {} {:<20} {:>8} {:>6} {:>6} {:>6}",
            index,
            block.color().ansi_swatch(),
            block.color().name,
            block.len(),
            block.jump_count(),
            min,
            max
        );
    }
    if let Some(bounds) = pattern.bounds {
        println!(
            "bounds x {}..{} y {}..{}, offset {:?}",
            bounds.min_x,
            bounds.max_x,
            bounds.min_y,
            bounds.max_y,
            pattern.machine_offset()
        );
    }
}

async fn run(cli: Cli) -> Result<(), StitcherError> {
    // 1. Load config (default or from file)
    let config = match cli.config {
        Some(ref path) => load_config(&path.to_string_lossy())?,
        None => Config::default(),
    };

    // 2. Decode and plan
    let data = tokio::fs::read(&cli.file).await?;
    let mut pattern = parse_pes(&data)?;
    plan_speeds(&mut pattern, &config.speed);
    print_summary(&pattern);

    if matches!(cli.command, Some(Commands::Summary)) {
        return Ok(());
    }

    // 3. Stream into the simulated controller
    let mut session_config = config.clone();
    session_config.session.enable_settle_ms = 0;
    let mut controller = SimulatedController::new(config.session.magic);
    if let Some(every) = cli.busy_every.filter(|&n| n > 0) {
        let records = 2 * pattern.stitch_count() + 2;
        controller = controller.with_busy_records((0..records).filter(|i| i % every == every - 1));
    }
    let mut confirm = AutoConfirm;
    let report = Session::for_pattern(&mut controller, &mut confirm, &session_config, &pattern)
        .run(&pattern)
        .await?;

    let seconds = controller.elapsed_us() as f64 / 1_000_000.0;
    println!("{:#?}", report);
    println!(
        "controller: {} records accepted, {} rejected, {} motor ticks, {:.1} s of sewing",
        controller.received().len(),
        controller.errors(),
        controller.motor_ticks(),
        seconds
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = run(cli).await {
        eprintln!("stitch-sim failed: {e}");
        std::process::exit(1);
    }
}
