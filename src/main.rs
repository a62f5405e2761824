//! Mouse2Pad - mouse and keyboard to virtual gamepad
//!
//! Horizontal pointer motion steers the left stick, vertical motion drives
//! the triggers, mapped keys press controller buttons.

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mouse2pad::config::{AppConfig, ConfigIssue};
use mouse2pad::engine::{IntervalTicker, UpdateLoop};
use mouse2pad::input::repl::ReplSource;
use mouse2pad::input::{self, InputDispatcher, KeyHandler};
use mouse2pad::pad::{self, PadOutput};
use mouse2pad::paths;
use mouse2pad::state::InputState;

/// Mouse2Pad - drive a virtual gamepad from mouse movement and keyboard keys
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Load the configuration, print the resolved settings and exit
    #[arg(long)]
    check: bool,

    /// Write the normalized configuration back to disk (with backup) and exit
    #[arg(long)]
    write_config: bool,

    /// Output backend, overrides the configured one (console, null)
    #[arg(short, long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    let config_path = args.config.clone().unwrap_or_else(paths::default_config_path);
    info!("Starting Mouse2Pad v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());

    let (mut config, issues) = AppConfig::load(&config_path).await?;
    if let Some(output) = args.output {
        config.output = output;
    }

    if args.check {
        print_config(&config, &issues);
        return Ok(());
    }

    if args.write_config {
        let backup = config.save(&config_path).await?;
        println!("{} {}", "✅ Configuration written to".green(), config_path.display());
        if let Some(backup) = backup {
            println!("   Previous version kept at {}", backup.display());
        }
        return Ok(());
    }

    let sink = match pad::connect(&config.output) {
        Ok(sink) => {
            println!("{} ({})", "✅ Virtual controller created".green().bold(), sink.name());
            sink
        }
        Err(e) => {
            println!("{} {}", "❌ Failed to create virtual controller:".red().bold(), e);
            println!("   Check that the virtual gamepad driver is installed and the output backend is valid.");
            // Already reported; nothing has been started yet
            std::process::exit(1);
        }
    };

    let config = Arc::new(config);
    print_banner(&config);

    run_app(config, sink).await?;

    info!("Mouse2Pad shutdown complete");
    Ok(())
}

async fn run_app(config: Arc<AppConfig>, sink: Box<dyn pad::ControllerSink>) -> Result<()> {
    let state = Arc::new(InputState::new());
    let pad = Arc::new(PadOutput::new(sink));

    let keys = KeyHandler::new(config.clone(), state.clone(), pad.clone());
    let (tx, rx) = input::channel();
    let mut dispatcher = InputDispatcher::new(state.clone(), keys).spawn(rx);

    // The source owns the only sender: closing it stops the dispatcher
    let _source = ReplSource::spawn(tx)?;

    let update = UpdateLoop::new(state, pad.clone(), config.sensitivity());
    let ticker = IntervalTicker::new(config.update_rate_hz);
    info!(
        "Update loop running at {} Hz ({:?} per tick)",
        config.update_rate_hz,
        ticker.period()
    );

    let shutdown = async {
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = &mut dispatcher => {
                info!("Input source closed");
            }
        }
    };

    update.run(ticker, shutdown).await;

    // Covers the case where the loop never got to release
    pad.release();
    dispatcher.abort();
    Ok(())
}

fn print_banner(config: &AppConfig) {
    let enabled = |key: &Option<mouse2pad::keys::KeyId>| match key {
        Some(key) => format!("{} ({})", "enabled".green(), key),
        None => "disabled".dimmed().to_string(),
    };

    println!("\n{}", "=== Mouse2Pad ===".bold().cyan());
    println!("  Reset key:           {}", config.reset_key.to_string().yellow());
    println!("  Full left trigger:   {}", enabled(&config.full_left_trigger_key));
    println!("  Full right trigger:  {}", enabled(&config.full_right_trigger_key));
    println!("  Mapped keys:         {}", config.mappings.len().to_string().green());
    println!(
        "  Sensitivity:         x={} trigger={}",
        config.sensitivity_x, config.sensitivity_trigger
    );
    println!();
}

fn print_config(config: &AppConfig, issues: &[ConfigIssue]) {
    print_banner(config);

    println!("  Update rate:         {} Hz", config.update_rate_hz);
    println!("  Output backend:      {}", config.output);

    println!("\n{}", "Mappings:".bold());
    if config.mappings.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for entry in config.mappings.entries() {
        println!("  {:<12} → {}", entry.key.to_string().cyan(), entry.button);
    }

    if issues.is_empty() {
        println!("\n{}", "✅ No configuration issues".green());
    } else {
        println!("\n{}", format!("⚠️  {} configuration issue(s):", issues.len()).yellow().bold());
        for issue in issues {
            println!("  - {}", issue);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await
    }
    info!("Shutdown signal received");
}
