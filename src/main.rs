//! LUMI GW
//!
//! Lights up a ROLI LUMI Keys block: ripples around played keys, playback
//! notifications over HTTP, and one-shot sysex commands from the command line.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumi_gw::api::{self, ApiState};
use lumi_gw::config::AppConfig;
use lumi_gw::keyboard::{discovery, LumiKeyboard};
use lumi_gw::router::EventRouter;
use lumi_gw::sysex::{ColorSlot, LumiCommand, Rgb};
use lumi_gw::transport::MidiSink;

/// Capacity of the HTTP trigger queue
const TRIGGER_QUEUE: usize = 256;

/// LUMI Gateway - ripple lighting and sysex control for LUMI Keys
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Send a sysex command given as hex bytes, e.g. "10 40 44 0C 00 00 00 00"
    #[arg(long, value_name = "HEX")]
    send: Option<String>,

    /// Send the --send bytes unmodified, without header and checksum
    #[arg(long, requires = "send")]
    raw: bool,

    /// Set global brightness (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    brightness: Option<u8>,

    /// Set the primary key colour, as RRGGBB
    #[arg(long, value_name = "RRGGBB")]
    color: Option<Rgb>,

    /// Set the root key colour, as RRGGBB
    #[arg(long, value_name = "RRGGBB")]
    root_color: Option<Rgb>,

    /// Do not start the HTTP trigger endpoint
    #[arg(long)]
    no_api: bool,
}

impl Args {
    fn has_one_shot(&self) -> bool {
        self.send.is_some() || self.brightness.is_some() || self.color.is_some() || self.root_color.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting LUMI GW...");
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load_or_default(&args.config).await?;

    if args.list_ports {
        discovery::print_ports(&config.midi.device);
        return Ok(());
    }

    let mut keyboard = LumiKeyboard::new(&config);
    keyboard.connect()?;

    if args.has_one_shot() {
        let result = run_one_shot(&keyboard, &args).await;
        keyboard.disconnect();
        return result;
    }

    run_app(keyboard, config, args.no_api).await?;

    info!("LUMI GW shutdown complete");
    Ok(())
}

/// Send the commands given on the command line, then exit
async fn run_one_shot(keyboard: &LumiKeyboard, args: &Args) -> Result<()> {
    if let Some(text) = &args.send {
        keyboard
            .send_hex(text, args.raw)
            .await
            .context("Failed to send command")?;
    }
    if let Some(level) = args.brightness {
        keyboard.send_command(LumiCommand::Brightness(level)).await?;
    }
    if let Some(color) = args.color {
        keyboard
            .send_command(LumiCommand::KeyColor { slot: ColorSlot::Primary, color })
            .await?;
    }
    if let Some(color) = args.root_color {
        keyboard
            .send_command(LumiCommand::KeyColor { slot: ColorSlot::Root, color })
            .await?;
    }
    Ok(())
}

async fn run_app(mut keyboard: LumiKeyboard, config: AppConfig, no_api: bool) -> Result<()> {
    let events = keyboard
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("Failed to get keyboard event receiver"))?;

    let sink: Arc<dyn MidiSink> = Arc::new(keyboard.output());
    let router = EventRouter::new(&config, sink);
    info!("Router initialized");

    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE);
    let (stop_tx, stop_rx) = watch::channel(false);

    let api_task = if config.api.enabled && !no_api {
        let state = Arc::new(ApiState { triggers: trigger_tx });
        let host = config.api.host.clone();
        let port = config.api.port;
        let mut stop_rx = stop_rx.clone();

        Some(tokio::spawn(async move {
            let stopped = async move {
                let _ = stop_rx.changed().await;
            };
            if let Err(e) = api::start_server(state, &host, port, stopped).await {
                warn!("Trigger API stopped: {:#}", e);
            }
        }))
    } else {
        info!("Trigger API disabled");
        drop(trigger_tx);
        None
    };

    info!("Ready to process MIDI events!");
    router.run(events, trigger_rx, shutdown_signal()).await;

    info!("Shutting down...");
    let _ = stop_tx.send(true);
    if let Some(task) = api_task {
        let _ = task.await;
    }
    keyboard.disconnect();

    Ok(())
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
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
