//! # roomctld - room controller daemon
//!
//! Composition root that wires the virtual hardware to the orchestration
//! engine and feeds it from a line console.
//!
//! ## Responsibilities
//! - Load configuration (`roomctl.toml`, env vars)
//! - Initialise the tracing subscriber
//! - Construct the virtual relay board, panel bus and the event bus
//! - Build the [`Orchestrator`] for the demo room
//! - Translate console lines into channel / panel reports and scene commands
//! - Log every engine event as JSON
//! - Stop on end of input or Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;
mod console;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use roomctl_adapter_virtual::{VirtualPanelBus, VirtualRelayBoard, demo_layout};
use roomctl_app::engine::Orchestrator;
use roomctl_app::event_bus::InProcessEventBus;
use roomctl_app::ports::{Ports, SystemClock};
use roomctl_domain::event::Event;

use crate::config::Config;
use crate::console::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading roomctl.toml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    // Event bus
    let event_bus = InProcessEventBus::new(config.events.capacity);
    let events = event_bus.subscribe();
    tokio::spawn(log_events(events));

    // Hardware
    let relays = Arc::new(VirtualRelayBoard::default());
    let ports = Ports {
        relays: relays.clone(),
        panels: Arc::new(VirtualPanelBus::default()),
        clock: Arc::new(SystemClock),
        events: Arc::new(event_bus),
    };

    // Engine
    let layout = demo_layout().context("building demo layout")?;
    let engine = Orchestrator::new(layout, ports, config.engine_settings())
        .context("starting orchestrator")?;
    tracing::info!(settings = ?engine.settings(), "roomctld ready, reading commands from stdin");

    tokio::select! {
        result = read_console(&engine) => result?,
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            tracing::info!("interrupted");
        }
    }

    engine.flush_indicators();
    tracing::info!(relays = ?relays.channels(), "roomctld stopped");
    Ok(())
}

async fn read_console(engine: &Orchestrator) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => handle(engine, command),
            Err(err) => tracing::warn!(%line, error = %err, "invalid console command"),
        }
    }
    tracing::info!("end of input");
    Ok(())
}

fn handle(engine: &Orchestrator, command: Command) {
    match command {
        Command::Panel {
            panel,
            pressed_mask,
            backlight,
        } => engine.on_panel_report(panel, pressed_mask, backlight),
        Command::Level { channel, bit } => engine.on_channel_level(channel, bit),
        Command::Infrared { channel, bit } => engine.on_channel_infrared(channel, bit),
        Command::Run(scene) => {
            if engine.run_scene(scene).is_none() {
                tracing::info!(%scene, "scene not started");
            }
        }
        Command::Cancel(scene) => engine.cancel_scene(scene),
        Command::Pause(scene, duration) => {
            let engine = engine.clone();
            tokio::spawn(async move {
                if !engine.pause_scene(scene, duration).await {
                    tracing::info!(%scene, "pause cut short by cancellation");
                }
            });
        }
        Command::Status => println!("{:#?}", engine.status()),
    }
}

async fn log_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(target: "roomctld::events", "{json}"),
                Err(err) => tracing::warn!(error = %err, "unserialisable event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
