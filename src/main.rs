//! Entry point: connects to a room on a websocket relay and runs the
//! planning cycle until interrupted.

use anyhow::{bail, Context, Result};
use clap::Parser;
use navsim_planner::config::ConfigLoader;
use navsim_planner::cycle::CycleController;
use navsim_planner::plugin::builtin::register_builtin_plugins;
use navsim_planner::plugin::{PerceptionPluginManager, PlannerPluginManager};
use navsim_planner::transport::WebSocketTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Deadline-bounded planning/perception core for an autonomous
/// ground-vehicle simulation client.
#[derive(Parser, Debug)]
#[command(
    name = "navsim_planner",
    version = "0.1.0",
    about = "Deadline-bounded planning/perception core for an autonomous ground-vehicle simulation client"
)]
struct Cli {
    /// Websocket URL of the simulation relay, e.g. ws://localhost:8765
    ws_url: String,
    /// Room id this planner instance serves.
    room_id: String,
}

fn init_logging(verbose: bool) {
    if verbose && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug");
    }
    pretty_env_logger::init();
}

/// Wall-clock time in fractional Unix seconds, matching the `stamp` units
/// world ticks carry on the wire. `chrono` is used here rather than raw
/// `SystemTime` arithmetic so the conversion is a single checked call
/// instead of a manual epoch subtraction repeated at every call site.
fn wall_clock_now_s() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Exit code 1 on argument or initialization error, 0 on clean shutdown
/// (spec section 6): returning `Err` from `main` prints it and exits 1,
/// falling off the end of this function exits 0.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = std::env::var("VERBOSE").map(|v| v == "1").unwrap_or(false);
    init_logging(verbose);

    let mut config = ConfigLoader::load().context("failed to load configuration")?;
    if let Ok(v) = std::env::var("USE_PLUGIN_SYSTEM") {
        config.use_plugin_system = v == "1";
    }
    if verbose {
        config.verbose = true;
    }

    let (perception_registry, planner_registry) = register_builtin_plugins();

    let mut perception = PerceptionPluginManager::new();
    let perception_entries = if config.use_plugin_system {
        config.perception_plugins.clone()
    } else {
        Vec::new()
    };
    perception
        .load(&perception_registry, &perception_entries)
        .context("failed to load perception plugins")?;

    let mut planner = PlannerPluginManager::new(config.planner.clone());
    planner.load(&planner_registry).context("failed to load planner plugins")?;

    log::info!(
        "connecting to {} room={} use_plugin_system={}",
        cli.ws_url, cli.room_id, config.use_plugin_system
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let (transport, outbound_rx) = WebSocketTransport::new(cli.ws_url, cli.room_id);
    let transport = Arc::new(transport);
    let shutdown = Arc::new(AtomicBool::new(false));

    let transport_task = {
        let transport = transport.clone();
        let shutdown = shutdown.clone();
        runtime.spawn(async move { transport.run(outbound_rx, shutdown).await })
    };

    let planning_thread = {
        let transport = transport.clone();
        std::thread::spawn(move || {
            let buffer = transport.buffer.clone();
            let mut controller = CycleController::new(config, perception, planner, transport);
            while let Some(snapshot) = buffer.take_blocking() {
                let now_s = wall_clock_now_s();
                if let Err(e) = controller.process_tick(snapshot, now_s) {
                    log::error!("planning cycle failed unexpectedly: {e}");
                }
            }
            log::info!("planning loop exiting after shutdown signal");
        })
    };

    runtime.block_on(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("received interrupt, shutting down");
        }
        shutdown.store(true, Ordering::Relaxed);
        transport.buffer.signal_shutdown();
        let _ = transport_task.await;
    });

    if planning_thread.join().is_err() {
        bail!("planning thread panicked");
    }
    Ok(())
}
