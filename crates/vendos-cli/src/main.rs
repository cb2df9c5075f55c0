//! `vendos-cli` – VendOS Command Line Interface
//!
//! The `vendos` binary is the entry point for both halves of the stack:
//!
//! - `vendos serve` – run the vend-command queue API server over a SQLite
//!   store, with the periodic staleness sweep.
//! - `vendos agent` – run a simulated dispensing controller (simulated
//!   cabinet + cam follower) polling a queue.
//!
//! Configuration comes from `~/.vendos/config.toml` (all fields optional),
//! `VENDOS_*` environment overrides, and per-run flags, in increasing
//! precedence.  **Ctrl-C** raises a shutdown flag that stops whichever
//! loop is running.

mod config;
mod simulate;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;

use vendos_agent::{ControllerConfig, ControllerLoop};
use vendos_hal::SimCabinet;
use vendos_queue::{CommandStore, MemoryInventory};

#[derive(Parser)]
#[command(name = "vendos", version, about = "Vending-machine control stack")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the vend-command queue API server.
    Serve {
        /// Listen port (overrides config).
        #[arg(long)]
        port: Option<u16>,
        /// SQLite database path (overrides config).
        #[arg(long)]
        db: Option<String>,
    },
    /// Run a simulated dispensing controller against a queue.
    Agent {
        /// Unit identity towards the queue (overrides config).
        #[arg(long)]
        unit_id: Option<String>,
        /// Queue base URL (overrides config).
        #[arg(long)]
        server_url: Option<String>,
        /// Number of simulated slots (overrides config).
        #[arg(long)]
        slots: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    print_banner();

    let cli = Cli::parse();
    let cfg = config::resolve();

    // ── Shared shutdown flag, raised by Ctrl-C ────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; graceful shutdown unavailable");
    }

    match cli.command {
        Command::Serve { port, db } => run_serve(cfg, port, db, shutdown).await,
        Command::Agent {
            unit_id,
            server_url,
            slots,
        } => run_agent(cfg, unit_id, server_url, slots, shutdown).await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serve
// ─────────────────────────────────────────────────────────────────────────────

async fn run_serve(
    cfg: config::Config,
    port: Option<u16>,
    db: Option<String>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.server_port);
    let db_path = db.unwrap_or_else(|| cfg.db_path.clone());
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Demo inventory: the configured unit's slots, each seeded with stock.
    // A real deployment would plug the catalog service in here instead.
    let inventory = Arc::new(MemoryInventory::new());
    for motor_id in 1..=cfg.slots {
        inventory.set_stock(&cfg.unit_id, motor_id, cfg.seed_stock);
    }

    let store = Arc::new(
        CommandStore::open(&db_path, inventory.clone())?
            .with_payment_timeout(Duration::from_secs(cfg.payment_timeout_secs)),
    );

    println!("  Queue API on port {}", port.to_string().bold());
    println!("  Command store at {}", db_path.bold());
    println!(
        "  Unit {} seeded with {} slots × {} items\n",
        cfg.unit_id.bold(),
        cfg.slots,
        cfg.seed_stock
    );

    let server = tokio::spawn(vendos_server::serve(port, store, inventory));
    wait_for_shutdown(&shutdown, &server).await;
    if server.is_finished() {
        // The server exited on its own (e.g. the port was taken): surface it.
        server.await??;
    } else {
        server.abort();
    }
    println!("{}", "  ✓ Queue server stopped.".green());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

async fn run_agent(
    cfg: config::Config,
    unit_id: Option<String>,
    server_url: Option<String>,
    slots: Option<u32>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let slots = slots.unwrap_or(cfg.slots);
    let controller_config = ControllerConfig {
        base_url: server_url.unwrap_or_else(|| cfg.server_url.clone()),
        unit_id: unit_id.unwrap_or_else(|| cfg.unit_id.clone()),
        tick_period: Duration::from_millis(cfg.tick_period_ms),
        poll_interval: Duration::from_millis(cfg.poll_interval_ms),
        request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        debounce_window: Duration::from_millis(cfg.debounce_window_ms),
        max_run: cfg.max_run_ms.map(Duration::from_millis),
    };

    println!(
        "  Unit {} with {} simulated slots, polling {}\n",
        controller_config.unit_id.bold(),
        slots,
        controller_config.base_url.bold()
    );

    let (registry, handles) = SimCabinet::new().with_slots(slots).build();
    let controller = ControllerLoop::new(controller_config, registry)?;

    let cam = simulate::spawn_cam_follower(handles, shutdown.clone());
    controller.run(shutdown).await;
    cam.abort();
    println!("{}", "  ✓ Controller stopped.".green());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Park until Ctrl-C raises the flag or the spawned task exits on its own.
async fn wait_for_shutdown<T>(shutdown: &AtomicBool, task: &tokio::task::JoinHandle<T>) {
    while !shutdown.load(Ordering::SeqCst) && !task.is_finished() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Initialise tracing-subscriber from RUST_LOG (defaults to "info").
/// Set VENDOS_LOG_FORMAT=json to emit newline-delimited JSON logs for log
/// aggregators.  User-facing output still uses println! for UX consistency.
fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("VENDOS_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

fn print_banner() {
    println!();
    println!("{}", r#" _   __           ________  ____"#.bold().cyan());
    println!("{}", r#"| | / /__ ___  __/ / __ \/ __/"#.bold().cyan());
    println!("{}", r#"| |/ / -_) _ \/ _  / /_/ /\ \  "#.bold().cyan());
    println!("{}", r#"|___/\__/_//_/\_,_/\____/___/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "VendOS".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Vending-machine control stack");
    println!();
}
