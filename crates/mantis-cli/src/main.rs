//! `mantis` – operator shell for the Mantis motion controllers.
//!
//! This binary:
//!
//! 1. Loads `~/.mantis/config.toml`, writing the defaults on first run.
//! 2. Builds a simulated cell from the `[sim]` table and a [`Controller`]
//!    from the `[control]` table.
//! 3. Drops the operator into an **interactive REPL** with slash-commands.
//! 4. Intercepts **Ctrl-C**: a running command is cancelled (a controller
//!    in motion stops the base); at an idle prompt the CLI exits.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use mantis_control::Controller;
use mantis_hal::SimRobot;
use mantis_kernel::{CancelToken, MotionLock};

use crate::repl::Interrupt;

fn main() {
    // RUST_LOG, MANTIS_LOG_FORMAT and OTEL_EXPORTER_OTLP_ENDPOINT are read
    // here.  User-facing output still uses println!.
    let _telemetry = mantis_control::telemetry::init_tracing("mantis-cli");

    print_banner();

    let cfg = load_or_create_config();

    // ── Controller over the simulated cell ────────────────────────────────
    let motion = MotionLock::new();
    let cancel = CancelToken::new();
    let robot = SimRobot::new(cfg.sim.clone());
    let ctl = Controller::new(robot, cfg.control.clone())
        .with_motion_lock(motion.clone())
        .with_cancel_token(cancel.clone());
    info!(target_label = %cfg.control.target_label, "controller ready");

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let busy = Arc::new(AtomicBool::new(false));
    let busy_clone = busy.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        match Interrupt::decide(busy_clone.load(Ordering::SeqCst), motion.holder()) {
            Interrupt::Cancel(operation) => {
                println!(
                    "{} {} …",
                    "⚠  Ctrl-C received – cancelling".yellow().bold(),
                    operation.bold()
                );
                cancel.cancel();
            }
            Interrupt::Exit => {
                println!("{}", "  ✓ Exiting Mantis.".green());
                shutdown_clone.store(true, Ordering::SeqCst);
                // The REPL is blocked on stdin; nothing is in motion.
                std::process::exit(0);
            }
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; running operations cannot be cancelled from the keyboard");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&ctl, shutdown, busy);
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_or_create_config() -> config::Config {
    let path = config::config_path();
    match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __  ___          __  _     "#.bold().cyan());
    println!("{}", r#"  /  |/  /__ ____  / /_(_)__  "#.bold().cyan());
    println!("{}", r#" / /|_/ / _ `/ _ \/ __/ (_-<  "#.bold().cyan());
    println!("{}", r#"/_/  /_/\_,_/_//_/\__/_/___/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Mantis".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Perception-to-motion control for mobile manipulators");
    println!();
}
