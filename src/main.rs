mod cli;
mod logger;
mod notify;
mod watcher;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use cli::Cli;
use dotenv::dotenv;
use logger::{Event, Logger};
use notify::{DiscordNotifier, Notifier};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use watcher::policy::SeverityPolicy;
use watcher::snapshot::ProcSnapshotSource;
use watcher::types::{SessionStats, ShutdownFlag};
use watcher::{Watcher, WatcherConfig};

fn main() -> anyhow::Result<()> {
    // Pull DISCORD_TOKEN / USER_ID from a .env file when present.
    dotenv().ok();
    let cli = Cli::parse();

    // The logger must exist before validation so fatal configuration
    // errors leave a trail in the audit log.
    let logger = Arc::new(
        Logger::new(&cli.log_dir, cli.json).context("failed to open audit log")?,
    );

    // ── Configuration validation ─────────────────────────────────────────────
    // Everything is validated eagerly; the watcher never starts on a bad
    // mapping or missing credentials.
    let policy = match SeverityPolicy::parse(&cli.ports) {
        Ok(policy) => policy,
        Err(e) => {
            let error = e.to_string();
            logger.log(&Event::ConfigRejected { error: &error });
            return Err(cli::ConfigError::from(e).into());
        }
    };

    let creds = match cli::credentials_from_env() {
        Ok(creds) => creds,
        Err(e) => {
            let error = e.to_string();
            logger.log(&Event::ConfigRejected { error: &error });
            return Err(e.into());
        }
    };

    let interval = if cli.interval == 0 {
        logger.log(&Event::ConfigWarning {
            message: "polling interval of 0s is invalid, falling back to 5s",
        });
        Duration::from_secs(5)
    } else {
        Duration::from_secs(cli.interval)
    };

    // ── Shutdown handling ────────────────────────────────────────────────────
    let shutdown: ShutdownFlag = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        println!("\n[!] Ctrl+C received, shutting down...");
        shutdown_ctrlc.store(true, Ordering::SeqCst);
    })
    .context("failed to register Ctrl+C handler")?;

    let notifier = DiscordNotifier::new(creds.token, creds.user_id)
        .context("failed to build notification client")?;

    let stats = SessionStats::new();
    let session_start = Instant::now();

    // ── Startup ──────────────────────────────────────────────────────────────
    let started = format!(
        "Monitoring {} every {}s",
        policy.describe(),
        interval.as_secs()
    );
    logger.log(&Event::Info { message: &started });

    // One-time readiness ping to the operator. Best-effort, like every
    // alert delivery after it.
    let ready = format!(
        "portwatch ready at {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if let Err(e) = notifier.send(&ready) {
        let error = e.to_string();
        logger.log(&Event::NotifyFailed { error: &error });
    }

    // ── Watch loop ───────────────────────────────────────────────────────────
    let cfg = WatcherConfig {
        policy,
        source:   Box::new(ProcSnapshotSource),
        interval,
        logger:   Arc::clone(&logger),
        stats:    Arc::clone(&stats),
        shutdown: Arc::clone(&shutdown),
    };
    let mut watcher = Watcher::new(cfg, Box::new(notifier));
    watcher.run();

    // ── Summary ──────────────────────────────────────────────────────────────
    logger.log(&Event::SessionSummary {
        duration_secs:     session_start.elapsed().as_secs(),
        cycles:            stats.cycles_total.load(Ordering::Relaxed),
        snapshot_failures: stats.snapshot_failures.load(Ordering::Relaxed),
        alerts:            stats.alerts_dispatched.load(Ordering::Relaxed),
        notify_failures:   stats.notify_failures.load(Ordering::Relaxed),
    });

    Ok(())
}
