//! scheduler-worker: emulated host driving both schedulers.
//!
//! Registers a demo owner, schedules a few one-shot and repeating tasks on
//! each scheduler, then runs the host simulation step at the configured tick
//! rate until `--ticks` steps have passed or Ctrl-C is received. Prints the
//! dispatch metrics of both schedulers as JSON on exit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use tickwork_core::{Config, Owner, OwnerInfo, OwnerRegistry};
use tickwork_scheduler::{
    Scheduler, TaskBody, TickPhase, TickScheduler, WallClockScheduler,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Emulated host for the tick and wall-clock schedulers.
#[derive(Parser, Debug)]
#[command(name = "scheduler-worker", version, about)]
struct Cli {
    /// Number of host steps to run before exiting.
    #[arg(long, env = "WORKER_TICKS", default_value_t = 100)]
    ticks: u64,

    /// Override the configured host tick rate.
    #[arg(long)]
    tick_rate_hz: Option<u32>,

    /// Configuration profile (falls back to TICKWORK_PROFILE).
    #[arg(long)]
    profile: Option<String>,
}

// ── Demo workload ───────────────────────────────────────────────────

fn schedule_demo_tasks(
    owner: &Owner,
    ticks: &TickScheduler,
    wall: &WallClockScheduler,
) -> anyhow::Result<()> {
    let autosaves = Arc::new(AtomicU64::new(0));

    ticks
        .run_task_after(
            Some(owner.clone()),
            Some(TaskBody::from_fn(|| info!("tick one-shot fired"))),
            10,
        )?
        .set_name("tick-greeting");

    let counter = Arc::clone(&autosaves);
    ticks
        .run_repeating_task_after(
            Some(owner.clone()),
            Some(TaskBody::from_fn(move || {
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                info!(autosave = n, "autosave");
            })),
            20,
            5,
        )?
        .set_name("tick-autosave");

    wall.run_task_after(
        Some(owner.clone()),
        Some(TaskBody::from_fn(|| info!("wall-clock one-shot fired"))),
        chrono::Duration::milliseconds(500),
    )?
    .set_name("wall-greeting");

    wall.run_repeating_task(
        Some(owner.clone()),
        Some(TaskBody::new(|| {
            // Exercises fault isolation in the logs.
            anyhow::bail!("heartbeat sink unavailable")
        })),
        chrono::Duration::seconds(2),
    )?
    .set_name("wall-heartbeat");

    Ok(())
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tickwork_core::config::load_dotenv();
    let cli = Cli::parse();

    let mut config = match &cli.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    if let Some(rate) = cli.tick_rate_hz {
        config.host.tick_rate_hz = rate;
    }
    config.log_summary();

    let registry = Arc::new(OwnerRegistry::new());
    let owner: Owner = Arc::new(
        OwnerInfo::new("demo", "Demo Plugin").with_version(env!("CARGO_PKG_VERSION")),
    );
    registry.register(owner.as_ref())?;

    let ticks = TickScheduler::new(registry.clone());
    let wall = WallClockScheduler::start(registry, &config.scheduler)?;
    schedule_demo_tasks(&owner, &ticks, &wall)?;

    let mut interval =
        tokio::time::interval(Duration::from_millis(config.host.tick_interval_ms()));
    let mut steps = 0u64;
    info!(
        ticks = cli.ticks,
        tick_rate_hz = config.host.tick_rate_hz,
        "host simulation started"
    );

    while steps < cli.ticks {
        tokio::select! {
            _ = interval.tick() => {
                ticks.on_server_tick(TickPhase::Start);
                ticks.on_server_tick(TickPhase::End);
                steps += 1;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!(steps, "interrupted, shutting down");
                break;
            }
        }
    }

    wall.shutdown();
    info!(steps, "host simulation stopped");

    let report = serde_json::json!({
        "tick": ticks.metrics(),
        "wall_clock": wall.metrics(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
