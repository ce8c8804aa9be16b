//! penhub demo host.
//!
//! Builds a manager with the providers enabled in the configuration, feeds the
//! simulated tablet and the system-mouse provider from a background thread and
//! logs everything the manager schedules.  Useful to watch device discovery,
//! id allocation and pause handling without a GUI toolkit or a tablet driver.
//!
//! # Usage
//!
//! ```text
//! penhub-demo [OPTIONS]
//!
//! Options:
//!   --config <PATH>             Config file [default: platform config dir]
//!   --run-for-secs <SECS>       Stop after SECS seconds; 0 waits for Ctrl-C [default: 5]
//!   --log-level <FILTER>        tracing filter; overrides RUST_LOG and the config
//!   --simulated-cursors <N>     Pens on the simulated tablet [default: 2]
//!   --write-config              Write the effective config back to disk
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Manager::new()            -- discovery thread adds the constructors
//!       ├─ Emulation provider
//!       ├─ System mouse provider
//!       ├─ Wintab               (absent: not constructable / no binding)
//!       └─ Simulated tablet     (polling thread)
//!  └─ feeder thread             -- packets, mouse moves, pointer activity
//! ```

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use penhub_core::{ButtonKind, Level, LevelType, ScrollDirection};
use penhub_manager::application::manager::Manager;
use penhub_manager::application::provider::{ConstructionError, ProviderConstructor};
use penhub_manager::infrastructure::logging::{LoggingListener, LoggingScheduler};
use penhub_manager::infrastructure::native::simulated::{SimulatedTablet, SimulatedTabletFeed};
use penhub_manager::infrastructure::native::PacketSource;
use penhub_manager::infrastructure::providers::emulation::EmulationConstructor;
use penhub_manager::infrastructure::providers::polling::{PlatformGate, PollingConstructor};
use penhub_manager::infrastructure::providers::system_mouse::SystemMouseConstructor;
use penhub_manager::infrastructure::storage::config::{self, AppConfig, ConfigError};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// penhub demo host.
#[derive(Debug, Parser)]
#[command(name = "penhub-demo", about = "Runs a penhub manager against simulated input", version)]
struct Cli {
    /// Configuration file.  Defaults to `penhub/config.toml` in the platform
    /// config directory.
    #[arg(long, env = "PENHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after this many seconds; `0` runs until Ctrl-C.
    #[arg(long, default_value_t = 5, env = "PENHUB_RUN_FOR_SECS")]
    run_for_secs: u64,

    /// `tracing` filter directive.  Takes precedence over `RUST_LOG` and the
    /// config file.
    #[arg(long, env = "PENHUB_LOG")]
    log_level: Option<String>,

    /// Number of pens on the simulated tablet.
    #[arg(long, default_value_t = 2, env = "PENHUB_SIMULATED_CURSORS")]
    simulated_cursors: u32,

    /// Write the effective configuration back to the config file.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    fn config_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config::config_file_path(),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path();
    let app_config = match &config_path {
        Ok(path) => config::load_config_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        Err(_) => AppConfig::default(),
    };

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&app_config.manager.log_level)),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("penhub demo starting");
    if let Err(e) = &config_path {
        warn!("using default configuration: {e}");
    }

    if cli.write_config {
        let path = config_path.context("no config path to write to")?;
        config::save_config_to(&path, &app_config)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("configuration written to {}", path.display());
    }

    // ── Providers ─────────────────────────────────────────────────────────────
    let scheduler = Arc::new(LoggingScheduler::new());
    let emulation = Arc::new(EmulationConstructor::new());
    let system_mouse = Arc::new(SystemMouseConstructor::new(
        app_config.screen.width,
        app_config.screen.height,
    ));
    let (tablet, feed) = SimulatedTablet::new();
    let tablet = Mutex::new(Some(tablet));

    let mut constructors: Vec<Arc<dyn ProviderConstructor>> = Vec::new();
    if app_config.providers.emulation {
        constructors.push(emulation.clone());
    }
    if app_config.providers.system_mouse {
        constructors.push(system_mouse.clone());
    }
    if app_config.providers.native {
        constructors.push(Arc::new(
            PollingConstructor::wintab(Box::new(|| {
                Err(ConstructionError::Unavailable(
                    "this build carries no Wintab binding".into(),
                ))
            }))
            .with_period(app_config.poll_period()),
        ));
        constructors.push(Arc::new(
            PollingConstructor::new(
                "Simulated",
                PlatformGate::Any,
                Box::new(move || {
                    tablet
                        .lock()
                        .take()
                        .map(|t| Box::new(t) as Box<dyn PacketSource>)
                        .ok_or_else(|| ConstructionError::Unavailable("tablet already opened".into()))
                }),
            )
            .with_period(app_config.poll_period()),
        ));
    }

    // ── Manager ───────────────────────────────────────────────────────────────
    let manager = Manager::new(
        app_config.manager_config(),
        scheduler.clone(),
        Box::new(constructors),
    )?;
    manager.add_listener(LoggingListener::shared());

    let waiting = manager.clone();
    tokio::task::spawn_blocking(move || waiting.wait_for_discovery()).await?;
    for slot in manager.provider_constructors() {
        info!("{}: {:?}", slot.id(), slot.state());
    }
    // Devices registered during discovery may predate the listener.
    for device in manager.devices() {
        info!("registered: {device} [{:?}]", device.kind());
    }

    if app_config.manager.start_running {
        manager.set_paused(false);
    }

    // ── Feeder ────────────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let feeder = {
        let running = Arc::clone(&running);
        let cursors = cli.simulated_cursors;
        let screen = (app_config.screen.width, app_config.screen.height);
        thread::Builder::new()
            .name("penhub-demo-feed".into())
            .spawn(move || feed_input(&running, &feed, &system_mouse, &emulation, cursors, screen))
            .context("starting the feeder thread")?
    };

    // ── Wait for Ctrl-C or the run timer ─────────────────────────────────────
    let run_for = (cli.run_for_secs > 0).then(|| Duration::from_secs(cli.run_for_secs));
    let timer = async move {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    info!("penhub demo running.  Press Ctrl-C to exit.");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for Ctrl-C")?;
            info!("shutdown signal received");
        }
        () = timer => info!("run time elapsed"),
    }

    running.store(false, Ordering::Relaxed);
    tokio::task::spawn_blocking(move || feeder.join())
        .await?
        .map_err(|_| anyhow::anyhow!("feeder thread panicked"))?;
    manager.set_paused(true);

    let counts = scheduler.counts();
    info!(
        "scheduled {} level, {} button and {} scroll event(s); {} device(s) still registered",
        counts.levels,
        counts.buttons,
        counts.scrolls,
        manager.devices().len()
    );
    info!("penhub demo stopped");
    Ok(())
}

/// Simulates a user: pens draw circles on the tablet, the mouse wanders and
/// the emulated device scrolls.  Removes the pens before returning.
fn feed_input(
    running: &AtomicBool,
    feed: &SimulatedTabletFeed,
    system_mouse: &SystemMouseConstructor,
    emulation: &EmulationConstructor,
    cursors: u32,
    (width, height): (u32, u32),
) {
    let mut tick: u64 = 0;
    while running.load(Ordering::Relaxed) {
        let phase = (tick % 360) as f32 / 360.0 * TAU;
        for cursor in 0..cursors {
            let radius = 2000.0 + 500.0 * cursor as f32;
            let tip_down = (tick / 50) % 2 == 0;
            feed.push_sample(
                cursor,
                tick,
                7600.0 + radius * phase.cos(),
                4750.0 + radius * phase.sin(),
                if tip_down { 512.0 } else { 0.0 },
                u32::from(tip_down),
            );
        }

        if let Some(mouse) = system_mouse.provider() {
            let x = width as f32 / 2.0 * (1.0 + phase.cos());
            let y = height as f32 / 2.0 * (1.0 + phase.sin());
            mouse.mouse_moved(x, y);
            if tick % 100 == 0 {
                mouse.mouse_button(ButtonKind::Left, (tick / 100) % 2 == 0);
            }
        }

        if let Some(emulated) = emulation.provider() {
            if tick % 25 == 0 {
                emulated.emulate_levels(&[Level::new(LevelType::Pressure, 0.5)]);
                let direction = if (tick / 25) % 2 == 0 {
                    ScrollDirection::Up
                } else {
                    ScrollDirection::Down
                };
                emulated.emulate_scroll(direction, 1);
            }
        }

        tick += 1;
        thread::sleep(Duration::from_millis(4));
    }

    for cursor in 0..cursors {
        feed.remove_cursor(cursor);
    }
    // Let the polling thread pick up the removals.
    thread::sleep(Duration::from_millis(50));
}
