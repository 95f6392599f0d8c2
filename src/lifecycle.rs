use crate::{
    config::Settings,
    display::{DisplaySurface, RunningFlag},
    headless::HeadlessDisplay,
    lastfm::LastFmClient,
    monitor::{Monitor, MonitorSettings, Pacer},
};
use anyhow::Context;
use std::{
    fs, io,
    path::Path,
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

const PACER_SLICE: Duration = Duration::from_millis(100);
const MONITOR_THREAD: &str = "lastfm-monitor";

/// Sleeps in short slices and wakes early once the display has stopped.
#[derive(Debug, Clone)]
pub struct FlagPacer {
    running: RunningFlag,
    slice: Duration,
}

impl FlagPacer {
    pub fn new(running: RunningFlag) -> Self {
        Self {
            running,
            slice: PACER_SLICE,
        }
    }
}

impl Pacer for FlagPacer {
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.slice.min(deadline - now));
        }
    }
}

pub fn run(settings: Settings) -> anyhow::Result<()> {
    run_until_stopped(settings, RunningFlag::new())
}

/// Runs until `running` clears, then removes the art file whatever happened.
fn run_until_stopped(settings: Settings, running: RunningFlag) -> anyhow::Result<()> {
    let client = LastFmClient::new(
        settings.credentials.api_key.as_str(),
        settings.credentials.username.as_str(),
    )
    .context("Failed to build Last.fm client")?;

    let monitor_settings = MonitorSettings {
        interval: settings.interval,
        art_path: settings.art_enabled.then(|| settings.image_path.clone()),
    };

    info!(
        username = client.username(),
        interval_secs = settings.interval.as_secs(),
        art_enabled = settings.art_enabled,
        layout = settings.layout.placement.id(),
        headless = settings.headless,
        "Starting continuous monitoring"
    );

    let outcome = if settings.headless {
        run_headless(client, monitor_settings, settings.open_art, running);
        Ok(())
    } else {
        run_windowed(client, monitor_settings, &settings, running)
    };

    cleanup(&settings.image_path);
    outcome
}

fn run_windowed(
    client: LastFmClient,
    monitor_settings: MonitorSettings,
    settings: &Settings,
    running: RunningFlag,
) -> anyhow::Result<()> {
    let (surface, handle) = DisplaySurface::new(
        settings.layout.clone(),
        settings.palette.clone(),
        running.clone(),
    );

    let interrupt = handle.clone();
    install_interrupt_handler(move || interrupt.close());

    let pacer = FlagPacer::new(running.clone());
    let worker = thread::Builder::new()
        .name(MONITOR_THREAD.to_string())
        .spawn(move || Monitor::new(client, handle, pacer, monitor_settings).run())
        .context("Failed to spawn monitor thread")?;

    let outcome = surface.start();

    running.stop();
    if worker.join().is_err() {
        error!("Monitor thread panicked");
    }
    outcome
}

fn run_headless(
    client: LastFmClient,
    monitor_settings: MonitorSettings,
    open_art: bool,
    running: RunningFlag,
) {
    let interrupt = running.clone();
    install_interrupt_handler(move || {
        interrupt.stop();
    });

    let display = HeadlessDisplay::new(running.clone(), open_art);
    Monitor::new(client, display, FlagPacer::new(running), monitor_settings).run();
}

fn install_interrupt_handler<F>(on_interrupt: F)
where
    F: Fn() + Send + 'static,
{
    let result = ctrlc::set_handler(move || {
        info!("Interrupt received; shutting down");
        on_interrupt();
    });
    if let Err(err) = result {
        warn!(error = %err, "Could not install Ctrl-C handler");
    }
}

/// Best-effort removal of the downloaded art file.
pub fn cleanup(path: &Path) {
    info!("Performing cleanup...");
    match fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "Removed temporary image file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No temporary image file to remove");
        }
        Err(err) => error!(
            path = %path.display(),
            error = %err,
            "Error removing temporary image file"
        ),
    }
}
