use crate::track::Track;
use std::{
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, error, info};

pub const EVENT_STARTED: &str = "now_playing_started";
pub const EVENT_CHANGED: &str = "now_playing_changed";
pub const EVENT_STOPPED: &str = "now_playing_stopped";

const BACKOFF_FACTOR: u32 = 2;

/// Where "now playing" information comes from.
pub trait NowPlayingSource: Send {
    /// One poll. `Ok(None)` means nothing is playing; `Err` is reserved for
    /// failures the source could not classify itself.
    fn poll(&mut self) -> anyhow::Result<Option<Track>>;

    fn fetch_art(&self, track: &Track, destination: &Path) -> Option<PathBuf>;
}

/// Fire-and-forget sink for what should be on screen.
pub trait NowPlayingDisplay: Send {
    fn is_running(&self) -> bool;
    fn update_song_info(&self, title: &str, artist: &str, album: &str);
    fn update_album_art(&self, path: &Path);
    fn clear_album_art(&self);
}

pub trait Pacer: Send {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Started(Track),
    Changed { previous: Track, current: Track },
    Stopped { previous: Track },
    Unchanged,
}

impl Transition {
    pub fn event_type(&self) -> Option<&'static str> {
        match self {
            Transition::Started(_) => Some(EVENT_STARTED),
            Transition::Changed { .. } => Some(EVENT_CHANGED),
            Transition::Stopped { .. } => Some(EVENT_STOPPED),
            Transition::Unchanged => None,
        }
    }
}

/// Two-state machine: `previous == None` is Idle, `Some(track)` is Playing.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    previous: Option<Track>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// What displaying `polled` would change. Leaves the state untouched.
    pub fn assess(&self, polled: &Option<Track>) -> Transition {
        match (&self.previous, polled) {
            (previous, current) if previous == current => Transition::Unchanged,
            (None, Some(current)) => Transition::Started(current.clone()),
            (Some(previous), Some(current)) => Transition::Changed {
                previous: previous.clone(),
                current: current.clone(),
            },
            (Some(previous), None) => Transition::Stopped {
                previous: previous.clone(),
            },
            (None, None) => Transition::Unchanged,
        }
    }

    /// Record `polled` as shown. Call only once the display has been updated.
    pub fn commit(&mut self, polled: Option<Track>) {
        self.previous = polled;
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// Destination for downloaded art; `None` disables art entirely.
    pub art_path: Option<PathBuf>,
}

impl MonitorSettings {
    pub fn backoff(&self) -> Duration {
        self.interval * BACKOFF_FACTOR
    }
}

pub struct Monitor<S, D, P> {
    source: S,
    display: D,
    pacer: P,
    settings: MonitorSettings,
    detector: ChangeDetector,
}

impl<S, D, P> Monitor<S, D, P>
where
    S: NowPlayingSource,
    D: NowPlayingDisplay,
    P: Pacer,
{
    pub fn new(source: S, display: D, pacer: P, settings: MonitorSettings) -> Self {
        Self {
            source,
            display,
            pacer,
            settings,
            detector: ChangeDetector::new(),
        }
    }

    /// Poll until the display stops running. Never returns early on errors.
    pub fn run(&mut self) {
        while self.display.is_running() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.poll_cycle()));
            let failure = match outcome {
                Ok(Ok(transition)) => {
                    if let Some(event) = transition.event_type() {
                        debug!(transition = event, "Display synchronised");
                    }
                    None
                }
                Ok(Err(err)) => Some(format!("{err:#}")),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };

            if let Some(cause) = failure {
                error!(
                    error = %cause,
                    backoff_secs = self.settings.backoff().as_secs_f64(),
                    "Error during check cycle"
                );
                self.pacer.sleep(self.settings.backoff());
            }

            self.pacer.sleep(self.settings.interval);
        }
        info!("Monitoring stopped");
    }

    pub fn poll_cycle(&mut self) -> anyhow::Result<Transition> {
        let polled = self.source.poll()?;
        let transition = self.detector.assess(&polled);
        self.apply(&transition);
        self.detector.commit(polled);
        Ok(transition)
    }

    fn apply(&self, transition: &Transition) {
        match transition {
            Transition::Started(track) => {
                log_track(EVENT_STARTED, "Playback started", track);
                self.show(track);
            }
            Transition::Changed { previous, current } => {
                log_track(EVENT_CHANGED, "New track playing", current);
                debug!(
                    previous_artist = previous.artist(),
                    previous_name = previous.name(),
                    "Replaced previous track"
                );
                self.show(current);
            }
            Transition::Stopped { previous } => {
                info!(
                    event_type = EVENT_STOPPED,
                    artist = previous.artist(),
                    name = previous.name(),
                    album = previous.album(),
                    art_url = previous.art_url_str(),
                    "Playback stopped"
                );
                self.display.update_song_info("", "", "");
                self.display.clear_album_art();
            }
            Transition::Unchanged => {}
        }
    }

    fn show(&self, track: &Track) {
        self.display
            .update_song_info(track.name(), track.artist(), track.album());
        self.refresh_art(track);
    }

    fn refresh_art(&self, track: &Track) {
        let (Some(destination), Some(url)) = (&self.settings.art_path, track.art_url()) else {
            return;
        };

        info!(art_url = %url, "Attempting to download album art");
        if let Some(path) = self.source.fetch_art(track, destination) {
            self.display.update_album_art(&path);
        }
    }
}

fn log_track(event_type: &'static str, message: &str, track: &Track) {
    info!(
        event_type,
        artist = track.artist(),
        name = track.name(),
        album = track.album(),
        art_url = track.art_url_str(),
        "{message}"
    );
    debug!(details = %track, "Track details");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with non-string payload".to_string()
    }
}
