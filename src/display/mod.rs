pub mod app;
pub mod art;

use crate::{layout::Layout, monitor::NowPlayingDisplay, theme::Palette};
use anyhow::anyhow;
use app::TuneDisplayApp;
use eframe::egui::{self, ViewportBuilder, WindowLevel};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, OnceLock,
    },
};
use tracing::{debug, warn};

pub const WINDOW_TITLE: &str = "TuneDisplay";
pub const NOT_PLAYING: &str = "Currently not playing anything";

/// Text shown in the song area. All-empty fields mean idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl SongInfo {
    pub fn new(title: &str, artist: &str, album: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.title.is_empty() && self.artist.is_empty() && self.album.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCommand {
    SongInfo(SongInfo),
    AlbumArt(PathBuf),
    ClearAlbumArt,
    Close,
}

/// Shared "is the display still open" flag. Readers may observe a stop one
/// poll late.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns whether this call did the stopping.
    pub fn stop(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe front for the window. Every update is queued and the UI
/// thread is woken to apply it.
#[derive(Clone)]
pub struct DisplayHandle {
    commands: mpsc::Sender<DisplayCommand>,
    context: Arc<OnceLock<egui::Context>>,
    running: RunningFlag,
}

impl DisplayHandle {
    fn send(&self, command: DisplayCommand) {
        if !self.running.is_running() {
            debug!(?command, "Display closed; dropping update");
            return;
        }
        if self.commands.send(command).is_err() {
            debug!("Display receiver gone; dropping update");
            return;
        }
        self.wake();
    }

    fn wake(&self) {
        if let Some(ctx) = self.context.get() {
            ctx.request_repaint();
        }
    }

    /// Ask the window to close. Safe to call from any thread, any number of times.
    pub fn close(&self) {
        if self.running.stop() {
            let _ = self.commands.send(DisplayCommand::Close);
            self.wake();
        }
    }
}

impl NowPlayingDisplay for DisplayHandle {
    fn is_running(&self) -> bool {
        self.running.is_running()
    }

    fn update_song_info(&self, title: &str, artist: &str, album: &str) {
        self.send(DisplayCommand::SongInfo(SongInfo::new(title, artist, album)));
    }

    fn update_album_art(&self, path: &Path) {
        if !path.exists() {
            warn!(path = %path.display(), "Album art file missing; keeping current art");
            return;
        }
        self.send(DisplayCommand::AlbumArt(path.to_path_buf()));
    }

    fn clear_album_art(&self) {
        self.send(DisplayCommand::ClearAlbumArt);
    }
}

/// The window itself. Owns the UI-thread half of the command channel.
pub struct DisplaySurface {
    layout: Layout,
    palette: Palette,
    running: RunningFlag,
    commands: mpsc::Receiver<DisplayCommand>,
    context: Arc<OnceLock<egui::Context>>,
}

impl DisplaySurface {
    pub fn new(layout: Layout, palette: Palette, running: RunningFlag) -> (Self, DisplayHandle) {
        let (tx, rx) = mpsc::channel();
        let context = Arc::new(OnceLock::new());
        let handle = DisplayHandle {
            commands: tx,
            context: Arc::clone(&context),
            running: running.clone(),
        };
        let surface = Self {
            layout,
            palette,
            running,
            commands: rx,
            context,
        };
        (surface, handle)
    }

    fn viewport(&self) -> ViewportBuilder {
        let mut viewport = ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_decorations(false)
            .with_transparent(true)
            .with_inner_size(self.layout.inner_size)
            .with_fullscreen(self.layout.starts_fullscreen());
        if self.layout.always_on_top {
            viewport = viewport.with_window_level(WindowLevel::AlwaysOnTop);
        }
        viewport
    }

    /// Blocks the calling thread until the window closes.
    pub fn start(self) -> anyhow::Result<()> {
        let native_options = eframe::NativeOptions {
            viewport: self.viewport(),
            ..Default::default()
        };
        let running = self.running.clone();
        let Self {
            layout,
            palette,
            running: app_running,
            commands,
            context,
        } = self;

        let run_res = eframe::run_native(
            WINDOW_TITLE,
            native_options,
            Box::new(
                move |cc| -> std::result::Result<
                    Box<dyn eframe::App>,
                    Box<dyn std::error::Error + Send + Sync>,
                > {
                    let _ = context.set(cc.egui_ctx.clone());
                    Ok(Box::new(TuneDisplayApp::new(
                        layout,
                        palette,
                        app_running,
                        commands,
                    )))
                },
            ),
        );

        running.stop();
        run_res.map_err(|err| anyhow!("Display window failed: {err}"))
    }
}
