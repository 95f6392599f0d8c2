use crate::{display::RunningFlag, monitor::NowPlayingDisplay};
use std::{io, path::Path, process::Command};
use tracing::{error, info};

#[cfg(target_os = "macos")]
const OPENER: &str = "open";
#[cfg(not(target_os = "macos"))]
const OPENER: &str = "xdg-open";

/// Window-less display: song changes go to the log, art optionally to the
/// desktop's image viewer.
#[derive(Debug, Clone)]
pub struct HeadlessDisplay {
    running: RunningFlag,
    open_art: bool,
}

impl HeadlessDisplay {
    pub fn new(running: RunningFlag, open_art: bool) -> Self {
        Self { running, open_art }
    }
}

impl NowPlayingDisplay for HeadlessDisplay {
    fn is_running(&self) -> bool {
        self.running.is_running()
    }

    fn update_song_info(&self, title: &str, artist: &str, album: &str) {
        if title.is_empty() && artist.is_empty() && album.is_empty() {
            info!("Display cleared");
        } else {
            info!(title, artist, album, "Display updated");
        }
    }

    fn update_album_art(&self, path: &Path) {
        if !self.open_art || !self.running.is_running() {
            return;
        }
        if let Err(err) = open_file(path) {
            error!(path = %path.display(), error = %err, "Error opening image file");
        }
    }

    fn clear_album_art(&self) {}
}

/// Hand `path` to the platform opener and wait for it to exit.
pub fn open_file(path: &Path) -> io::Result<()> {
    let status = Command::new(OPENER).arg(path).status().map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Could not find {OPENER} command to open the image"),
            )
        } else {
            err
        }
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{OPENER} exited with {status}")))
    }
}
