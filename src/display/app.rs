use super::{
    art::{decode_art, fit_dimensions, resample, ResizeDebounce},
    DisplayCommand, RunningFlag, SongInfo, NOT_PLAYING,
};
use crate::{
    layout::{ArtPlacement, Layout},
    theme::Palette,
};
use eframe::egui::{
    self, load::SizedTexture, Align, CursorIcon, Key, RichText, TextureHandle, TextureOptions,
    ViewportCommand,
};
use image::RgbaImage;
use std::{
    path::Path,
    sync::mpsc::{self, TryRecvError},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

const IDLE_REPAINT: Duration = Duration::from_millis(500);

/// Decoded art plus the texture currently fitted to the screen.
struct AlbumArt {
    source: RgbaImage,
    texture: TextureHandle,
    fitted_for: [u32; 2],
}

pub struct TuneDisplayApp {
    layout: Layout,
    palette: Palette,
    running: RunningFlag,
    commands: Option<mpsc::Receiver<DisplayCommand>>,
    song: SongInfo,
    art: Option<AlbumArt>,
    art_region: [u32; 2],
    text_height: f32,
    debounce: ResizeDebounce,
    fullscreen: bool,
}

impl TuneDisplayApp {
    pub fn new(
        layout: Layout,
        palette: Palette,
        running: RunningFlag,
        commands: mpsc::Receiver<DisplayCommand>,
    ) -> Self {
        let art_region = [layout.inner_size[0] as u32, layout.inner_size[1] as u32];
        let fullscreen = layout.starts_fullscreen();
        Self {
            layout,
            palette,
            running,
            commands: Some(commands),
            song: SongInfo::default(),
            art: None,
            art_region,
            text_height: 0.0,
            debounce: ResizeDebounce::default(),
            fullscreen,
        }
    }

    fn drain_commands(&mut self, ctx: &egui::Context) {
        let mut pending = Vec::new();
        if let Some(rx) = self.commands.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(command) => pending.push(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.commands = None;
                        break;
                    }
                }
            }
        }

        for command in pending {
            match command {
                DisplayCommand::SongInfo(song) => self.song = song,
                DisplayCommand::AlbumArt(path) => self.load_art(ctx, &path),
                DisplayCommand::ClearAlbumArt => {
                    self.art = None;
                    self.debounce.cancel();
                }
                DisplayCommand::Close => ctx.send_viewport_cmd(ViewportCommand::Close),
            }
        }
    }

    /// Swap in new art. A decode failure leaves the current art on screen.
    fn load_art(&mut self, ctx: &egui::Context, path: &Path) {
        if !self.running.is_running() || !path.exists() {
            debug!(path = %path.display(), "Skipping album art update");
            return;
        }
        let source = match decode_art(path) {
            Ok(source) => source,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Keeping previous album art");
                return;
            }
        };

        let Some(size) = fit_dimensions(
            [source.width(), source.height()],
            self.region_f32(),
            self.layout.placement.fit_mode(),
        ) else {
            warn!(path = %path.display(), "Album art has no pixels; ignoring");
            return;
        };

        let texture = ctx.load_texture(
            "now_playing.album_art",
            resample(&source, size),
            TextureOptions::LINEAR,
        );
        info!(path = %path.display(), width = size[0], height = size[1], "Album art updated");
        self.art = Some(AlbumArt {
            source,
            texture,
            fitted_for: self.art_region,
        });
        self.debounce.cancel();
    }

    fn region_f32(&self) -> [f32; 2] {
        [self.art_region[0] as f32, self.art_region[1] as f32]
    }

    /// Record the region art may occupy this frame and refit once it settles.
    fn track_region(&mut self, region: egui::Vec2, pixels_per_point: f32, now: Instant) {
        let region = [
            (region.x * pixels_per_point).max(0.0).round() as u32,
            (region.y * pixels_per_point).max(0.0).round() as u32,
        ];
        self.art_region = region;

        match &self.art {
            Some(art) if art.fitted_for != region => self.debounce.observe(region, now),
            _ => self.debounce.cancel(),
        }

        if let Some(due) = self.debounce.take_due(now) {
            self.refit(due);
        }
    }

    fn refit(&mut self, region: [u32; 2]) {
        let mode = self.layout.placement.fit_mode();
        let Some(art) = self.art.as_mut() else {
            return;
        };
        let available = [region[0] as f32, region[1] as f32];
        let source = [art.source.width(), art.source.height()];
        if let Some(size) = fit_dimensions(source, available, mode) {
            art.texture.set(resample(&art.source, size), TextureOptions::LINEAR);
            art.fitted_for = region;
            debug!(width = size[0], height = size[1], "Refitted album art");
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (escape, quit) = ctx.input(|i| (i.key_pressed(Key::Escape), i.key_pressed(Key::Q)));
        if escape {
            self.fullscreen = !self.fullscreen;
            ctx.send_viewport_cmd(ViewportCommand::Fullscreen(self.fullscreen));
        }
        if quit {
            info!("Quit requested from keyboard");
            self.running.stop();
            ctx.send_viewport_cmd(ViewportCommand::Close);
        }
    }

    fn render(&mut self, ui: &mut egui::Ui) -> egui::Vec2 {
        let spacing = self.layout.spacing;
        match self.layout.placement {
            ArtPlacement::Left | ArtPlacement::Right => {
                let available = ui.available_size();
                let region = egui::vec2(available.x, available.y);
                let direction = if self.layout.placement == ArtPlacement::Left {
                    egui::Layout::left_to_right(Align::Center)
                } else {
                    egui::Layout::right_to_left(Align::Center)
                };
                ui.with_layout(direction, |ui| {
                    if self.paint_art(ui) {
                        ui.add_space(spacing);
                    }
                    ui.vertical(|ui| self.paint_text(ui));
                });
                region
            }
            ArtPlacement::Top => {
                let available = ui.available_size();
                let region = egui::vec2(
                    available.x,
                    (available.y - self.text_height - spacing).max(0.0),
                );
                ui.vertical_centered(|ui| {
                    if self.paint_art(ui) {
                        ui.add_space(spacing);
                    }
                    let text = ui.vertical_centered(|ui| self.paint_text(ui)).response;
                    self.text_height = text.rect.height();
                });
                region
            }
            ArtPlacement::Bottom => {
                let mut region = egui::Vec2::ZERO;
                ui.vertical_centered(|ui| {
                    ui.vertical_centered(|ui| self.paint_text(ui));
                    ui.add_space(spacing);
                    region = ui.available_size();
                    self.paint_art(ui);
                });
                region
            }
        }
    }

    fn paint_art(&self, ui: &mut egui::Ui) -> bool {
        let Some(art) = &self.art else {
            return false;
        };
        let size = art.texture.size_vec2() / ui.ctx().pixels_per_point();
        ui.image(SizedTexture::new(art.texture.id(), size));
        true
    }

    fn paint_text(&self, ui: &mut egui::Ui) {
        let palette = &self.palette;
        if self.song.is_idle() {
            wrapped(ui, RichText::new(NOT_PLAYING).size(palette.title_size), palette);
            return;
        }

        wrapped(
            ui,
            RichText::new(&self.song.title).size(palette.title_size).strong(),
            palette,
        );
        wrapped(ui, RichText::new(&self.song.artist).size(palette.artist_size), palette);
        wrapped(ui, RichText::new(&self.song.album).size(palette.album_size), palette);
    }
}

fn wrapped(ui: &mut egui::Ui, text: RichText, palette: &Palette) {
    ui.add(egui::Label::new(text.color(palette.foreground)).wrap());
}

impl eframe::App for TuneDisplayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_commands(ctx);
        self.handle_keys(ctx);

        if self.fullscreen && self.layout.hide_cursor {
            ctx.set_cursor_icon(CursorIcon::None);
        }

        let panel_frame = egui::Frame::new()
            .fill(self.palette.background)
            .inner_margin(egui::Margin::same(20));

        let mut region = egui::Vec2::ZERO;
        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                region = self.render(ui);
            });

        let now = Instant::now();
        self.track_region(region, ctx.pixels_per_point(), now);

        let next = self.debounce.time_left(now).unwrap_or(IDLE_REPAINT);
        ctx.request_repaint_after(next);
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        egui::Rgba::TRANSPARENT.to_array()
    }
}

impl Drop for TuneDisplayApp {
    fn drop(&mut self) {
        self.running.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;

    fn app() -> (TuneDisplayApp, mpsc::Sender<DisplayCommand>) {
        let mut warnings = Vec::new();
        let display = DisplayConfig::default();
        let layout = Layout::resolve(&display, Some("art_top"), true, &mut warnings);
        let palette = Palette::resolve(&display, &mut warnings);
        let (tx, rx) = mpsc::channel();
        (TuneDisplayApp::new(layout, palette, RunningFlag::new(), rx), tx)
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, height, image::Rgba([30, 60, 90, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn applies_queued_song_and_art() {
        let ctx = egui::Context::default();
        let (mut app, tx) = app();
        let dir = tempfile::tempdir().unwrap();
        let art = write_png(dir.path(), "art.png", 1200, 600);

        tx.send(DisplayCommand::SongInfo(SongInfo::new("Title", "Artist", "Album")))
            .unwrap();
        tx.send(DisplayCommand::AlbumArt(art)).unwrap();
        app.drain_commands(&ctx);

        assert_eq!(app.song, SongInfo::new("Title", "Artist", "Album"));
        let texture = &app.art.as_ref().unwrap().texture;
        assert_eq!(texture.size(), [600, 300]);
    }

    #[test]
    fn undecodable_art_keeps_previous_texture() {
        let ctx = egui::Context::default();
        let (mut app, tx) = app();
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path(), "good.png", 10, 10);
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not an image").unwrap();

        tx.send(DisplayCommand::AlbumArt(good)).unwrap();
        app.drain_commands(&ctx);
        let before = app.art.as_ref().unwrap().texture.id();

        tx.send(DisplayCommand::AlbumArt(bad)).unwrap();
        app.drain_commands(&ctx);
        assert_eq!(app.art.as_ref().unwrap().texture.id(), before);

        tx.send(DisplayCommand::ClearAlbumArt).unwrap();
        app.drain_commands(&ctx);
        assert!(app.art.is_none());
    }

    #[test]
    fn region_changes_refit_after_debounce() {
        let ctx = egui::Context::default();
        let (mut app, tx) = app();
        let dir = tempfile::tempdir().unwrap();
        tx.send(DisplayCommand::AlbumArt(write_png(dir.path(), "art.png", 100, 100)))
            .unwrap();
        app.drain_commands(&ctx);

        let start = Instant::now();
        app.track_region(egui::vec2(300.0, 200.0), 1.0, start);
        app.track_region(egui::vec2(320.0, 250.0), 1.0, start + Duration::from_millis(50));
        assert_eq!(app.art.as_ref().unwrap().texture.size(), [600, 600]);

        app.track_region(egui::vec2(320.0, 250.0), 1.0, start + Duration::from_millis(200));
        let art = app.art.as_ref().unwrap();
        assert_eq!(art.texture.size(), [250, 250]);
        assert_eq!(art.fitted_for, [320, 250]);
    }

    #[test]
    fn dropping_the_app_stops_the_flag() {
        let (app, _tx) = app();
        let running = app.running.clone();
        drop(app);
        assert!(!running.is_running());
    }
}
