// render.rs - The drawing side of the overlay.
//
// The frame loop talks to a `Renderer`: a transparent window that tracks the
// target window and accepts box and health-bar draw calls. Draw calls are
// queued during the frame and flushed on `present`.
//
// Backends:
//   - `gdi::GdiOverlay`    layered topmost GDI window (Windows only)
//   - `RecordingRenderer`  records draw calls, drives tests and dry runs

#[cfg(windows)]
pub mod gdi;

use crate::entities::HealthBand;

/// Distance between the health bar and the top of its box.
pub const HEALTH_BAR_GAP: i32 = 8;
pub const HEALTH_BAR_HEIGHT: i32 = 4;

// ============================================================
// Geometry & Colors
// ============================================================

/// Target window rectangle in desktop coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Pixel rectangle, right/bottom exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const GREEN: Rgb = Rgb(0, 255, 0);
pub const YELLOW: Rgb = Rgb(255, 255, 0);
pub const RED: Rgb = Rgb(255, 0, 0);

pub fn band_color(band: HealthBand) -> Rgb {
    match band {
        HealthBand::High => GREEN,
        HealthBand::Medium => YELLOW,
        HealthBand::Low => RED,
    }
}

/// Box outline in pixels.
pub fn box_rect(x: f32, y: f32, w: f32, h: f32) -> PixelRect {
    PixelRect {
        left: x as i32,
        top: y as i32,
        right: (x + w) as i32,
        bottom: (y + h) as i32,
    }
}

/// Red background strip with a green fill proportional to health.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthBar {
    pub background: PixelRect,
    pub fill: Option<PixelRect>,
}

impl HealthBar {
    pub fn layout(x: f32, y: f32, w: f32, health: i32) -> Self {
        let left = x as i32;
        let top = y as i32 - HEALTH_BAR_GAP;
        let bottom = top + HEALTH_BAR_HEIGHT;
        let background = PixelRect { left, top, right: (x + w) as i32, bottom };

        let pct = health.clamp(0, 100) as f32 / 100.0;
        let fill_w = (w * pct) as i32;
        let fill = (fill_w > 0).then_some(PixelRect { left, top, right: left + fill_w, bottom });

        Self { background, fill }
    }
}

// ============================================================
// Renderer
// ============================================================

pub trait Renderer {
    /// Poll the target window. Returns false once it no longer exists.
    /// Otherwise re-tracks its rectangle and starts a new frame.
    fn refresh(&mut self) -> bool;

    /// The target window's rectangle as of the last `refresh`.
    fn window_rect(&self) -> WindowRect;

    fn draw_box(&mut self, x: f32, y: f32, w: f32, h: f32, band: HealthBand);

    fn draw_health_bar(&mut self, x: f32, y: f32, w: f32, health: i32);

    /// Flush the queued draw calls to the screen. Frame pacing is done by
    /// the driver's `FramePacer`, not here.
    fn present(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCommand {
    Box { x: f32, y: f32, w: f32, h: f32, band: HealthBand },
    HealthBar { x: f32, y: f32, w: f32, health: i32 },
}

/// Renderer with no window. Keeps every presented frame.
///
/// Reports the window as closed after `frames` refreshes.
#[derive(Debug, Clone)]
pub struct RecordingRenderer {
    frames_left: usize,
    rect: WindowRect,
    pending: Vec<DrawCommand>,
    pub presented: Vec<Vec<DrawCommand>>,
}

impl RecordingRenderer {
    pub fn new(frames: usize, rect: WindowRect) -> Self {
        Self {
            frames_left: frames,
            rect,
            pending: Vec::new(),
            presented: Vec::new(),
        }
    }
}

impl Renderer for RecordingRenderer {
    fn refresh(&mut self) -> bool {
        if self.frames_left == 0 {
            return false;
        }
        self.frames_left -= 1;
        self.pending.clear();
        true
    }

    fn window_rect(&self) -> WindowRect {
        self.rect
    }

    fn draw_box(&mut self, x: f32, y: f32, w: f32, h: f32, band: HealthBand) {
        self.pending.push(DrawCommand::Box { x, y, w, h, band });
    }

    fn draw_health_bar(&mut self, x: f32, y: f32, w: f32, health: i32) {
        self.pending.push(DrawCommand::HealthBar { x, y, w, health });
    }

    fn present(&mut self) {
        self.presented.push(std::mem::take(&mut self.pending));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_follow_band() {
        assert_eq!(band_color(HealthBand::High), GREEN);
        assert_eq!(band_color(HealthBand::Medium), YELLOW);
        assert_eq!(band_color(HealthBand::Low), RED);
    }

    #[test]
    fn health_bar_sits_above_box() {
        let bar = HealthBar::layout(100.0, 200.0, 40.0, 50);
        assert_eq!(bar.background, PixelRect { left: 100, top: 192, right: 140, bottom: 196 });
        assert_eq!(bar.fill, Some(PixelRect { left: 100, top: 192, right: 120, bottom: 196 }));
    }

    #[test]
    fn health_bar_clamps_and_skips_empty_fill() {
        assert_eq!(HealthBar::layout(0.0, 10.0, 40.0, 0).fill, None);
        // Under one pixel of fill.
        assert_eq!(HealthBar::layout(0.0, 10.0, 40.0, 2).fill, None);
        let full = HealthBar::layout(0.0, 10.0, 40.0, 250);
        assert_eq!(full.fill.map(|r| r.right), Some(40));
    }

    #[test]
    fn box_rect_truncates_to_pixels() {
        assert_eq!(
            box_rect(10.7, 20.2, 5.5, 30.0),
            PixelRect { left: 10, top: 20, right: 16, bottom: 50 }
        );
    }

    #[test]
    fn recorder_closes_after_budget() {
        let mut r = RecordingRenderer::new(2, WindowRect::default());
        assert!(r.refresh());
        r.draw_box(1.0, 2.0, 3.0, 4.0, HealthBand::Low);
        r.present();
        assert!(r.refresh());
        r.present();
        assert!(!r.refresh());

        assert_eq!(r.presented.len(), 2);
        assert_eq!(r.presented[0].len(), 1);
        assert!(r.presented[1].is_empty());
    }
}
