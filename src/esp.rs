// esp.rs — Overlay driver: start-up and the per-frame loop.
//
// Each iteration, strictly in sequence on one thread:
//   1. ask the renderer whether the target window still exists
//   2. read the view matrix (on failure, skip this frame only)
//   3. read the viewport and build the entity snapshot
//   4. queue a box and a health bar per drawable entity, then present
//   5. sleep out the rest of the frame budget
//
// The only cross-frame state is the renderer's window geometry and the
// counters in `FrameStats`.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::entities::{build_snapshot, EntityList, FrameContext, LocalPlayer};
use crate::error::OverlayError;
use crate::math::{ViewMatrix, ViewportSize};
use crate::memory::{Process, Remote};
use crate::offsets::{EntityLayout, GlobalOffsets, CLIENT_MODULE, ENGINE_MODULE};
use crate::render::Renderer;

/// How often running statistics are logged.
const STATS_EVERY_FRAMES: u64 = 600;

// ============================================================
// Frame Pacing
// ============================================================

/// Caps the loop at a target rate. Slow frames are not made up for.
#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    last: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / fps.max(1),
            last: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until one period has passed since the previous call.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let deadline = last + self.period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
        self.last = Some(Instant::now());
    }
}

// ============================================================
// Overlay
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames that were drawn and presented.
    pub frames: u64,
    /// Frames dropped because the view matrix could not be read.
    pub skipped: u64,
    /// Boxes drawn across all frames.
    pub boxes: u64,
}

/// `base + offset`, rejecting offsets that run past the address space.
fn absolute(module: &str, base: u64, offset: u64) -> Result<u64, OverlayError> {
    base.checked_add(offset).ok_or_else(|| OverlayError::AddressOverflow {
        module: module.to_owned(),
        base,
        offset,
    })
}

/// Absolute addresses resolved once at start-up.
#[derive(Debug, Clone, Copy)]
struct Globals {
    entity_list: EntityList,
    view_matrix: u64,
    window_height: u64,
    window_width: u64,
}

pub struct Overlay<P, R> {
    process: P,
    renderer: R,
    globals: Globals,
    layout: EntityLayout,
    local: LocalPlayer,
    pacer: FramePacer,
    stats: FrameStats,
}

impl<P: Process, R: Renderer> Overlay<P, R> {
    /// Resolve module bases and the local player.
    ///
    /// A missing module is fatal. An unreadable local player is not: the
    /// overlay then runs with team 0 and no self-exclusion.
    pub fn attach(
        process: P,
        renderer: R,
        offsets: &GlobalOffsets,
        layout: EntityLayout,
        fps: u32,
    ) -> Result<Self, OverlayError> {
        let base = |name: &str| {
            process
                .module_base(name)
                .ok_or_else(|| OverlayError::ModuleNotFound(name.to_owned()))
        };
        let client = base(CLIENT_MODULE)?;
        let engine = base(ENGINE_MODULE)?;
        debug!("modules resolved: client={client:#x} engine={engine:#x}");

        let client_at = |offset| absolute(CLIENT_MODULE, client, offset);
        let engine_at = |offset| absolute(ENGINE_MODULE, engine, offset);
        let globals = Globals {
            entity_list: EntityList::new(client_at(offsets.entity_list)?),
            view_matrix: client_at(offsets.view_matrix)?,
            window_height: engine_at(offsets.window_height)?,
            window_width: engine_at(offsets.window_width)?,
        };
        let controller = client_at(offsets.local_player_controller)?;

        let local = match LocalPlayer::read(&process, controller, &layout) {
            Ok(local) => {
                info!(team = local.team, "local player resolved");
                local
            }
            Err(e) => {
                warn!("failed to read local player: {e}");
                LocalPlayer::default()
            }
        };

        Ok(Self {
            process,
            renderer,
            globals,
            layout,
            local,
            pacer: FramePacer::new(fps),
            stats: FrameStats::default(),
        })
    }

    /// [`Overlay::attach`] with offsets and layout taken from `config`.
    pub fn from_config(process: P, renderer: R, config: &Config) -> Result<Self, OverlayError> {
        let offsets = GlobalOffsets::load(config.offsets_path())?;
        Self::attach(process, renderer, &offsets, config.layout, config.overlay.fps)
    }

    pub fn local_player(&self) -> LocalPlayer {
        self.local
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Viewport from the engine, or the tracked window size if unreadable.
    fn viewport(&self) -> ViewportSize {
        let height = self.process.read_value::<u32>(self.globals.window_height);
        let width = self.process.read_value::<u32>(self.globals.window_width);
        match (height, width) {
            (Ok(h), Ok(w)) if h > 0 && w > 0 => ViewportSize::new(h, w),
            _ => {
                let rect = self.renderer.window_rect();
                ViewportSize::new(rect.height.max(0) as u32, rect.width.max(0) as u32)
            }
        }
    }

    /// Run one iteration. Returns false once the target window is gone.
    pub fn tick(&mut self) -> bool {
        if !self.renderer.refresh() {
            return false;
        }

        match self.process.read_value::<ViewMatrix>(self.globals.view_matrix) {
            Ok(matrix) => self.draw_frame(&matrix),
            Err(e) => {
                debug!("view matrix read failed, skipping frame: {e}");
                self.stats.skipped += 1;
            }
        }

        self.pacer.wait();
        true
    }

    fn draw_frame(&mut self, matrix: &ViewMatrix) {
        let ctx = FrameContext {
            matrix,
            viewport: self.viewport(),
            local: &self.local,
            layout: &self.layout,
        };
        let boxes = build_snapshot(&self.process, &self.globals.entity_list, &ctx);

        for b in &boxes {
            self.renderer.draw_box(b.x, b.y, b.width, b.height, b.band);
            self.renderer.draw_health_bar(b.x, b.y, b.width, b.health);
        }
        self.renderer.present();

        self.stats.frames += 1;
        self.stats.boxes += boxes.len() as u64;
        if self.stats.frames % STATS_EVERY_FRAMES == 0 {
            debug!(stats = ?self.stats, "overlay running");
        }
    }

    /// Loop until the target window disappears.
    pub fn run(&mut self) -> FrameStats {
        info!(fps_cap = ?self.pacer.period(), "overlay started");
        while self.tick() {}
        info!(
            frames = self.stats.frames,
            skipped = self.stats.skipped,
            boxes = self.stats.boxes,
            "target window closed"
        );
        self.stats
    }
}

/// Cover the configured window with a GDI overlay and run until it closes.
#[cfg(windows)]
pub fn run_gdi<P: Process>(process: P, config: &Config) -> eyre::Result<FrameStats> {
    use crate::render::gdi::GdiOverlay;

    let renderer = GdiOverlay::attach(&config.overlay.window_title, &config.overlay.window_class)?;
    let mut overlay = Overlay::from_config(process, renderer, config)?;
    Ok(overlay.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{entry_offset, HealthBand};
    use crate::math::Vec3;
    use crate::memory::SparseMemory;
    use crate::render::{DrawCommand, RecordingRenderer, WindowRect};

    const CLIENT: u64 = 0x7000_0000;
    const ENGINE: u64 = 0x8000_0000;
    const CHUNK: u64 = 0x2000_0000;
    const CONTROLLER: u64 = 0x6000_0000;
    const FAST: u32 = 1000;

    const OFFSETS: GlobalOffsets = GlobalOffsets {
        entity_list: 0x100,
        view_matrix: 0x200,
        local_player_controller: 0x300,
        window_height: 0x10,
        window_width: 0x14,
    };

    /// clip = (x, z, 0, y): camera at the origin looking down +y.
    const CAMERA: ViewMatrix = ViewMatrix([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0,
    ]);

    const RECT: WindowRect = WindowRect { x: 0, y: 0, width: 1280, height: 720 };

    fn process() -> SparseMemory {
        let layout = EntityLayout::default();
        let mut mem = SparseMemory::new()
            .with_module(CLIENT_MODULE, CLIENT)
            .with_module(ENGINE_MODULE, ENGINE);

        mem.write(ENGINE + OFFSETS.window_height, 1080u32);
        mem.write(ENGINE + OFFSETS.window_width, 1920u32);
        mem.write(CLIENT + OFFSETS.view_matrix, CAMERA);

        mem.write(CLIENT + OFFSETS.local_player_controller, CONTROLLER);
        mem.put(CONTROLLER, layout.team(), 2);
        mem.put(CONTROLLER, layout.pawn_handle(), 0x4000_0000u64);

        mem.write(CLIENT + OFFSETS.entity_list, CHUNK);
        let players = [
            (3, 0x3000_0000u64, 90, 3),
            (8, 0x3100_0000, 30, 3),
            (9, 0x3200_0000, 90, 2), // teammate
            (10, 0x4000_0000, 90, 3), // ourselves
        ];
        for (slot, addr, health, team) in players {
            mem.write(CHUNK + entry_offset(slot), addr);
            mem.put(addr, layout.health(), health);
            mem.put(addr, layout.team(), team);
            mem.put(addr, layout.dormant(), false);
            mem.put(addr, layout.position(), Vec3::new(0.0, 400.0, -100.0));
        }
        mem
    }

    fn overlay(mem: SparseMemory, frames: usize) -> Overlay<SparseMemory, RecordingRenderer> {
        let renderer = RecordingRenderer::new(frames, RECT);
        Overlay::attach(mem, renderer, &OFFSETS, EntityLayout::default(), FAST).unwrap()
    }

    #[test]
    fn draws_box_and_bar_per_opponent() {
        let mut o = overlay(process(), 3);
        let stats = o.run();

        assert_eq!(stats, FrameStats { frames: 3, skipped: 0, boxes: 6 });
        assert_eq!(o.local_player(), LocalPlayer { team: 2, pawn: 0x4000_0000 });

        let frame = &o.renderer().presented[0];
        assert_eq!(frame.len(), 4);
        assert!(matches!(frame[0], DrawCommand::Box { band: HealthBand::High, .. }));
        assert!(matches!(frame[1], DrawCommand::HealthBar { health: 90, .. }));
        assert!(matches!(frame[2], DrawCommand::Box { band: HealthBand::Low, .. }));
        assert!(matches!(frame[3], DrawCommand::HealthBar { health: 30, .. }));
    }

    #[test]
    fn stops_when_window_closes() {
        let mut o = overlay(process(), 0);
        assert!(!o.tick());
        assert_eq!(o.run(), FrameStats::default());
    }

    #[test]
    fn unreadable_view_matrix_skips_only_that_frame() {
        let mut mem = process();
        mem.unmap(CLIENT + OFFSETS.view_matrix, 64);
        let mut o = overlay(mem, 2);

        assert!(o.tick());
        assert!(o.tick());
        assert!(!o.tick());
        assert_eq!(o.stats(), FrameStats { frames: 0, skipped: 2, boxes: 0 });
        assert!(o.renderer().presented.is_empty());
    }

    #[test]
    fn viewport_falls_back_to_window_rect() {
        let mut mem = process();
        mem.unmap(ENGINE + OFFSETS.window_width, 4);
        let mut o = overlay(mem, 1);
        o.run();

        // Entity sits on the optical axis: box centered horizontally.
        let DrawCommand::Box { x, w, .. } = o.renderer().presented[0][0] else {
            panic!("expected a box first");
        };
        assert!((x + w / 2.0 - 640.0).abs() < 1e-3);
    }

    #[test]
    fn missing_module_is_fatal() {
        let mem = SparseMemory::new().with_module(CLIENT_MODULE, CLIENT);
        let renderer = RecordingRenderer::new(1, RECT);
        let err = Overlay::attach(mem, renderer, &OFFSETS, EntityLayout::default(), FAST)
            .err()
            .unwrap();
        assert!(matches!(err, OverlayError::ModuleNotFound(m) if m == ENGINE_MODULE));
    }

    #[test]
    fn overflowing_offset_is_fatal() {
        let offsets = GlobalOffsets { view_matrix: u64::MAX, ..OFFSETS };
        let renderer = RecordingRenderer::new(1, RECT);
        let err = Overlay::attach(process(), renderer, &offsets, EntityLayout::default(), FAST)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            OverlayError::AddressOverflow { ref module, base: CLIENT, offset: u64::MAX } if module == CLIENT_MODULE
        ));
    }

    #[test]
    fn unreadable_local_player_is_not_fatal() {
        let mut mem = process();
        mem.write(CLIENT + OFFSETS.local_player_controller, 0u64);
        let mut o = overlay(mem, 1);
        assert_eq!(o.local_player(), LocalPlayer::default());

        // Without self-exclusion our own pawn shows up; the teammate on team 2 does too.
        let stats = o.run();
        assert_eq!(stats.boxes, 4);
    }

    #[test]
    fn loop_is_capped_at_target_rate() {
        let renderer = RecordingRenderer::new(3, RECT);
        let mut o = Overlay::attach(process(), renderer, &OFFSETS, EntityLayout::default(), 60).unwrap();

        let start = Instant::now();
        o.run();
        // Three frames at 60 Hz span at least two full periods.
        assert!(start.elapsed() >= Duration::from_millis(33));
    }

    #[test]
    fn pacer_period_from_fps() {
        assert_eq!(FramePacer::new(50).period(), Duration::from_millis(20));
        assert_eq!(FramePacer::new(0).period(), Duration::from_secs(1));
    }

    #[test]
    fn from_config_reads_offsets_file() {
        let dir = std::env::temp_dir().join(format!("esp_overlay-{}-driver", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("offsets.json"),
            r#"{
                "client.dll": {"dwEntityList": 256, "dwViewMatrix": 512, "dwLocalPlayerController": 768},
                "engine2.dll": {"dwWindowHeight": 16, "dwWindowWidth": 20}
            }"#,
        )
        .unwrap();
        let config = Config::load(dir.join("config.toml")).unwrap();

        let mut o = Overlay::from_config(process(), RecordingRenderer::new(1, RECT), &config).unwrap();
        assert_eq!(o.run().boxes, 2);

        let _ = std::fs::remove_file(dir.join("config.toml"));
        std::fs::remove_file(dir.join("offsets.json")).unwrap();
        let err = Overlay::from_config(process(), RecordingRenderer::new(1, RECT), &config).err();
        assert!(matches!(err, Some(OverlayError::Offsets(_))));
    }
}
