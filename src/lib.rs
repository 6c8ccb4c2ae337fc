// lib.rs — Screen-space overlay for a remote game process.
//
// The overlay reads the camera's view matrix and the entity list out of the
// target process, projects each opponent into screen space and draws a box
// and a health bar over a transparent window layered on the game.
//
// Memory acquisition is supplied by the caller through `memory::Process`.
// Drawing goes through `render::Renderer` (a GDI window on Windows).

// Internal modules
pub mod config;   // TOML config: logging, overlay window, entity layout
pub mod entities; // Entity-list walk and per-slot filter pipeline
pub mod error;    // Error types per layer
pub mod esp;      // Frame loop, pacing, start-up
pub mod logging;  // tracing subscriber setup
pub mod math;     // Vec3, view matrix, world-to-screen projection
pub mod memory;   // Typed remote reads, in-memory address space
pub mod offsets;  // Static offset table
pub mod render;   // Renderer trait, health-bar geometry, GDI backend

pub use entities::{build_snapshot, DrawableBox, EntityRecord, HealthBand};
pub use esp::{FrameStats, Overlay};
pub use math::{project, ScreenPoint, Vec3, ViewMatrix, ViewportSize};
pub use memory::{MemoryReader, Process, Remote};
