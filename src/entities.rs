// entities.rs — Entity-list walking and the per-slot filter pipeline.
//
// Every frame the 64 candidate slots of the engine's entity list are read
// fresh. Each slot runs through a fixed sequence of checks, cheapest first,
// and either becomes a `DrawableBox` or is rejected with a reason. Nothing is
// kept across frames.
//
// Entity list layout (fixed by the engine):
//
//   list + (slot / 512) * 8        -> chunk pointer
//   chunk + (slot % 512) * 0x20    -> entity pointer

use tracing::trace;

use crate::error::ReadError;
use crate::math::{project, Vec3, ViewMatrix, ViewportSize};
use crate::memory::{Field, Remote};
use crate::offsets::EntityLayout;

// ============================================================
// Entity List Layout
// ============================================================

/// Candidate slots walked per frame.
pub const MAX_ENTITIES: u32 = 64;
/// Entity pointers per chunk.
pub const CHUNK_SIZE: u32 = 512;
/// Distance between consecutive entries inside a chunk.
pub const ENTRY_STRIDE: u64 = 0x20;
/// Width of a remote pointer.
pub const POINTER_WIDTH: u64 = 8;

/// Team id of entities that are not on any team.
pub const NEUTRAL_TEAM: i32 = 0;
pub const MAX_HEALTH: i32 = 100;
/// Box height divided by box width.
pub const BOX_ASPECT: f32 = 2.5;

/// Pawn identities are compared on the low 32 bits of the handle.
const PAWN_HANDLE_MASK: u64 = 0xFFFF_FFFF;

/// Address of the chunk pointer for `slot`, relative to the list.
pub const fn chunk_offset(slot: u32) -> u64 {
    (slot / CHUNK_SIZE) as u64 * POINTER_WIDTH
}

/// Offset of `slot`'s entry inside its chunk.
pub const fn entry_offset(slot: u32) -> u64 {
    (slot % CHUNK_SIZE) as u64 * ENTRY_STRIDE
}

/// The engine's entity list at an absolute address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityList {
    pub address: u64,
}

impl EntityList {
    pub const fn new(address: u64) -> Self {
        Self { address }
    }

    /// Resolve the entity pointer stored in `slot`. Self-exclusion happens
    /// later, in [`EntityRecord::read`].
    pub fn entity<R: Remote + ?Sized>(&self, mem: &R, slot: u32) -> Result<u64, Rejection> {
        let chunk = mem
            .get_ptr(self.address, Field::at(chunk_offset(slot)))?
            .ok_or(Rejection::NullChunk)?;
        let entity = mem
            .get_ptr(chunk, Field::at(entry_offset(slot)))?
            .ok_or(Rejection::NullEntity)?;
        Ok(entity)
    }

    /// Lazily walk all candidate slots.
    pub fn entities<'a, R: Remote + ?Sized>(
        &'a self,
        mem: &'a R,
    ) -> impl Iterator<Item = (u32, Result<u64, Rejection>)> + 'a {
        (0..MAX_ENTITIES).map(move |slot| (slot, self.entity(mem, slot)))
    }
}

// ============================================================
// Local Player
// ============================================================

/// The player running the overlay. Read once at start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalPlayer {
    pub team: i32,
    /// Opaque identity matched against entity pointers for self-exclusion.
    pub pawn: u64,
}

impl LocalPlayer {
    /// Read through the controller pointer stored at `controller_global`.
    pub fn read<R: Remote + ?Sized>(
        mem: &R,
        controller_global: u64,
        layout: &EntityLayout,
    ) -> Result<Self, ReadError> {
        let controller = mem.read_value::<u64>(controller_global)?;
        if controller == 0 {
            return Err(ReadError::Null { address: controller_global });
        }

        let team = mem.get(controller, layout.team())?;
        let pawn = mem.get(controller, layout.pawn_handle())? & PAWN_HANDLE_MASK;
        Ok(Self { team, pawn })
    }
}

// ============================================================
// Records & Boxes
// ============================================================

/// Why a slot produced no box this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NullChunk,
    NullEntity,
    LocalPlayer,
    Health(i32),
    Dormant,
    Team(i32),
    BehindCamera,
    Inverted,
    Read(ReadError),
}

impl From<ReadError> for Rejection {
    fn from(e: ReadError) -> Self {
        Rejection::Read(e)
    }
}

/// Coarse health bucket; the renderer picks the actual color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthBand {
    /// health > 75
    High,
    /// 40 < health <= 75
    Medium,
    /// health <= 40
    Low,
}

impl HealthBand {
    pub fn from_health(health: i32) -> Self {
        match health {
            h if h > 75 => HealthBand::High,
            h if h > 40 => HealthBand::Medium,
            _ => HealthBand::Low,
        }
    }
}

/// One opponent as read this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityRecord {
    pub identity: u64,
    pub health: i32,
    pub team: i32,
    pub dormant: bool,
    pub feet: Vec3,
    pub head: Vec3,
}

impl EntityRecord {
    /// Read and validate the entity at `identity`, cheapest checks first.
    pub fn read<R: Remote + ?Sized>(
        mem: &R,
        identity: u64,
        local: &LocalPlayer,
        layout: &EntityLayout,
    ) -> Result<Self, Rejection> {
        if identity == local.pawn {
            return Err(Rejection::LocalPlayer);
        }

        let health = mem.get(identity, layout.health())?;
        if health <= 0 || health > MAX_HEALTH {
            return Err(Rejection::Health(health));
        }

        // An unreadable dormancy flag must not hide a live target.
        let dormant = mem.get(identity, layout.dormant()).unwrap_or(false);
        if dormant {
            return Err(Rejection::Dormant);
        }

        let team = mem.get(identity, layout.team())?;
        if team == local.team || team == NEUTRAL_TEAM {
            return Err(Rejection::Team(team));
        }

        let feet = mem.get(identity, layout.position())?;
        Ok(Self {
            identity,
            health,
            team,
            dormant,
            feet,
            head: feet.raised(layout.head_height),
        })
    }
}

/// Screen-space box for one opponent, valid for the current frame only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawableBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub band: HealthBand,
    pub health: i32,
}

impl DrawableBox {
    /// Project a record and derive its box.
    pub fn from_record(
        record: &EntityRecord,
        matrix: &ViewMatrix,
        viewport: ViewportSize,
    ) -> Result<Self, Rejection> {
        let feet = project(matrix, record.feet, viewport).ok_or(Rejection::BehindCamera)?;
        let head = project(matrix, record.head, viewport).ok_or(Rejection::BehindCamera)?;

        // Screen y grows downward, so an upright entity has feet below head.
        let height = feet.y - head.y;
        if height.is_nan() || height < 0.0 {
            return Err(Rejection::Inverted);
        }
        let width = height / BOX_ASPECT;

        Ok(Self {
            x: head.x - width / 2.0,
            y: head.y,
            width,
            height,
            band: HealthBand::from_health(record.health),
            health: record.health,
        })
    }
}

// ============================================================
// Snapshot
// ============================================================

/// Everything the pipeline needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub matrix: &'a ViewMatrix,
    pub viewport: ViewportSize,
    pub local: &'a LocalPlayer,
    pub layout: &'a EntityLayout,
}

/// Run one slot through the whole pipeline.
pub fn evaluate_slot<R: Remote + ?Sized>(
    mem: &R,
    list: &EntityList,
    slot: u32,
    ctx: &FrameContext<'_>,
) -> Result<DrawableBox, Rejection> {
    let identity = list.entity(mem, slot)?;
    evaluate_entity(mem, identity, ctx)
}

/// Run a resolved entity pointer through the record and box stages.
pub fn evaluate_entity<R: Remote + ?Sized>(
    mem: &R,
    identity: u64,
    ctx: &FrameContext<'_>,
) -> Result<DrawableBox, Rejection> {
    let record = EntityRecord::read(mem, identity, ctx.local, ctx.layout)?;
    DrawableBox::from_record(&record, ctx.matrix, ctx.viewport)
}

/// Build this frame's boxes. A failing slot never affects the others.
pub fn build_snapshot<R: Remote + ?Sized>(
    mem: &R,
    list: &EntityList,
    ctx: &FrameContext<'_>,
) -> Vec<DrawableBox> {
    list.entities(mem)
        .filter_map(|(slot, entity)| match entity.and_then(|id| evaluate_entity(mem, id, ctx)) {
            Ok(b) => Some(b),
            Err(reason) => {
                trace!(slot, ?reason, "slot skipped");
                None
            }
        })
        .collect()
}
