// offsets.rs — Static offset table, loaded once at start-up.
//
// Two halves:
//   - `GlobalOffsets`  module-relative addresses of engine globals, parsed
//                      from a dumper-style JSON document
//   - `EntityLayout`   byte offsets inside one entity/controller struct,
//                      taken from the `[layout]` table of the config file

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OffsetsError;
use crate::math::Vec3;
use crate::memory::Field;

pub const CLIENT_MODULE: &str = "client.dll";
pub const ENGINE_MODULE: &str = "engine2.dll";

/// Module-relative offsets of engine globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalOffsets {
    pub entity_list: u64,
    pub view_matrix: u64,
    pub local_player_controller: u64,
    pub window_height: u64,
    pub window_width: u64,
}

type DumperDocument = HashMap<String, HashMap<String, u64>>;

impl GlobalOffsets {
    /// Parse `{"client.dll": {"dwEntityList": .., ..}, "engine2.dll": {..}}`.
    pub fn from_dumper_json(text: &str) -> Result<Self, OffsetsError> {
        let doc: DumperDocument = serde_json::from_str(text)?;

        let lookup = |module: &str, name: &str| -> Result<u64, OffsetsError> {
            doc.get(module)
                .and_then(|m| m.get(name))
                .copied()
                .ok_or_else(|| OffsetsError::Missing {
                    module: module.to_owned(),
                    name: name.to_owned(),
                })
        };

        Ok(Self {
            entity_list: lookup(CLIENT_MODULE, "dwEntityList")?,
            view_matrix: lookup(CLIENT_MODULE, "dwViewMatrix")?,
            local_player_controller: lookup(CLIENT_MODULE, "dwLocalPlayerController")?,
            window_height: lookup(ENGINE_MODULE, "dwWindowHeight")?,
            window_width: lookup(ENGINE_MODULE, "dwWindowWidth")?,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OffsetsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_dumper_json(&text)
    }
}

/// Field offsets inside entity and controller structs.
///
/// `position` has never been checked against a published layout; treat the
/// default as a placeholder and override it in the config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityLayout {
    pub health: u64,
    pub team: u64,
    pub dormant: u64,
    pub position: u64,
    pub pawn_handle: u64,
    /// World units added to the feet z to approximate the head.
    pub head_height: f32,
}

impl Default for EntityLayout {
    fn default() -> Self {
        Self {
            health: 0xD0,
            team: 0x3C,
            dormant: 0xEF,
            position: 0x308,
            pawn_handle: 0x60C,
            head_height: 64.0,
        }
    }
}

impl EntityLayout {
    pub fn health(&self) -> Field<i32> {
        Field::at(self.health)
    }

    pub fn team(&self) -> Field<i32> {
        Field::at(self.team)
    }

    pub fn dormant(&self) -> Field<bool> {
        Field::at(self.dormant)
    }

    pub fn position(&self) -> Field<Vec3> {
        Field::at(self.position)
    }

    pub fn pawn_handle(&self) -> Field<u64> {
        Field::at(self.pawn_handle)
    }
}
