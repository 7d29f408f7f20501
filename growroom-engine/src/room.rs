//! Room snapshot: configuration plus every slot assignment.
//!
//! The snapshot is the single source of truth. The identifier index and the
//! usage summaries are views rebuilt from it on demand.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::grid::{RoomConfig, SlotKey};

/// One cell of a slot's chunk: a single strain, or a pair of strains sharing
/// the cell (used for split coloring).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkCell {
    Single(String),
    Pair([String; 2]),
}

impl ChunkCell {
    /// Strain the cell is attributed to for counting. For a pair this is the
    /// first strain; the second only affects coloring.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        let name = match self {
            Self::Single(name) => name,
            Self::Pair([first, _]) => first,
        };
        (!name.is_empty()).then_some(name.as_str())
    }
}

/// Everything stored for one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunk: Vec<Option<ChunkCell>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plant_ids: Vec<String>,
}

impl SlotAssignment {
    /// A slot given wholly to one strain by the allocator.
    #[must_use]
    pub fn allocated(strain: &str, plants_per_light: u32) -> Self {
        let cells = usize::try_from(plants_per_light).unwrap_or_default();
        Self {
            strain_name: Some(strain.to_string()),
            chunk: vec![Some(ChunkCell::Single(strain.to_string())); cells],
            plant_ids: vec![String::new(); cells],
        }
    }

    /// Non-empty identifiers with their positions.
    pub fn identifiers(&self) -> impl Iterator<Item = (usize, &str)> {
        self.plant_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !id.is_empty())
            .map(|(pos, id)| (pos, id.as_str()))
    }

    #[must_use]
    pub fn has_identifiers(&self) -> bool {
        self.identifiers().next().is_some()
    }

    /// Primary strain per chunk cell, skipping empty cells.
    pub fn chunk_strains(&self) -> impl Iterator<Item = &str> {
        self.chunk.iter().filter_map(|cell| cell.as_ref()?.primary())
    }
}

/// Where a plant identifier currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantLocation {
    pub slot: SlotKey,
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strain: Option<String>,
}

/// A grow room as persisted and as operated on by the engine.
///
/// Slot assignments are read-only from outside the crate; allocation and
/// identity commits are the only ways to change them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(default)]
    config: RoomConfig,
    #[serde(default)]
    strain_input: String,
    #[serde(default, rename = "strainAssignments")]
    slots: BTreeMap<SlotKey, SlotAssignment>,
}

impl Room {
    #[must_use]
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            strain_input: String::new(),
            slots: BTreeMap::new(),
        }
    }

    /// Parse a persisted room snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the configuration is
    /// invalid.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub const fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Raw strain-quantity text from the last distribution.
    #[must_use]
    pub fn strain_input(&self) -> &str {
        &self.strain_input
    }

    #[must_use]
    pub const fn slots(&self) -> &BTreeMap<SlotKey, SlotAssignment> {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, key: SlotKey) -> Option<&SlotAssignment> {
        self.slots.get(&key)
    }

    /// Build the room-wide identifier index from the current assignments.
    #[must_use]
    pub fn identifier_index(&self) -> IdentifierIndex<'_> {
        IdentifierIndex::build(self)
    }

    /// Find the slot and position holding `id`.
    #[must_use]
    pub fn locate_plant(&self, id: &str) -> Option<PlantLocation> {
        let id = id.trim();
        self.slots.iter().find_map(|(key, slot)| {
            let (position, _) = slot.identifiers().find(|(_, existing)| *existing == id)?;
            Some(PlantLocation {
                slot: *key,
                position,
                strain: slot.strain_name.clone(),
            })
        })
    }

    /// Every non-empty identifier in canonical slot order.
    #[must_use]
    pub fn all_plant_ids(&self) -> Vec<(SlotKey, usize, &str)> {
        self.slots
            .iter()
            .flat_map(|(key, slot)| slot.identifiers().map(move |(pos, id)| (*key, pos, id)))
            .collect()
    }

    /// Slots currently holding at least one identifier.
    #[must_use]
    pub fn slots_with_identifiers(&self) -> Vec<SlotKey> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.has_identifiers())
            .map(|(key, _)| *key)
            .collect()
    }

    pub(crate) fn replace_slots(
        &mut self,
        slots: BTreeMap<SlotKey, SlotAssignment>,
        strain_input: &str,
    ) {
        self.slots = slots;
        self.strain_input = strain_input.to_string();
    }

    pub(crate) fn write_plant_ids(&mut self, key: SlotKey, plant_ids: Vec<String>) {
        self.slots.entry(key).or_default().plant_ids = plant_ids;
    }
}

/// Room-wide view of identifier → locations.
///
/// Never stored; rebuilt from a [`Room`] whenever it is needed so it cannot
/// drift from the assignments it describes.
#[derive(Debug, Clone, Default)]
pub struct IdentifierIndex<'a> {
    by_id: HashMap<&'a str, Vec<(SlotKey, usize)>>,
}

impl<'a> IdentifierIndex<'a> {
    #[must_use]
    pub fn build(room: &'a Room) -> Self {
        let mut by_id: HashMap<&'a str, Vec<(SlotKey, usize)>> = HashMap::new();
        for (key, slot) in &room.slots {
            for (pos, id) in slot.identifiers() {
                by_id.entry(id).or_default().push((*key, pos));
            }
        }
        Self { by_id }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// First location of `id` outside `slot`, if any.
    #[must_use]
    pub fn held_elsewhere(&self, id: &str, slot: SlotKey) -> Option<(SlotKey, usize)> {
        self.by_id
            .get(id)?
            .iter()
            .copied()
            .find(|(key, _)| *key != slot)
    }

    /// Positions of `id` inside `slot`.
    pub fn positions_in(&self, id: &str, slot: SlotKey) -> impl Iterator<Item = usize> + '_ {
        self.by_id
            .get(id)
            .into_iter()
            .flatten()
            .filter(move |(key, _)| *key == slot)
            .map(|(_, pos)| *pos)
    }

    /// Identifiers that appear in more than one slot.
    ///
    /// Always empty for a room built through commits; a hand-edited snapshot
    /// can still carry collisions.
    #[must_use]
    pub fn collisions(&self) -> Vec<&'a str> {
        let mut ids: Vec<&str> = self
            .by_id
            .iter()
            .filter(|(_, locations)| {
                locations
                    .iter()
                    .any(|(key, _)| *key != locations[0].0)
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
