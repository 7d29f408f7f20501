//! Plant identity assignment: staging identifiers for one slot, validating
//! them against the room, and committing them.
//!
//! [`commit`] is the only path that writes `plantIds`. It validates the staged
//! buffer against the room-wide identifier index and either writes every
//! staged cell or nothing.
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::constants::LOG_ASSIGN;
use crate::error::{EngineError, EngineResult, InvalidCell};
use crate::grid::{RoomConfig, SlotKey};
use crate::room::{ChunkCell, Room};

/// How much of a slot one edit covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Half a slot at a time, selected by [`RowGroup`].
    #[default]
    TwoRows,
    /// Every cell of the slot.
    FullSlot,
}

/// Which half of a slot a two-row edit targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowGroup {
    #[default]
    First,
    Second,
}

/// Range of slot positions an edit overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteWindow {
    pub offset: usize,
    pub count: usize,
}

impl WriteWindow {
    /// Window for a mode and row group on a given grid.
    ///
    /// For an odd `plantsPerLight` the second group's last cell lies past the
    /// slot end; see [`WriteWindow::capacity`].
    #[must_use]
    pub fn for_mode(config: &RoomConfig, mode: WriteMode, group: RowGroup) -> Self {
        let plants = usize::try_from(config.plants_per_light()).unwrap_or_default();
        let per_group = usize::try_from(config.per_group()).unwrap_or_default();
        match (mode, group) {
            (WriteMode::FullSlot, _) => Self {
                offset: 0,
                count: plants,
            },
            (WriteMode::TwoRows, RowGroup::First) => Self {
                offset: 0,
                count: per_group,
            },
            (WriteMode::TwoRows, RowGroup::Second) => Self {
                offset: per_group,
                count: per_group,
            },
        }
    }

    #[must_use]
    pub const fn contains(&self, position: usize) -> bool {
        position >= self.offset && position < self.offset + self.count
    }

    /// Cells of the window that land inside a slot of `plants_per_light`.
    #[must_use]
    pub fn capacity(&self, plants_per_light: usize) -> usize {
        plants_per_light.saturating_sub(self.offset).min(self.count)
    }
}

/// Validation verdict for one staged cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CellStatus {
    /// Nothing staged; an unfilled position.
    Empty,
    Valid,
    /// Same value staged earlier in this buffer at `first`.
    DuplicateInBuffer { first: usize },
    /// Value already held by another slot.
    UsedElsewhere { slot: SlotKey, position: usize },
    /// Value held by this slot at a position the edit will not overwrite.
    DuplicateInSlot { position: usize },
    /// Cell maps to `position`, past the end of the slot.
    PastSlotEnd { position: usize },
}

impl CellStatus {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Empty | Self::Valid)
    }
}

/// Per-cell verdicts for a staged buffer, in buffer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub cells: Vec<CellStatus>,
}

impl ValidationReport {
    /// True when every cell is valid and the buffer may be committed.
    #[must_use]
    pub fn is_committable(&self) -> bool {
        self.cells.iter().all(CellStatus::is_valid)
    }

    /// Valid/invalid flag per cell, for highlighting.
    #[must_use]
    pub fn flags(&self) -> Vec<bool> {
        self.cells.iter().map(CellStatus::is_valid).collect()
    }

    fn invalid_cells(&self, buffer: &[String]) -> Vec<InvalidCell> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, status)| !status.is_valid())
            .map(|(index, status)| InvalidCell {
                index,
                identifier: buffer.get(index).cloned().unwrap_or_default(),
                status: status.clone(),
            })
            .collect()
    }
}

/// Check a staged buffer destined for `window` of `target`.
///
/// A non-empty cell is invalid when it maps past the slot end, when the same
/// value was staged earlier in the buffer, when another slot holds it, or
/// when the target slot holds it at a position this write leaves untouched.
/// A position is only overwritten when its buffer cell is non-empty.
/// Re-entering a value at the position it already occupies is valid.
#[must_use]
pub fn validate(
    buffer: &[String],
    target: SlotKey,
    window: WriteWindow,
    room: &Room,
) -> ValidationReport {
    let index = room.identifier_index();
    let plants_per_light = usize::try_from(room.config().plants_per_light()).unwrap_or_default();
    let overwritten = |pos: usize| {
        window.contains(pos)
            && buffer
                .get(pos - window.offset)
                .is_some_and(|cell| !cell.trim().is_empty())
    };
    let cells = buffer
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let id = raw.trim();
            if id.is_empty() {
                return CellStatus::Empty;
            }
            let staged_at = window.offset + i;
            if staged_at >= plants_per_light {
                return CellStatus::PastSlotEnd {
                    position: staged_at,
                };
            }
            if let Some(first) = buffer[..i].iter().position(|prev| prev.trim() == id) {
                return CellStatus::DuplicateInBuffer { first };
            }
            if let Some((slot, position)) = index.held_elsewhere(id, target) {
                return CellStatus::UsedElsewhere { slot, position };
            }
            if let Some(position) = index
                .positions_in(id, target)
                .find(|&pos| pos != staged_at && !overwritten(pos))
            {
                return CellStatus::DuplicateInSlot { position };
            }
            CellStatus::Valid
        })
        .collect();
    ValidationReport { cells }
}

/// Batch text mapped onto a write buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLoad {
    /// Exactly `max_count` cells; trailing cells are empty when the batch was
    /// short.
    pub values: Vec<String>,
    pub loaded: usize,
    /// Lines beyond `max_count`, left out of `values`.
    pub dropped: usize,
}

impl BatchLoad {
    /// True when the batch had more lines than the buffer holds.
    #[must_use]
    pub const fn is_overrun(&self) -> bool {
        self.dropped > 0
    }
}

fn batch_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Split `text` into one identifier per non-blank line and take at most
/// `max_count` of them in file order.
#[must_use]
pub fn load_batch(text: &str, max_count: usize) -> BatchLoad {
    let lines: Vec<&str> = batch_lines(text).collect();
    let loaded = lines.len().min(max_count);
    let dropped = lines.len() - loaded;
    if dropped > 0 {
        warn!(
            target: LOG_ASSIGN,
            "batch holds {} identifiers; only the first {max_count} are used",
            lines.len()
        );
    }
    let mut values: Vec<String> = lines[..loaded].iter().map(|s| (*s).to_string()).collect();
    values.resize(max_count, String::new());
    BatchLoad {
        values,
        loaded,
        dropped,
    }
}

/// Identifiers loaded for a strain against its availability cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrainBatch {
    pub strain: String,
    pub ids: Vec<String>,
    pub dropped: usize,
}

/// Load a batch of identifiers reserved for `strain`, keeping at most
/// `available` of them.
#[must_use]
pub fn load_strain_batch(strain: &str, text: &str, available: usize) -> StrainBatch {
    let lines: Vec<&str> = batch_lines(text).collect();
    let kept = lines.len().min(available);
    let dropped = lines.len() - kept;
    if dropped > 0 {
        warn!(
            target: LOG_ASSIGN,
            "only the first {available} identifiers are used for {strain}"
        );
    }
    StrainBatch {
        strain: strain.to_string(),
        ids: lines[..kept].iter().map(|s| (*s).to_string()).collect(),
        dropped,
    }
}

/// Overlay `buffer` onto `existing` starting at `offset`.
///
/// Missing `existing` starts from all-empty. Empty buffer cells and cells
/// past the slot end leave the prior value in place.
#[must_use]
pub fn merge_plant_ids(
    existing: Option<&[String]>,
    plants_per_light: usize,
    buffer: &[String],
    offset: usize,
) -> Vec<String> {
    let mut merged = existing.map_or_else(|| vec![String::new(); plants_per_light], <[String]>::to_vec);
    if merged.len() < plants_per_light {
        merged.resize(plants_per_light, String::new());
    }
    for (i, raw) in buffer.iter().enumerate() {
        let id = raw.trim();
        if id.is_empty() {
            continue;
        }
        if let Some(cell) = merged.get_mut(offset + i) {
            *cell = id.to_string();
        }
    }
    merged
}

/// Summary of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub slot: SlotKey,
    pub written: usize,
    pub plant_ids: Vec<String>,
}

/// Validate `buffer` and write it into `window` of `target`.
///
/// All-or-nothing: when any cell is invalid the room is left untouched.
///
/// # Errors
///
/// Returns [`EngineError::InvalidAddress`] when `target` is outside the grid
/// and [`EngineError::Validation`] listing every invalid cell.
pub fn commit(
    room: &mut Room,
    target: SlotKey,
    buffer: &[String],
    window: WriteWindow,
) -> EngineResult<CommitOutcome> {
    let config = room.config();
    config.check_slot(target.table, target.light)?;
    if buffer.len() > window.count {
        return Err(EngineError::CellOutOfRange {
            index: window.count,
            len: window.count,
        });
    }

    let report = validate(buffer, target, window, room);
    if !report.is_committable() {
        let invalid = report.invalid_cells(buffer);
        debug!(
            target: LOG_ASSIGN,
            "commit to {target} refused: {} invalid cells",
            invalid.len()
        );
        return Err(EngineError::Validation { invalid });
    }

    let plants_per_light = usize::try_from(config.plants_per_light()).unwrap_or_default();
    let existing = room.slot(target).map(|slot| slot.plant_ids.as_slice());
    let plant_ids = merge_plant_ids(existing, plants_per_light, buffer, window.offset);
    let written = buffer.iter().filter(|id| !id.trim().is_empty()).count();
    room.write_plant_ids(target, plant_ids.clone());
    debug!(target: LOG_ASSIGN, "committed {written} identifiers to {target}");
    Ok(CommitOutcome {
        slot: target,
        written,
        plant_ids,
    })
}

/// Per-strain cell counts for each half of a slot's chunk, in
/// first-encountered order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowGuidance {
    pub first: Vec<(String, u32)>,
    pub second: Vec<(String, u32)>,
}

fn tally<'a>(strains: impl Iterator<Item = &'a str>) -> Vec<(String, u32)> {
    let mut counts: Vec<(String, u32)> = Vec::new();
    for strain in strains {
        match counts.iter_mut().find(|(name, _)| name == strain) {
            Some((_, count)) => *count += 1,
            None => counts.push((strain.to_string(), 1)),
        }
    }
    counts
}

fn primaries(cells: &[Option<ChunkCell>]) -> impl Iterator<Item = &str> {
    cells.iter().filter_map(|cell| cell.as_ref()?.primary())
}

/// Suggested strain mix for the two row groups of `target`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidAddress`] when `target` is outside the grid.
pub fn row_guidance(room: &Room, target: SlotKey) -> EngineResult<RowGuidance> {
    room.config().check_slot(target.table, target.light)?;
    let Some(slot) = room.slot(target) else {
        return Ok(RowGuidance::default());
    };
    let per_group = usize::try_from(room.config().per_group()).unwrap_or_default();
    let (first, second) = slot.chunk.split_at(per_group.min(slot.chunk.len()));
    Ok(RowGuidance {
        first: tally(primaries(first)),
        second: tally(primaries(second)),
    })
}

/// In-progress edit of one slot.
///
/// Holds exactly one pending buffer. Changing the target slot, mode or row
/// group discards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    config: RoomConfig,
    target: SlotKey,
    mode: WriteMode,
    group: RowGroup,
    buffer: Vec<String>,
}

impl EditSession {
    /// Open an edit on `(table, light)` of the room's grid.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidAddress`] for an address outside the grid.
    pub fn new(config: &RoomConfig, table: u32, light: u32, mode: WriteMode) -> EngineResult<Self> {
        let target = config.check_slot(table, light)?;
        let mut session = Self {
            config: config.clone(),
            target,
            mode,
            group: RowGroup::First,
            buffer: Vec::new(),
        };
        session.discard();
        Ok(session)
    }

    /// Grid the session was opened against.
    #[must_use]
    pub const fn config(&self) -> &RoomConfig {
        &self.config
    }

    #[must_use]
    pub const fn target(&self) -> SlotKey {
        self.target
    }

    #[must_use]
    pub const fn mode(&self) -> WriteMode {
        self.mode
    }

    #[must_use]
    pub const fn row_group(&self) -> RowGroup {
        self.group
    }

    #[must_use]
    pub fn window(&self) -> WriteWindow {
        WriteWindow::for_mode(&self.config, self.mode, self.group)
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.window().count
    }

    #[must_use]
    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }

    /// Staged cells that are not empty.
    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.buffer.iter().filter(|id| !id.trim().is_empty()).count()
    }

    /// Reset the pending buffer to all-empty.
    pub fn discard(&mut self) {
        self.buffer = vec![String::new(); self.write_count()];
    }

    /// Move the edit to another slot, discarding the pending buffer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidAddress`] and keeps the current target
    /// and buffer when the address is outside the grid.
    pub fn set_target(&mut self, table: u32, light: u32) -> EngineResult<()> {
        self.target = self.config.check_slot(table, light)?;
        self.discard();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: WriteMode) {
        self.mode = mode;
        self.discard();
    }

    pub fn set_row_group(&mut self, group: RowGroup) {
        self.group = group;
        self.discard();
    }

    /// Stage `identifier` at buffer position `index`. Not validated here.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CellOutOfRange`] when `index` is past the
    /// buffer.
    pub fn set_cell(&mut self, index: usize, identifier: &str) -> EngineResult<()> {
        let len = self.buffer.len();
        let cell = self
            .buffer
            .get_mut(index)
            .ok_or(EngineError::CellOutOfRange { index, len })?;
        *cell = identifier.trim().to_string();
        Ok(())
    }

    /// Cells of the buffer that land inside the slot.
    #[must_use]
    pub fn capacity(&self) -> usize {
        let plants_per_light = usize::try_from(self.config.plants_per_light()).unwrap_or_default();
        self.window().capacity(plants_per_light)
    }

    /// Replace the buffer with batch text, one identifier per line.
    ///
    /// Lines beyond the slot end are counted in `dropped`.
    pub fn load_batch(&mut self, text: &str) -> BatchLoad {
        let mut batch = load_batch(text, self.capacity());
        batch.values.resize(self.write_count(), String::new());
        self.buffer.clone_from(&batch.values);
        batch
    }

    #[must_use]
    pub fn validate(&self, room: &Room) -> ValidationReport {
        validate(&self.buffer, self.target, self.window(), room)
    }

    /// Commit the pending buffer into `room`.
    ///
    /// # Errors
    ///
    /// See [`commit`]; the room is unchanged on error.
    pub fn commit(&self, room: &mut Room) -> EngineResult<CommitOutcome> {
        commit(room, self.target, &self.buffer, self.window())
    }
}
