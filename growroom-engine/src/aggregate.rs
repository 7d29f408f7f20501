//! Usage aggregation: per-strain, per-table and per-light summaries derived
//! from a room's slot assignments.
//!
//! Everything here is a pure function of the [`Room`]. Summaries are rebuilt
//! on every request and never persisted.
use serde::Serialize;
use std::collections::BTreeSet;

use crate::grid::SlotKey;
use crate::room::{Room, SlotAssignment};

/// Cell counts per strain within one chunk, in first-encountered order.
#[must_use]
pub fn chunk_counts(slot: &SlotAssignment) -> Vec<(&str, u32)> {
    let mut counts: Vec<(&str, u32)> = Vec::new();
    for strain in slot.chunk_strains() {
        match counts.iter_mut().find(|(name, _)| *name == strain) {
            Some((_, count)) => *count += 1,
            None => counts.push((strain, 1)),
        }
    }
    counts
}

/// Strain with the strictly highest cell count in the slot's chunk.
///
/// Ties go to the strain encountered first in the chunk.
#[must_use]
pub fn slot_winner(slot: &SlotAssignment) -> Option<&str> {
    let mut best: Option<(&str, u32)> = None;
    for (strain, count) in chunk_counts(slot) {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((strain, count));
        }
    }
    best.map(|(strain, _)| strain)
}

/// A strain's footprint on one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUsage {
    pub table: u32,
    pub plants: u32,
    /// `ceil(plants / plantsPerLight)`.
    pub lights_estimate: u32,
}

/// Everything known about one strain across the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrainUsage {
    pub name: String,
    pub total_plants: u32,
    pub tables_spanned: BTreeSet<u32>,
    /// Slots this strain wins.
    pub lights_spanned: u32,
    /// Ascending by table.
    pub by_table: Vec<TableUsage>,
}

/// One light's attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightUsage {
    pub slot: SlotKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    pub plants: u32,
    pub assigned_ids: u32,
}

/// Totals for one table across all strains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableTotals {
    pub table: u32,
    pub plants: u32,
    pub assigned_ids: u32,
    /// Lights on the table with at least one chunk cell.
    pub lights_used: u32,
    pub lights_available: u32,
}

/// Full usage report for a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub plants_per_light: u32,
    /// In first-encountered order over the canonical slot sequence.
    pub strains: Vec<StrainUsage>,
    pub tables: Vec<TableTotals>,
    /// Only slots that carry a chunk or identifiers.
    pub lights: Vec<LightUsage>,
}

impl UsageSummary {
    #[must_use]
    pub fn total_plants(&self) -> u32 {
        self.strains.iter().map(|s| s.total_plants).sum()
    }

    #[must_use]
    pub fn strain(&self, name: &str) -> Option<&StrainUsage> {
        self.strains.iter().find(|s| s.name == name)
    }
}

fn u32_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn strain_entry<'a>(strains: &'a mut Vec<StrainUsage>, name: &str) -> &'a mut StrainUsage {
    let idx = match strains.iter().position(|s| s.name == name) {
        Some(idx) => idx,
        None => {
            strains.push(StrainUsage {
                name: name.to_string(),
                total_plants: 0,
                tables_spanned: BTreeSet::new(),
                lights_spanned: 0,
                by_table: Vec::new(),
            });
            strains.len() - 1
        }
    };
    &mut strains[idx]
}

/// Recompute every summary from the room's current assignments.
#[must_use]
pub fn summarize(room: &Room) -> UsageSummary {
    let config = room.config();
    let plants_per_light = config.plants_per_light();
    let mut strains: Vec<StrainUsage> = Vec::new();
    let mut lights = Vec::new();
    let mut tables: Vec<TableTotals> = config
        .lights_per_table()
        .iter()
        .zip(0_u32..)
        .map(|(&available, table)| TableTotals {
            table,
            plants: 0,
            assigned_ids: 0,
            lights_used: 0,
            lights_available: available,
        })
        .collect();

    for (key, slot) in room.slots() {
        let counts = chunk_counts(slot);
        let winner = slot_winner(slot);
        let plants: u32 = counts.iter().map(|(_, c)| c).sum();
        let assigned_ids = u32_count(slot.identifiers().count());

        for (strain, count) in &counts {
            let usage = strain_entry(&mut strains, strain);
            usage.total_plants += count;
            usage.tables_spanned.insert(key.table);
            match usage.by_table.iter_mut().find(|t| t.table == key.table) {
                Some(entry) => entry.plants += count,
                None => usage.by_table.push(TableUsage {
                    table: key.table,
                    plants: *count,
                    lights_estimate: 0,
                }),
            }
        }
        if let Some(name) = winner {
            strain_entry(&mut strains, name).lights_spanned += 1;
        }

        if let Some(totals) = tables.iter_mut().find(|t| t.table == key.table) {
            totals.plants += plants;
            totals.assigned_ids += assigned_ids;
            if plants > 0 {
                totals.lights_used += 1;
            }
        }

        if plants > 0 || assigned_ids > 0 {
            lights.push(LightUsage {
                slot: *key,
                winner: winner.map(str::to_string),
                plants,
                assigned_ids,
            });
        }
    }

    for usage in &mut strains {
        usage.by_table.sort_by_key(|t| t.table);
        for entry in &mut usage.by_table {
            entry.lights_estimate = entry.plants.div_ceil(plants_per_light);
        }
    }

    UsageSummary {
        plants_per_light,
        strains,
        tables,
        lights,
    }
}
