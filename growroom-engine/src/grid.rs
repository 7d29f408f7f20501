//! Grid model: tables, lights and the canonical slot sequence.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_LIGHTS_PER_TABLE, DEFAULT_PLANTS_PER_LIGHT, DEFAULT_TABLE_COUNT, SLOT_KEY_SEPARATOR,
};
use crate::error::{EngineError, EngineResult, RoomConfigError};

/// Address of one light on one table, the atomic unit of allocation.
///
/// Ordering is `(table, light)` ascending, which is the canonical slot
/// sequence, so a `BTreeMap<SlotKey, _>` iterates slots in allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub table: u32,
    pub light: u32,
}

impl SlotKey {
    #[must_use]
    pub const fn new(table: u32, light: u32) -> Self {
        Self { table, light }
    }
}

/// Canonical key for a `(table, light)` pair.
#[must_use]
pub const fn slot_key(table: u32, light: u32) -> SlotKey {
    SlotKey::new(table, light)
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SLOT_KEY_SEPARATOR}{}", self.table, self.light)
    }
}

/// Error for slot keys that are not `"{table}-{light}"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed slot key `{0}`")]
pub struct SlotKeyParseError(pub String);

impl FromStr for SlotKey {
    type Err = SlotKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SlotKeyParseError(s.to_string());
        let (table, light) = s.split_once(SLOT_KEY_SEPARATOR).ok_or_else(malformed)?;
        Ok(Self {
            table: table.parse().map_err(|_| malformed())?,
            light: light.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Light counts as persisted: either one count shared by every table or one
/// entry per table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LightsSpec {
    Uniform(u32),
    PerTable(Vec<u32>),
}

impl Default for LightsSpec {
    fn default() -> Self {
        Self::Uniform(DEFAULT_LIGHTS_PER_TABLE)
    }
}

/// Persisted shape of a room configuration, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfigRecord {
    #[serde(default = "default_table_count", alias = "tables")]
    pub table_count: u32,
    #[serde(default)]
    pub lights_per_table: LightsSpec,
    #[serde(default = "default_plants_per_light")]
    pub plants_per_light: u32,
}

const fn default_table_count() -> u32 {
    DEFAULT_TABLE_COUNT
}

const fn default_plants_per_light() -> u32 {
    DEFAULT_PLANTS_PER_LIGHT
}

/// Normalized room configuration.
///
/// Light counts are always held per table; a uniform count is broadcast once
/// when the configuration is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RoomConfigRecord", into = "RoomConfigRecord")]
pub struct RoomConfig {
    lights_per_table: Vec<u32>,
    plants_per_light: u32,
}

impl RoomConfig {
    /// Build a configuration where every table carries the same light count.
    ///
    /// # Errors
    ///
    /// Returns an error if any count is zero.
    pub fn uniform(
        table_count: u32,
        lights_per_table: u32,
        plants_per_light: u32,
    ) -> Result<Self, RoomConfigError> {
        Self::try_from(RoomConfigRecord {
            table_count,
            lights_per_table: LightsSpec::Uniform(lights_per_table),
            plants_per_light,
        })
    }

    /// Build a configuration from explicit per-table light counts.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no tables or any count is zero.
    pub fn per_table(lights: Vec<u32>, plants_per_light: u32) -> Result<Self, RoomConfigError> {
        let table_count = u32::try_from(lights.len()).unwrap_or(u32::MAX);
        Self::try_from(RoomConfigRecord {
            table_count,
            lights_per_table: LightsSpec::PerTable(lights),
            plants_per_light,
        })
    }

    /// Check every `>= 1` invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), RoomConfigError> {
        if self.lights_per_table.is_empty() {
            return Err(RoomConfigError::Zero { field: "tableCount" });
        }
        if self.plants_per_light == 0 {
            return Err(RoomConfigError::Zero {
                field: "plantsPerLight",
            });
        }
        if let Some(table) = self.lights_per_table.iter().position(|&n| n == 0) {
            return Err(RoomConfigError::ZeroLights { table });
        }
        Ok(())
    }

    #[must_use]
    pub fn table_count(&self) -> u32 {
        u32::try_from(self.lights_per_table.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub const fn plants_per_light(&self) -> u32 {
        self.plants_per_light
    }

    #[must_use]
    pub fn lights_per_table(&self) -> &[u32] {
        &self.lights_per_table
    }

    /// Cells in one row group: `ceil(plantsPerLight / 2)`.
    #[must_use]
    pub const fn per_group(&self) -> u32 {
        self.plants_per_light.div_ceil(2)
    }

    /// Light count for a table.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidAddress`] when `table` is outside
    /// `0..tableCount`.
    pub fn resolve_light_count(&self, table: u32) -> EngineResult<u32> {
        usize::try_from(table)
            .ok()
            .and_then(|idx| self.lights_per_table.get(idx).copied())
            .ok_or_else(|| EngineError::table(table))
    }

    /// Confirm a slot address lies inside the grid.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidAddress`] for either index out of range.
    pub fn check_slot(&self, table: u32, light: u32) -> EngineResult<SlotKey> {
        let lights = self.resolve_light_count(table)?;
        if light >= lights {
            return Err(EngineError::slot(table, light));
        }
        Ok(slot_key(table, light))
    }

    #[must_use]
    pub fn contains(&self, key: SlotKey) -> bool {
        self.check_slot(key.table, key.light).is_ok()
    }

    /// Every slot in ascending `(table, light)` order.
    ///
    /// The iterator is lazy and cheap to clone; cloning it or calling this
    /// again restarts the sequence.
    #[must_use]
    pub fn all_slots(&self) -> Slots<'_> {
        Slots {
            lights: &self.lights_per_table,
            table: 0,
            light: 0,
        }
    }

    #[must_use]
    pub fn total_slots(&self) -> usize {
        self.lights_per_table
            .iter()
            .map(|&n| usize::try_from(n).unwrap_or(usize::MAX))
            .sum()
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        let table_count = usize::try_from(DEFAULT_TABLE_COUNT).unwrap_or(1);
        Self {
            lights_per_table: vec![DEFAULT_LIGHTS_PER_TABLE; table_count],
            plants_per_light: DEFAULT_PLANTS_PER_LIGHT,
        }
    }
}

impl TryFrom<RoomConfigRecord> for RoomConfig {
    type Error = RoomConfigError;

    fn try_from(record: RoomConfigRecord) -> Result<Self, Self::Error> {
        if record.table_count == 0 {
            return Err(RoomConfigError::Zero { field: "tableCount" });
        }
        let lights_per_table = match record.lights_per_table {
            LightsSpec::Uniform(count) => {
                let tables = usize::try_from(record.table_count).unwrap_or(usize::MAX);
                vec![count; tables]
            }
            LightsSpec::PerTable(lights) => {
                if u32::try_from(lights.len()).ok() != Some(record.table_count) {
                    return Err(RoomConfigError::LightsLength {
                        expected: record.table_count,
                        got: lights.len(),
                    });
                }
                lights
            }
        };
        let config = Self {
            lights_per_table,
            plants_per_light: record.plants_per_light,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<RoomConfig> for RoomConfigRecord {
    fn from(config: RoomConfig) -> Self {
        Self {
            table_count: config.table_count(),
            lights_per_table: LightsSpec::PerTable(config.lights_per_table),
            plants_per_light: config.plants_per_light,
        }
    }
}

/// Lazy walk over the canonical slot sequence.
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    lights: &'a [u32],
    table: usize,
    light: u32,
}

impl Iterator for Slots<'_> {
    type Item = SlotKey;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let count = *self.lights.get(self.table)?;
            if self.light < count {
                let key = slot_key(u32::try_from(self.table).ok()?, self.light);
                self.light += 1;
                return Some(key);
            }
            self.table += 1;
            self.light = 0;
        }
    }
}
