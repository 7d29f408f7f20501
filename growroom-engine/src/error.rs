//! Error taxonomy shared by every engine operation.
use thiserror::Error;

use crate::assignment::CellStatus;
use crate::grid::SlotKey;

/// Errors raised when room configuration invariants are violated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoomConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
    #[error("lightsPerTable lists {got} tables but tableCount is {expected}")]
    LightsLength { expected: u32, got: usize },
    #[error("lightsPerTable entry for table {table} must be at least 1")]
    ZeroLights { table: usize },
}

/// A single staged cell that blocked a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCell {
    /// Position within the write buffer.
    pub index: usize,
    pub identifier: String,
    pub status: CellStatus,
}

/// Errors surfaced synchronously by engine operations.
///
/// Every failure is deterministic for the same inputs, so nothing here is
/// retried by the engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("line {line_number} `{line}`: {reason}")]
    Parse {
        line_number: usize,
        line: String,
        reason: &'static str,
    },
    #[error("{} is outside the configured grid", address_label(*table, *light))]
    InvalidAddress { table: u32, light: Option<u32> },
    #[error("write buffer cell {index} is outside 0..{len}")]
    CellOutOfRange { index: usize, len: usize },
    #[error("commit refused: {} invalid cell(s)", invalid.len())]
    Validation { invalid: Vec<InvalidCell> },
    #[error(
        "{identifiers} plant identifier(s) already assigned across {} slot(s); refusing to redistribute",
        slots.len()
    )]
    AssignedIdentifiers {
        slots: Vec<SlotKey>,
        identifiers: usize,
    },
    #[error("invalid room configuration: {0}")]
    InvalidConfig(#[from] RoomConfigError),
}

fn address_label(table: u32, light: Option<u32>) -> String {
    match light {
        Some(light) => format!("table {table}, light {light}"),
        None => format!("table {table}"),
    }
}

impl EngineError {
    pub(crate) fn table(table: u32) -> Self {
        Self::InvalidAddress { table, light: None }
    }

    pub(crate) fn slot(table: u32, light: u32) -> Self {
        Self::InvalidAddress {
            table,
            light: Some(light),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = EngineError::Parse {
            line_number: 3,
            line: "Blue Dream 40".to_string(),
            reason: "missing `:` separator",
        };
        assert_eq!(
            err.to_string(),
            "line 3 `Blue Dream 40`: missing `:` separator"
        );
        assert_eq!(
            EngineError::slot(2, 9).to_string(),
            "table 2, light 9 is outside the configured grid"
        );
        assert_eq!(
            EngineError::table(5).to_string(),
            "table 5 is outside the configured grid"
        );
        let cfg: EngineError = RoomConfigError::Zero {
            field: "plantsPerLight",
        }
        .into();
        assert!(cfg.to_string().contains("plantsPerLight must be at least 1"));
    }
}
