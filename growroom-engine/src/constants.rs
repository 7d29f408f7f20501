//! Centralized defaults and format constants for the grow-room engine.
//!
//! Defaults mirror what a freshly created room starts with; format constants
//! define the text shapes the engine parses and emits.

// Room defaults ------------------------------------------------------------
pub const DEFAULT_TABLE_COUNT: u32 = 5;
pub const DEFAULT_LIGHTS_PER_TABLE: u32 = 1;
pub const DEFAULT_PLANTS_PER_LIGHT: u32 = 15;

// Text formats -------------------------------------------------------------
/// Separator between table and light index in a slot key (`"3-7"`).
pub const SLOT_KEY_SEPARATOR: char = '-';
/// Separator between strain name and count in strain-quantity input.
pub const STRAIN_COUNT_SEPARATOR: char = ':';

// Log targets --------------------------------------------------------------
pub(crate) const LOG_ALLOCATE: &str = "growroom::allocate";
pub(crate) const LOG_ASSIGN: &str = "growroom::assign";
pub(crate) const LOG_ROOM: &str = "growroom::room";
