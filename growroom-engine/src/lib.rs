//! Grow Room Engine
//!
//! Storage- and UI-agnostic core for grow-room inventory: distributes strain
//! quantities across the table/light grid, assigns plant identifiers slot by
//! slot with room-wide uniqueness, and derives usage summaries.

pub mod aggregate;
pub mod allocator;
pub mod assignment;
pub mod constants;
pub mod error;
pub mod grid;
pub mod room;

use anyhow::{Context, bail};
use log::info;

// Re-export commonly used types
pub use aggregate::{
    LightUsage, StrainUsage, TableTotals, TableUsage, UsageSummary, chunk_counts, slot_winner,
    summarize,
};
pub use allocator::{
    Distribution, DistributionOutcome, DistributionPolicy, StrainRequest, StrainTotal, allocate,
    distribute, parse_strain_requests, reset,
};
pub use assignment::{
    BatchLoad, CellStatus, CommitOutcome, EditSession, RowGroup, RowGuidance, StrainBatch,
    ValidationReport, WriteMode, WriteWindow, commit, load_batch, load_strain_batch,
    merge_plant_ids, row_guidance, validate,
};
pub use error::{EngineError, EngineResult, InvalidCell, RoomConfigError};
pub use grid::{LightsSpec, RoomConfig, RoomConfigRecord, SlotKey, Slots, slot_key};
pub use room::{ChunkCell, IdentifierIndex, PlantLocation, Room, SlotAssignment};

use constants::LOG_ROOM;

/// Trait for abstracting room persistence.
/// Platform-specific implementations should provide this
pub trait RoomStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a room snapshot by name
    ///
    /// # Errors
    ///
    /// Returns an error if the room cannot be read.
    fn load_room(&self, name: &str) -> Result<Option<Room>, Self::Error>;

    /// Save a whole room snapshot and mark it as the last active room
    ///
    /// # Errors
    ///
    /// Returns an error if the room cannot be written.
    fn save_room(&self, name: &str, room: &Room) -> Result<(), Self::Error>;

    /// Names of every stored room
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_rooms(&self) -> Result<Vec<String>, Self::Error>;

    /// Delete a room, returning the room that should become active next
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_room(&self, name: &str) -> Result<Option<String>, Self::Error>;

    /// Name of the room that was saved most recently
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn last_active_room(&self) -> Result<Option<String>, Self::Error>;
}

/// Room operations wired to a store.
///
/// The engine holds no room state of its own: every call loads the snapshot,
/// runs a pure operation on it and saves the result whole.
pub struct RoomEngine<S>
where
    S: RoomStore,
{
    store: S,
}

impl<S> RoomEngine<S>
where
    S: RoomStore,
{
    /// Create a room engine backed by `store`
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Create an empty room
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or taken name, or if the store fails.
    pub fn create_room(&self, name: &str, config: RoomConfig) -> anyhow::Result<Room> {
        let name = name.trim();
        if name.is_empty() {
            bail!("room name required");
        }
        if self.store.load_room(name)?.is_some() {
            bail!("room `{name}` already exists");
        }
        config.validate()?;
        let room = Room::new(config);
        self.store.save_room(name, &room)?;
        info!(target: LOG_ROOM, "created room `{name}`");
        Ok(room)
    }

    /// Load a room snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn open_room(&self, name: &str) -> anyhow::Result<Option<Room>> {
        Ok(self.store.load_room(name)?)
    }

    /// Load the room named `name` or fail
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist or the store fails.
    pub fn require_room(&self, name: &str) -> anyhow::Result<Room> {
        self.open_room(name)?
            .with_context(|| format!("unknown room `{name}`"))
    }

    /// Distribute strain text over a room and save it
    ///
    /// # Errors
    ///
    /// Returns an error for a missing room, an [`EngineError`] from the
    /// allocator, or a store failure.
    pub fn distribute(
        &self,
        name: &str,
        strain_text: &str,
        policy: DistributionPolicy,
    ) -> anyhow::Result<DistributionOutcome> {
        let mut room = self.require_room(name)?;
        let outcome = distribute(&mut room, strain_text, policy)?;
        self.store.save_room(name, &room)?;
        Ok(outcome)
    }

    /// Clear a room's strain mapping and save it
    ///
    /// # Errors
    ///
    /// Returns an error for a missing room, a refused reset, or a store failure.
    pub fn reset_strains(&self, name: &str, policy: DistributionPolicy) -> anyhow::Result<usize> {
        let mut room = self.require_room(name)?;
        let discarded = reset(&mut room, policy)?;
        self.store.save_room(name, &room)?;
        Ok(discarded)
    }

    /// Commit an edit session into a room and save it
    ///
    /// # Errors
    ///
    /// Returns an error for a missing room, an [`EngineError::Validation`]
    /// refusal, or a store failure. Nothing is saved unless the commit
    /// succeeds.
    pub fn commit_edit(&self, name: &str, session: &EditSession) -> anyhow::Result<CommitOutcome> {
        let mut room = self.require_room(name)?;
        if room.config() != session.config() {
            bail!("edit session was opened against a different grid than room `{name}`");
        }
        let outcome = session.commit(&mut room)?;
        self.store.save_room(name, &room)?;
        Ok(outcome)
    }

    /// Recompute the usage summary of a room
    ///
    /// # Errors
    ///
    /// Returns an error for a missing room or a store failure.
    pub fn usage(&self, name: &str) -> anyhow::Result<UsageSummary> {
        Ok(summarize(&self.require_room(name)?))
    }

    /// Remove a room, returning the next room to activate
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn delete_room(&self, name: &str) -> anyhow::Result<Option<String>> {
        let next = self.store.delete_room(name)?;
        info!(target: LOG_ROOM, "deleted room `{name}`");
        Ok(next)
    }

    /// Every stored room name
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list_rooms(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.store.list_rooms()?)
    }

    /// The last active room if it still exists, else the first stored room
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn active_room(&self) -> anyhow::Result<Option<String>> {
        let rooms = self.store.list_rooms()?;
        if let Some(last) = self.store.last_active_room()?
            && rooms.contains(&last)
        {
            return Ok(Some(last));
        }
        Ok(rooms.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStore {
        rooms: Rc<RefCell<BTreeMap<String, Room>>>,
        last: Rc<RefCell<Option<String>>>,
    }

    impl RoomStore for MemoryStore {
        type Error = Infallible;

        fn load_room(&self, name: &str) -> Result<Option<Room>, Self::Error> {
            Ok(self.rooms.borrow().get(name).cloned())
        }

        fn save_room(&self, name: &str, room: &Room) -> Result<(), Self::Error> {
            self.rooms
                .borrow_mut()
                .insert(name.to_string(), room.clone());
            *self.last.borrow_mut() = Some(name.to_string());
            Ok(())
        }

        fn list_rooms(&self) -> Result<Vec<String>, Self::Error> {
            Ok(self.rooms.borrow().keys().cloned().collect())
        }

        fn delete_room(&self, name: &str) -> Result<Option<String>, Self::Error> {
            let mut rooms = self.rooms.borrow_mut();
            rooms.remove(name);
            Ok(rooms.keys().next().cloned())
        }

        fn last_active_room(&self) -> Result<Option<String>, Self::Error> {
            Ok(self.last.borrow().clone())
        }
    }

    #[test]
    fn engine_creates_distributes_and_commits() {
        let engine = RoomEngine::new(MemoryStore::default());
        let room = engine
            .create_room("Flower 1", RoomConfig::uniform(2, 2, 4).unwrap())
            .unwrap();
        assert!(engine.create_room("Flower 1", RoomConfig::default()).is_err());
        assert!(engine.create_room("  ", RoomConfig::default()).is_err());

        let outcome = engine
            .distribute("Flower 1", "OG: 6\nHaze: 4", DistributionPolicy::RefuseIfAssigned)
            .unwrap();
        assert_eq!(outcome.slots_used, 3);

        let mut session = EditSession::new(room.config(), 0, 1, WriteMode::FullSlot).unwrap();
        session.load_batch("P1\nP2\n");
        let committed = engine.commit_edit("Flower 1", &session).unwrap();
        assert_eq!(committed.written, 2);

        let saved = engine.require_room("Flower 1").unwrap();
        assert_eq!(saved.locate_plant("P2").unwrap().slot, slot_key(0, 1));
        assert_eq!(engine.usage("Flower 1").unwrap().total_plants(), 12);
        assert_eq!(engine.active_room().unwrap().as_deref(), Some("Flower 1"));
    }

    #[test]
    fn failed_commit_is_not_saved() {
        let engine = RoomEngine::new(MemoryStore::default());
        let room = engine
            .create_room("Veg", RoomConfig::uniform(1, 2, 2).unwrap())
            .unwrap();
        let mut first = EditSession::new(room.config(), 0, 0, WriteMode::FullSlot).unwrap();
        first.set_cell(0, "A").unwrap();
        engine.commit_edit("Veg", &first).unwrap();

        let mut second = EditSession::new(room.config(), 0, 1, WriteMode::FullSlot).unwrap();
        second.set_cell(0, "B").unwrap();
        second.set_cell(1, "A").unwrap();
        let err = engine.commit_edit("Veg", &second).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Validation { .. })
        ));
        let saved = engine.require_room("Veg").unwrap();
        assert!(saved.locate_plant("B").is_none());
    }

    #[test]
    fn session_from_another_grid_is_refused() {
        let engine = RoomEngine::new(MemoryStore::default());
        engine
            .create_room("Small", RoomConfig::uniform(1, 1, 2).unwrap())
            .unwrap();
        let other = RoomConfig::uniform(1, 1, 4).unwrap();
        let session = EditSession::new(&other, 0, 0, WriteMode::FullSlot).unwrap();
        assert!(engine.commit_edit("Small", &session).is_err());
    }

    #[test]
    fn delete_hands_back_next_room() {
        let engine = RoomEngine::new(MemoryStore::default());
        engine.create_room("A", RoomConfig::default()).unwrap();
        engine.create_room("B", RoomConfig::default()).unwrap();
        assert_eq!(engine.delete_room("A").unwrap().as_deref(), Some("B"));
        assert_eq!(engine.delete_room("B").unwrap(), None);
        assert!(engine.list_rooms().unwrap().is_empty());
        assert!(engine.usage("A").is_err());
        assert_eq!(engine.active_room().unwrap(), None);
    }
}
