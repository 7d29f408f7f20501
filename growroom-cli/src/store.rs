//! JSON-file room store: every room in one document, rewritten whole on save.
use growroom_engine::{Room, RoomStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("encoding rooms: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    #[serde(default)]
    rooms: BTreeMap<String, Room>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_active_room: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileRoomStore {
    path: PathBuf,
}

impl FileRoomStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreDocument, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoreDocument::default()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if text.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(doc)?;
        // Replaced via rename; readers never see a partial document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

impl RoomStore for FileRoomStore {
    type Error = StoreError;

    fn load_room(&self, name: &str) -> Result<Option<Room>, Self::Error> {
        Ok(self.read()?.rooms.remove(name))
    }

    fn save_room(&self, name: &str, room: &Room) -> Result<(), Self::Error> {
        let mut doc = self.read()?;
        doc.rooms.insert(name.to_string(), room.clone());
        doc.last_active_room = Some(name.to_string());
        self.write(&doc)
    }

    fn list_rooms(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.read()?.rooms.into_keys().collect())
    }

    fn delete_room(&self, name: &str) -> Result<Option<String>, Self::Error> {
        let mut doc = self.read()?;
        doc.rooms.remove(name);
        let next = doc.rooms.keys().next().cloned();
        if doc.last_active_room.as_deref() == Some(name) {
            doc.last_active_room.clone_from(&next);
        }
        self.write(&doc)?;
        Ok(next)
    }

    fn last_active_room(&self) -> Result<Option<String>, Self::Error> {
        Ok(self.read()?.last_active_room)
    }
}
