//! Lookup of rooms by code.
//!
//! Rooms are created on first reference and live for the rest of the
//! process. There is no removal and no capacity bound.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::room::Room;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room for `code`, creating it if this is the first reference.
    ///
    /// Creation goes through the map's entry API, so concurrent callers with
    /// the same code all observe the single instance that was inserted.
    pub fn get_or_create(&self, code: &str) -> Arc<Room> {
        let (room, created) = match self.rooms.entry(code.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let room = Arc::new(Room::new(code));
                entry.insert(room.clone());
                (room, true)
            }
        };
        if created {
            log::info!("Creating new room: {}", code);
        }
        room
    }

    /// Create a room under `code` only if no room holds that code yet.
    pub fn try_create(&self, code: &str, host: &str) -> Option<Arc<Room>> {
        let room = match self.rooms.entry(code.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                let room = Arc::new(Room::with_host(code, host));
                entry.insert(room.clone());
                Some(room)
            }
        };
        if room.is_some() {
            log::info!("Created room {} for host {}", code, host);
        }
        room
    }

    /// Look up a room without creating it.
    pub fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
