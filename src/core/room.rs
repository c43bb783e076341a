//! Room membership index
//!
//! Maps each room id to the set of clients currently in it. Rooms exist only
//! while they have at least one member.

use std::collections::{HashMap, HashSet};

use crate::core::client::ClientId;

#[derive(Debug, Default)]
pub struct RoomIndex {
    rooms: HashMap<String, HashSet<ClientId>>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client to a room, creating the room if needed.
    /// Returns false if the client was already a member.
    pub fn insert(&mut self, room_id: &str, client_id: ClientId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(members) => members.insert(client_id),
            None => {
                self.rooms
                    .insert(room_id.to_string(), HashSet::from([client_id]));
                true
            }
        }
    }

    /// Removes a client from a room, pruning the room once it is empty.
    /// Returns false if the client was not a member.
    pub fn remove(&mut self, room_id: &str, client_id: &ClientId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };

        let removed = members.remove(client_id);
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        removed
    }

    #[cfg(test)]
    pub fn contains(&self, room_id: &str, client_id: &ClientId) -> bool {
        self.rooms
            .get(room_id)
            .map(|members| members.contains(client_id))
            .unwrap_or(false)
    }

    /// Iterates over the current members of a room
    pub fn members<'a>(&'a self, room_id: &str) -> impl Iterator<Item = &'a ClientId> + 'a {
        self.rooms.get(room_id).into_iter().flatten()
    }

    /// Number of members in a room, 0 if the room does not exist
    pub fn size(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(HashSet::len).unwrap_or(0)
    }

    /// Iterates over every room and its member set
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HashSet<ClientId>)> {
        self.rooms
            .iter()
            .map(|(room_id, members)| (room_id.as_str(), members))
    }

    #[cfg(test)]
    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
