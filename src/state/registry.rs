use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    dto::room::{RoomConfiguration, RoomListing},
    library::SongLibrary,
    state::{
        room::{RoomController, RoomHandle, RoomMessage},
        sessions::SessionDirectory,
    },
};

/// A registered room: the shared handle plus its controller task, which is
/// joined during shutdown so no socket outlives the process.
struct RoomEntry {
    handle: RoomHandle,
    task: JoinHandle<()>,
}

/// Process-wide mapping from room id to its running controller.
///
/// Rooms are created on demand by the first WebSocket upgrade for an id and
/// remove themselves when their controller terminates. Listings read the
/// rooms' published snapshots and never block on a controller.
pub struct RoomRegistry {
    rooms: DashMap<String, RoomEntry>,
    defaults: RoomConfiguration,
    library: Arc<dyn SongLibrary>,
    sessions: Arc<SessionDirectory>,
}

impl RoomRegistry {
    pub fn new(
        defaults: RoomConfiguration,
        library: Arc<dyn SongLibrary>,
        sessions: Arc<SessionDirectory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            defaults,
            library,
            sessions,
        })
    }

    /// Fetch the room for `id`, launching a fresh controller if none runs.
    pub fn get_or_create(self: &Arc<Self>, id: &str) -> RoomHandle {
        self.rooms
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(room = %id, "creating room");
                let (handle, task) = RoomController::spawn(
                    id.to_string(),
                    self.defaults.clone(),
                    self.library.clone(),
                    self.sessions.clone(),
                    Arc::downgrade(self),
                );
                RoomEntry { handle, task }
            })
            .handle
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|entry| entry.handle.clone())
    }

    /// Called by a controller as it exits.
    pub fn remove(&self, id: &str) {
        if self.rooms.remove(id).is_some() {
            info!(room = %id, "room removed");
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Listing rows for `GET /room`, oldest room first.
    pub fn list(&self) -> Vec<RoomListing> {
        let mut listings: Vec<RoomListing> = self
            .rooms
            .iter()
            .map(|entry| entry.value().handle.listing())
            .collect();
        listings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        listings
    }

    /// Ask every room to close its sockets and terminate, then wait for the
    /// controllers to actually exit. Entries are taken out of the map first
    /// so a late upgrade cannot resurrect a room mid-teardown.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self
            .rooms
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut entries = Vec::new();
        for id in ids {
            if let Some((_, entry)) = self.rooms.remove(&id) {
                entries.push(entry);
            }
        }

        for entry in &entries {
            let _ = entry.handle.send(RoomMessage::Shutdown);
        }
        for entry in entries {
            let _ = entry.task.await;
        }
    }
}
