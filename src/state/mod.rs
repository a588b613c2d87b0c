pub mod machine;
pub mod quiz;
pub mod registry;
pub mod room;
pub mod sessions;
pub mod timer;

use std::sync::Arc;

use crate::{config::AppConfig, library::SongLibrary, state::registry::RoomRegistry};

pub use self::sessions::SessionDirectory;

pub type SharedState = Arc<AppState>;

/// Central application state: the room registry, the session directory, and
/// the song library every game draws from.
pub struct AppState {
    config: AppConfig,
    sessions: Arc<SessionDirectory>,
    rooms: Arc<RoomRegistry>,
    library: Arc<dyn SongLibrary>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, library: Arc<dyn SongLibrary>) -> SharedState {
        let sessions = Arc::new(SessionDirectory::new());
        let rooms = RoomRegistry::new(
            config.room_defaults().clone(),
            library.clone(),
            sessions.clone(),
        );

        Arc::new(Self {
            config,
            sessions,
            rooms,
            library,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Directory mapping session nonces to display names.
    pub fn sessions(&self) -> &Arc<SessionDirectory> {
        &self.sessions
    }

    /// Registry of live rooms.
    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    pub fn library(&self) -> &Arc<dyn SongLibrary> {
        &self.library
    }
}
