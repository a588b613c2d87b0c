use crate::{dto::room::RoomListing, state::SharedState};

/// Snapshot-based room listing; never blocks on a room controller.
pub fn list_rooms(state: &SharedState) -> Vec<RoomListing> {
    state.rooms().list()
}
