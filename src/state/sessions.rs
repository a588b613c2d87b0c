use dashmap::DashMap;
use uuid::Uuid;

/// Process-wide mapping from opaque session nonces to display names.
///
/// The HTTP layer populates it at registration time; the room engine only
/// reads it. Names never expire — the nonce space is UUIDs and rooms are
/// memory-only anyway.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    names: DashMap<String, String>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh session nonce for `name`.
    pub fn register(&self, name: String) -> String {
        let session = Uuid::new_v4().to_string();
        self.insert(session.clone(), name);
        session
    }

    /// Record a name under an existing session nonce.
    pub fn insert(&self, session: String, name: String) {
        self.names.insert(session, name);
    }

    pub fn contains(&self, session: &str) -> bool {
        self.names.contains_key(session)
    }

    pub fn name_for(&self, session: &str) -> Option<String> {
        self.names.get(session).map(|entry| entry.value().clone())
    }

    /// Resolved display name, with the documented fallback for sessions that
    /// never registered a name.
    pub fn display_name(&self, session: &str) -> String {
        self.name_for(session)
            .unwrap_or_else(|| format!("player-{session}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_mints_resolvable_nonce() {
        let directory = SessionDirectory::new();
        let session = directory.register("alice".into());
        assert!(directory.contains(&session));
        assert_eq!(directory.name_for(&session).as_deref(), Some("alice"));
        assert_eq!(directory.display_name(&session), "alice");
    }

    #[test]
    fn unknown_sessions_get_placeholder_names() {
        let directory = SessionDirectory::new();
        assert!(!directory.contains("ghost"));
        assert_eq!(directory.display_name("ghost"), "player-ghost");
    }
}
