pub mod fs;

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;

pub use fs::FsSongLibrary;

/// Opaque key resolving to a playable audio blob inside a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioHandle(pub String);

/// Catalog entry describing one playable song.
#[derive(Debug, Clone)]
pub struct SongMeta {
    pub audio: AudioHandle,
    /// Song title; doubles as the solution players must guess.
    pub title: String,
    /// Performing artist, when the library knows it.
    pub artist: Option<String>,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("song library is empty")]
    Empty,
    #[error("unknown audio handle `{0}`")]
    UnknownHandle(String),
    #[error("failed to read `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Abstraction over the song catalog the game engine draws questions from.
///
/// Implementations must be safe under parallel reads; the engine only ever
/// holds an `Arc<dyn SongLibrary>` and never blocks its room controllers on
/// library calls.
pub trait SongLibrary: Send + Sync {
    /// Sample up to `count` distinct songs for a quiz.
    fn pick(&self, count: usize) -> BoxFuture<'static, LibraryResult<Vec<SongMeta>>>;
    /// Resolve a handle to the full audio byte sequence.
    fn load_audio(&self, handle: &AudioHandle) -> BoxFuture<'static, LibraryResult<Bytes>>;
    /// Number of songs currently catalogued.
    fn song_count(&self) -> usize;
}
