//! Directory-backed song library.
//!
//! Scans a directory once at startup; file stems follow the downloader's
//! `Artist - Title` convention, with the whole stem used as the title when no
//! separator is present.

use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::library::{AudioHandle, LibraryError, LibraryResult, SongLibrary, SongMeta};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "opus", "m4a", "flac", "wav"];

struct CatalogEntry {
    path: PathBuf,
    meta: SongMeta,
}

/// Song library backed by a flat directory of audio files.
pub struct FsSongLibrary {
    catalog: HashMap<String, CatalogEntry>,
}

impl FsSongLibrary {
    /// Scan `dir` and build the catalog. Non-audio files are skipped; a
    /// missing directory yields an empty library rather than a startup error.
    pub fn open(dir: &Path) -> io::Result<Self> {
        let mut catalog = HashMap::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "song library directory not found; starting empty");
                return Ok(Self { catalog });
            }
            Err(err) => return Err(err),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || !has_audio_extension(&path) {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                debug!(path = %path.display(), "skipping file with non-UTF-8 name");
                continue;
            };
            let Some(key) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            let (artist, title) = parse_stem(stem);
            catalog.insert(
                key.to_string(),
                CatalogEntry {
                    path: path.clone(),
                    meta: SongMeta {
                        audio: AudioHandle(key.to_string()),
                        title,
                        artist,
                    },
                },
            );
        }

        info!(dir = %dir.display(), songs = catalog.len(), "scanned song library");

        Ok(Self { catalog })
    }
}

impl SongLibrary for FsSongLibrary {
    fn pick(&self, count: usize) -> BoxFuture<'static, LibraryResult<Vec<SongMeta>>> {
        let mut entries: Vec<SongMeta> = self
            .catalog
            .values()
            .map(|entry| entry.meta.clone())
            .collect();
        entries.shuffle(&mut rand::thread_rng());
        entries.truncate(count);

        Box::pin(async move {
            if entries.is_empty() {
                return Err(LibraryError::Empty);
            }
            Ok(entries)
        })
    }

    fn load_audio(&self, handle: &AudioHandle) -> BoxFuture<'static, LibraryResult<Bytes>> {
        let resolved = self.catalog.get(&handle.0).map(|entry| entry.path.clone());
        let key = handle.0.clone();

        Box::pin(async move {
            let Some(path) = resolved else {
                return Err(LibraryError::UnknownHandle(key));
            };
            let bytes = tokio::fs::read(&path).await.map_err(|source| LibraryError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Ok(Bytes::from(bytes))
        })
    }

    fn song_count(&self) -> usize {
        self.catalog.len()
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}

/// Split an `Artist - Title` stem; the whole stem is the title when no
/// separator is present.
fn parse_stem(stem: &str) -> (Option<String>, String) {
    match stem.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
            (Some(artist.trim().to_string()), title.trim().to_string())
        }
        _ => (None, stem.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stem_splits_artist_and_title() {
        assert_eq!(
            parse_stem("Motoi Sakuraba - Firelink Shrine"),
            (
                Some("Motoi Sakuraba".to_string()),
                "Firelink Shrine".to_string()
            )
        );
    }

    #[test]
    fn parse_stem_without_separator_is_all_title() {
        assert_eq!(parse_stem("Firelink Shrine"), (None, "Firelink Shrine".to_string()));
        // A dash without surrounding spaces is part of the title.
        assert_eq!(parse_stem("a-ha"), (None, "a-ha".to_string()));
    }

    #[test]
    fn audio_extension_filter() {
        assert!(has_audio_extension(Path::new("x/song.mp3")));
        assert!(has_audio_extension(Path::new("x/song.OGG")));
        assert!(!has_audio_extension(Path::new("x/cover.jpg")));
        assert!(!has_audio_extension(Path::new("x/noext")));
    }
}
