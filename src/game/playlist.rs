//! Playlists
//!
//! Named subsets of the collection: an ordered list of entries, an optional
//! dynamic filter, or both. The installed-games playlists are synthesized
//! from the records' `installed` flags, one per platform, under a reserved
//! filename prefix.

use std::path::Path;

use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{GameCollection, GameRecord};
use crate::search::GameFilter;

/// Filename prefix reserved for the synthesized installed-games playlists.
/// Chosen so it cannot collide with a playlist loaded from disk.
pub const INSTALLED_PLAYLIST_PREFIX: &str = "!installedgames!";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub platform: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GamePlaylist {
    /// Unique identity of the playlist.
    pub filename: String,
    pub title: String,
    pub description: String,
    pub author: String,
    /// Explicit entries, in playlist order.
    pub games: Vec<PlaylistEntry>,
    /// Dynamic filter, merged with the search filter when the playlist is
    /// selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<GameFilter>,
}

impl GamePlaylist {
    pub fn is_installed_playlist(&self) -> bool {
        self.filename.starts_with(INSTALLED_PLAYLIST_PREFIX)
    }
}

/// Restrict a game list to a playlist.
///
/// Installed-games playlists filter on the `installed` flag and the platform
/// encoded in the filename. Playlists with explicit entries restrict *and*
/// reorder the result to the entry order.
pub fn filter_playlist<'a>(
    playlist: &GamePlaylist,
    games: &'a [GameRecord],
) -> Vec<&'a GameRecord> {
    if playlist.is_installed_playlist() {
        let platform = playlist
            .filename
            .split('_')
            .skip(1)
            .collect::<Vec<_>>()
            .join("_");
        return games
            .iter()
            .filter(|game| game.installed && game.platform == platform)
            .collect();
    }

    let mut filtered = Vec::new();
    for entry in &playlist.games {
        if let Some(game) = games.iter().find(|game| game.id == entry.id) {
            filtered.push(game);
        }
    }
    filtered
}

/// All known playlists, loaded from disk plus the synthesized ones.
pub struct PlaylistRegistry {
    playlists: RwLock<Vec<GamePlaylist>>,
}

impl PlaylistRegistry {
    pub fn new() -> Self {
        Self {
            playlists: RwLock::new(Vec::new()),
        }
    }

    /// Load every `*.json` playlist in the folder. Individual parse failures
    /// are logged and skipped; the rest of the folder still loads.
    pub fn load_dir(&self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) => {
                warn!("No playlists loaded from {}: {error}", dir.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|raw| Ok(serde_json::from_str::<GamePlaylist>(&raw)?))
            {
                Ok(mut playlist) => {
                    if playlist.filename.is_empty() {
                        playlist.filename = entry.file_name().to_string_lossy().into_owned();
                    }
                    info!("Loaded playlist {}", playlist.filename);
                    self.upsert(playlist);
                }
                Err(error) => {
                    warn!("Failed to load playlist {}: {error:#}", path.display());
                }
            }
        }
    }

    pub fn all(&self) -> Vec<GamePlaylist> {
        self.playlists.read().clone()
    }

    pub fn find(&self, filename: &str) -> Option<GamePlaylist> {
        self.playlists
            .read()
            .iter()
            .find(|playlist| playlist.filename == filename)
            .cloned()
    }

    /// Add or replace a playlist, returning the stored copy.
    pub fn upsert(&self, playlist: GamePlaylist) -> GamePlaylist {
        let mut playlists = self.playlists.write();
        match playlists
            .iter_mut()
            .find(|existing| existing.filename == playlist.filename)
        {
            Some(existing) => *existing = playlist.clone(),
            None => playlists.push(playlist.clone()),
        }
        playlist
    }

    /// Rebuild the per-platform installed-games playlists from the
    /// collection's `installed` flags. Returns the playlists that changed,
    /// so the caller can broadcast them and drop stale query caches.
    pub fn rebuild_installed(&self, collection: &GameCollection) -> Vec<GamePlaylist> {
        let mut updated = Vec::new();
        for platform in collection.platforms() {
            let entries: Vec<PlaylistEntry> = collection
                .games()
                .iter()
                .filter(|game| game.installed && game.platform == platform)
                .map(|game| PlaylistEntry {
                    id: game.id.clone(),
                    title: game.title.clone(),
                    platform: game.platform.clone(),
                })
                .collect();
            if entries.is_empty() {
                continue;
            }
            let playlist = GamePlaylist {
                filename: format!("{INSTALLED_PLAYLIST_PREFIX}_{platform}"),
                title: "Installed games".to_string(),
                description: "A list of installed games.".to_string(),
                author: String::new(),
                games: entries,
                filter: None,
            };
            let changed = self.find(&playlist.filename).as_ref() != Some(&playlist);
            if changed {
                updated.push(self.upsert(playlist));
            }
        }
        updated
    }
}

impl Default for PlaylistRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, platform: &str, installed: bool) -> GameRecord {
        GameRecord {
            id: id.to_string(),
            title: id.to_uppercase(),
            platform: platform.to_string(),
            installed,
            ..GameRecord::default()
        }
    }

    #[test]
    fn entry_playlists_restrict_and_reorder() {
        let games = vec![
            record("a", "MS-DOS", false),
            record("b", "MS-DOS", false),
            record("c", "MS-DOS", false),
        ];
        let playlist = GamePlaylist {
            filename: "favs.json".to_string(),
            games: vec![
                PlaylistEntry { id: "c".into(), ..Default::default() },
                PlaylistEntry { id: "a".into(), ..Default::default() },
                PlaylistEntry { id: "missing".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let filtered = filter_playlist(&playlist, &games);
        let ids: Vec<&str> = filtered.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn installed_playlist_filters_on_flag_and_platform() {
        let games = vec![
            record("a", "MS-DOS", true),
            record("b", "MS-DOS", false),
            record("c", "Windows 3x", true),
        ];
        let playlist = GamePlaylist {
            filename: format!("{INSTALLED_PLAYLIST_PREFIX}_MS-DOS"),
            ..Default::default()
        };
        let filtered = filter_playlist(&playlist, &games);
        let ids: Vec<&str> = filtered.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn rebuild_installed_creates_one_playlist_per_platform() {
        let collection = GameCollection::new(vec![
            record("a", "MS-DOS", true),
            record("b", "Windows 3x", true),
            record("c", "Windows 3x", false),
        ]);
        let registry = PlaylistRegistry::new();
        let updated = registry.rebuild_installed(&collection);
        assert_eq!(updated.len(), 2);
        // A second rebuild with unchanged flags reports nothing new.
        assert!(registry.rebuild_installed(&collection).is_empty());
        let dos = registry
            .find(&format!("{INSTALLED_PLAYLIST_PREFIX}_MS-DOS"))
            .unwrap();
        assert_eq!(dos.games.len(), 1);
        assert_eq!(dos.games[0].id, "a");
    }
}
