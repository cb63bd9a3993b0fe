//! Game Records & Collection
//!
//! The authoritative in-memory game list the backend serves. Records are
//! loaded once at startup from a catalog snapshot; the core never mutates
//! them (the `id` is the immutable identity of a record).

pub mod playlist;

pub use playlist::{GamePlaylist, PlaylistEntry, PlaylistRegistry};

use std::path::Path;

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// A single game metadata record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameRecord {
    /// Unique identity, stable for the record's lifetime.
    pub id: String,
    pub title: String,
    pub developer: String,
    pub publisher: String,
    pub series: String,
    pub platform: String,
    pub genre: String,
    pub release_date: String,
    pub date_added: String,
    pub installed: bool,
}

/// String fields a filter term can be matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameField {
    Id,
    Title,
    Series,
    Developer,
    Publisher,
    Platform,
    Genre,
}

impl GameRecord {
    pub fn field(&self, field: GameField) -> &str {
        match field {
            GameField::Id => &self.id,
            GameField::Title => &self.title,
            GameField::Series => &self.series,
            GameField::Developer => &self.developer,
            GameField::Publisher => &self.publisher,
            GameField::Platform => &self.platform,
            GameField::Genre => &self.genre,
        }
    }
}

/// The full game list plus lookup helpers. Read-only after construction.
pub struct GameCollection {
    games: Vec<GameRecord>,
}

impl GameCollection {
    pub fn new(games: Vec<GameRecord>) -> Self {
        Self { games }
    }

    /// Load the collection from a JSON catalog snapshot.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading game catalog {}", path.display()))?;
        let games: Vec<GameRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing game catalog {}", path.display()))?;
        Ok(Self::new(games))
    }

    /// Load the collection, degrading to an empty list when the catalog is
    /// missing or unreadable (the launcher may simply not be installed yet).
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(collection) => {
                info!(
                    "Loaded {} games from {}",
                    collection.count(),
                    path.display()
                );
                collection
            }
            Err(error) => {
                warn!("No game catalog loaded: {error:#}");
                Self::new(Vec::new())
            }
        }
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    pub fn count(&self) -> usize {
        self.games.len()
    }

    /// Find the game with the given id.
    pub fn find_game(&self, id: &str) -> Option<&GameRecord> {
        self.games.iter().find(|game| game.id == id)
    }

    /// Distinct platform names, in first-seen order.
    pub fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = Vec::new();
        for game in &self.games {
            if !platforms.iter().any(|p| p == &game.platform) {
                platforms.push(game.platform.clone());
            }
        }
        platforms
    }

    /// Pick up to `count` distinct games at random.
    pub fn random_games(&self, count: usize) -> Vec<GameRecord> {
        let mut rng = rand::thread_rng();
        let amount = count.min(self.games.len());
        rand::seq::index::sample(&mut rng, self.games.len(), amount)
            .into_iter()
            .map(|index| self.games[index].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str, platform: &str) -> GameRecord {
        GameRecord {
            id: id.to_string(),
            title: title.to_string(),
            platform: platform.to_string(),
            ..GameRecord::default()
        }
    }

    #[test]
    fn finds_games_by_id() {
        let collection = GameCollection::new(vec![
            record("a", "Alpha", "MS-DOS"),
            record("b", "Beta", "Windows 3x"),
        ]);
        assert_eq!(collection.find_game("b").map(|g| g.title.as_str()), Some("Beta"));
        assert!(collection.find_game("c").is_none());
    }

    #[test]
    fn platforms_are_distinct_in_first_seen_order() {
        let collection = GameCollection::new(vec![
            record("a", "Alpha", "MS-DOS"),
            record("b", "Beta", "Windows 3x"),
            record("c", "Gamma", "MS-DOS"),
        ]);
        assert_eq!(collection.platforms(), vec!["MS-DOS", "Windows 3x"]);
    }

    #[test]
    fn random_games_are_distinct_and_bounded() {
        let collection = GameCollection::new(vec![
            record("a", "Alpha", "MS-DOS"),
            record("b", "Beta", "MS-DOS"),
            record("c", "Gamma", "MS-DOS"),
        ]);
        let picked = collection.random_games(10);
        assert_eq!(picked.len(), 3);
        let mut ids: Vec<&str> = picked.iter().map(|g| g.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn record_deserializes_with_camel_case_keys() {
        let game: GameRecord = serde_json::from_str(
            r#"{"id":"x","title":"X","releaseDate":"1993-06-01","dateAdded":"2020-01-01","installed":true}"#,
        )
        .unwrap();
        assert_eq!(game.release_date, "1993-06-01");
        assert!(game.installed);
        assert_eq!(game.developer, "");
    }
}
