//! Search Engine
//!
//! Everything between the search box and an ordered result list: the query
//! language parser, the filter model and its evaluator, the order engine,
//! and the debounced per-view search state.

pub mod filter;
pub mod order;
pub mod parser;
pub mod views;

pub use filter::{filter_game_refs, filter_games};
pub use order::{compare_games, order_games, GameOrderBy, GameOrderDirection};
pub use parser::parse_user_input;
pub use views::{ResultsView, ViewManager};

use serde::{Deserialize, Serialize};

use crate::game::GameField;

/// Per-field include/exclude terms. All eight buckets are always present;
/// an unused bucket is an empty list, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldFilter {
    pub generic: Vec<String>,
    pub id: Vec<String>,
    pub title: Vec<String>,
    pub series: Vec<String>,
    pub developer: Vec<String>,
    pub publisher: Vec<String>,
    pub platform: Vec<String>,
    pub genre: Vec<String>,
}

impl FieldFilter {
    pub fn is_empty(&self) -> bool {
        self.generic.is_empty()
            && self.id.is_empty()
            && self.title.is_empty()
            && self.series.is_empty()
            && self.developer.is_empty()
            && self.publisher.is_empty()
            && self.platform.is_empty()
            && self.genre.is_empty()
    }

    /// The non-generic buckets, paired with the record field they match.
    pub(crate) fn field_entries(&self) -> [(GameField, &Vec<String>); 7] {
        [
            (GameField::Id, &self.id),
            (GameField::Title, &self.title),
            (GameField::Series, &self.series),
            (GameField::Developer, &self.developer),
            (GameField::Publisher, &self.publisher),
            (GameField::Platform, &self.platform),
            (GameField::Genre, &self.genre),
        ]
    }

    /// Copy with every term lowercased. Done once per evaluation stage so
    /// record fields are the only per-comparison case folds.
    pub(crate) fn to_lowercase(&self) -> FieldFilter {
        let lower = |terms: &Vec<String>| terms.iter().map(|t| t.to_lowercase()).collect();
        FieldFilter {
            generic: lower(&self.generic),
            id: lower(&self.id),
            title: lower(&self.title),
            series: lower(&self.series),
            developer: lower(&self.developer),
            publisher: lower(&self.publisher),
            platform: lower(&self.platform),
            genre: lower(&self.genre),
        }
    }
}

/// A filter tree: either a leaf holding the four term buckets, or an AND/OR
/// combination of child filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameFilter {
    Leaf {
        whitelist: FieldFilter,
        blacklist: FieldFilter,
        exact_whitelist: FieldFilter,
        exact_blacklist: FieldFilter,
        match_any: bool,
    },
    Composite {
        children: Vec<GameFilter>,
        match_any: bool,
    },
}

impl GameFilter {
    pub fn empty_leaf() -> Self {
        GameFilter::Leaf {
            whitelist: FieldFilter::default(),
            blacklist: FieldFilter::default(),
            exact_whitelist: FieldFilter::default(),
            exact_blacklist: FieldFilter::default(),
            match_any: false,
        }
    }

    pub fn match_any(&self) -> bool {
        match self {
            GameFilter::Leaf { match_any, .. } => *match_any,
            GameFilter::Composite { match_any, .. } => *match_any,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GameFilter::Leaf {
                whitelist,
                blacklist,
                exact_whitelist,
                exact_blacklist,
                ..
            } => {
                whitelist.is_empty()
                    && blacklist.is_empty()
                    && exact_whitelist.is_empty()
                    && exact_blacklist.is_empty()
            }
            GameFilter::Composite { children, .. } => children.is_empty(),
        }
    }
}

impl Default for GameFilter {
    fn default() -> Self {
        Self::empty_leaf()
    }
}

/// Combine two filters into a two-child composite. The result matches any
/// only when *both* operands do; AND is the conservative default.
pub fn merge_game_filters(a: GameFilter, b: GameFilter) -> GameFilter {
    let match_any = a.match_any() && b.match_any();
    GameFilter::Composite {
        children: vec![a, b],
        match_any,
    }
}

/// Build the effective filter for a search: the parsed text, merged with the
/// selected playlist's dynamic filter when one is active. An empty side
/// yields the other side unchanged.
pub fn build_search_filter(text: &str, playlist_filter: Option<&GameFilter>) -> GameFilter {
    let mut filter = parse_user_input(text);
    if let Some(playlist_filter) = playlist_filter {
        filter = if filter.is_empty() {
            playlist_filter.clone()
        } else {
            merge_game_filters(playlist_filter.clone(), filter)
        };
    }
    filter
}
