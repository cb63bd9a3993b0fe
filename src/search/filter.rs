//! Filter Evaluator
//!
//! Applies a [`GameFilter`] tree to a game list. Total: records with empty
//! fields simply fail field comparisons, and an empty filter passes the
//! input through untouched, in order.

use std::collections::HashSet;

use crate::game::{GameField, GameRecord};

use super::{FieldFilter, GameFilter};

/// Fields a generic term is compared against.
const GENERIC_FIELDS: [GameField; 4] = [
    GameField::Title,
    GameField::Series,
    GameField::Developer,
    GameField::Publisher,
];

/// Filter a game slice, preserving input order except where OR-composite
/// union logic interleaves children.
pub fn filter_games<'a>(games: &'a [GameRecord], filter: &GameFilter) -> Vec<&'a GameRecord> {
    let refs: Vec<&GameRecord> = games.iter().collect();
    filter_game_refs(&refs, filter)
}

/// Same as [`filter_games`], over an already-borrowed list.
pub fn filter_game_refs<'a>(games: &[&'a GameRecord], filter: &GameFilter) -> Vec<&'a GameRecord> {
    match filter {
        GameFilter::Composite { children, match_any } => {
            if children.is_empty() {
                return games.to_vec();
            }
            if *match_any {
                // OR: union keyed by id, first-seen order, duplicates dropped.
                let mut seen: HashSet<&str> = HashSet::new();
                let mut result = Vec::new();
                for child in children {
                    for game in filter_game_refs(games, child) {
                        if seen.insert(game.id.as_str()) {
                            result.push(game);
                        }
                    }
                }
                result
            } else {
                // AND: every child runs against the original input; the
                // intersection is materialized in the first child's order.
                let per_child: Vec<Vec<&GameRecord>> = children
                    .iter()
                    .map(|child| filter_game_refs(games, child))
                    .collect();
                let mut common: HashSet<&str> =
                    per_child[0].iter().map(|game| game.id.as_str()).collect();
                for child_result in &per_child[1..] {
                    let ids: HashSet<&str> = child_result
                        .iter()
                        .map(|game| game.id.as_str())
                        .collect();
                    common.retain(|id| ids.contains(id));
                }
                per_child[0]
                    .iter()
                    .copied()
                    .filter(|game| common.contains(game.id.as_str()))
                    .collect()
            }
        }
        GameFilter::Leaf {
            whitelist,
            blacklist,
            exact_whitelist,
            exact_blacklist,
            match_any,
        } => {
            let mut result = games.to_vec();
            if !exact_whitelist.is_empty() {
                let bucket = exact_whitelist.to_lowercase();
                result.retain(|game| bucket_matches(game, &bucket, *match_any, true));
            }
            if !exact_blacklist.is_empty() {
                let bucket = exact_blacklist.to_lowercase();
                result.retain(|game| !bucket_matches(game, &bucket, *match_any, true));
            }
            if !whitelist.is_empty() {
                let bucket = whitelist.to_lowercase();
                result.retain(|game| bucket_matches(game, &bucket, *match_any, false));
            }
            if !blacklist.is_empty() {
                let bucket = blacklist.to_lowercase();
                result.retain(|game| !bucket_matches(game, &bucket, *match_any, false));
            }
            result
        }
    }
}

/// Whether a record passes one bucket (terms already lowercased).
///
/// Match-all mode: every term must be satisfied; the first miss rejects.
/// Match-any mode: the first satisfied term passes, and a bucket whose terms
/// all miss falls through to a pass rather than a rejection; blacklist
/// stages invert the decision afterwards.
fn bucket_matches(game: &GameRecord, bucket: &FieldFilter, match_any: bool, exact: bool) -> bool {
    for term in &bucket.generic {
        let hit = GENERIC_FIELDS
            .iter()
            .any(|&field| field_matches(game.field(field), term, exact));
        if match_any && hit {
            return true;
        }
        if !match_any && !hit {
            return false;
        }
    }

    for (field, terms) in bucket.field_entries() {
        for term in terms {
            let hit = field_matches(game.field(field), term, exact);
            if match_any && hit {
                return true;
            }
            if !match_any && !hit {
                return false;
            }
        }
    }

    true
}

fn field_matches(field_value: &str, term: &str, exact: bool) -> bool {
    let value = field_value.to_lowercase();
    if exact {
        value == term
    } else {
        value.contains(term)
    }
}
