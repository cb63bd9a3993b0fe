//! Order Engine
//!
//! Deterministic, tie-broken comparators for result lists. Every key except
//! the title itself falls back to an ascending title comparison on ties, so
//! two orderings of the same list always agree.

use std::cmp::Ordering;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::game::GameRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameOrderBy {
    #[default]
    Title,
    DateAdded,
    #[serde(rename = "tags")]
    Genre,
    Platform,
    Series,
    Developer,
    Publisher,
    ReleaseDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOrderDirection {
    #[default]
    Ascending,
    Descending,
}

/// Compare two records under the given key and direction.
pub fn compare_games(
    order_by: GameOrderBy,
    direction: GameOrderDirection,
    a: &GameRecord,
    b: &GameRecord,
) -> Ordering {
    let ordering = compare_ascending(order_by, a, b);
    match direction {
        GameOrderDirection::Ascending => ordering,
        // The inverter swaps Greater and Less and leaves Equal fixed, so
        // ties stay ties in both directions.
        GameOrderDirection::Descending => ordering.reverse(),
    }
}

/// Sort a game list in place.
pub fn order_games(games: &mut [GameRecord], order_by: GameOrderBy, direction: GameOrderDirection) {
    games.sort_by(|a, b| compare_games(order_by, direction, a, b));
}

fn compare_ascending(order_by: GameOrderBy, a: &GameRecord, b: &GameRecord) -> Ordering {
    match order_by {
        GameOrderBy::Title => by_title(a, b),
        GameOrderBy::DateAdded => field_then_title(&a.date_added, &b.date_added, a, b),
        GameOrderBy::Genre => field_then_title(&a.genre, &b.genre, a, b),
        GameOrderBy::Platform => field_then_title(&a.platform, &b.platform, a, b),
        GameOrderBy::Series => field_then_title(&a.series, &b.series, a, b),
        GameOrderBy::Developer => field_then_title(&a.developer, &b.developer, a, b),
        GameOrderBy::Publisher => field_then_title(&a.publisher, &b.publisher, a, b),
        GameOrderBy::ReleaseDate => {
            field_then_title(&release_year(&a.release_date), &release_year(&b.release_date), a, b)
        }
    }
}

fn by_title(a: &GameRecord, b: &GameRecord) -> Ordering {
    a.title.to_lowercase().cmp(&b.title.to_lowercase())
}

fn field_then_title(field_a: &str, field_b: &str, a: &GameRecord, b: &GameRecord) -> Ordering {
    field_a.cmp(field_b).then_with(|| by_title(a, b))
}

/// The calendar year of a release date, as a string. Release dates are
/// compared at year granularity only.
fn release_year(date: &str) -> String {
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return parsed.year().to_string();
    }
    // "1993", "1993-10", or free text with a leading year.
    let digits: String = date.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        digits[..4].to_string()
    } else {
        String::new()
    }
}
