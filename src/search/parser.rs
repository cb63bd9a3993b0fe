//! Query Language Parser
//!
//! Turns free-text search input into a leaf [`GameFilter`]. The parser is a
//! total function over arbitrary input: anything it does not recognize
//! degrades to a generic substring term instead of being rejected.
//!
//! Grammar, left to right over space-delimited tokens:
//! - a leading `-` negates the term (blacklist instead of whitelist)
//! - a leading `#`, `!` or `@` (checked after `-`) pins the field to
//!   `genre`, `platform` or `developer`
//! - the earliest of `:`/`=` before any quote splits key from value;
//!   `:` selects fuzzy matching, `=` exact matching
//! - a double quote opens phrase capture; tokens are joined with single
//!   spaces until one ends in `"`; an unterminated quote consumes the rest
//!   of the input as one phrase
//! - `key=""` is preserved as a literal empty exact term
//! - unrecognized keys stay visible as `key<op>value` generic terms

use super::{FieldFilter, GameFilter};

/// Stand-in for an explicitly empty quoted value (`key=""`), so it survives
/// to the commit instead of reading as a missing value.
const EMPTY_VALUE_SENTINEL: &str = "\u{1}!empty-quoted-value!\u{1}";

/// Key/value separator flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOp {
    /// `:`, fuzzy (substring) matching.
    Matches,
    /// `=`, exact matching.
    Equals,
}

impl KeyOp {
    fn ch(self) -> char {
        match self {
            KeyOp::Matches => ':',
            KeyOp::Equals => '=',
        }
    }
}

/// The key operator appearing earliest in the token, ignoring anything at or
/// after the first quote.
fn earliest_key_op(token: &str) -> Option<KeyOp> {
    let limit = token.find('"').unwrap_or(token.len());
    let head = &token[..limit];
    match (head.find(':'), head.find('=')) {
        (Some(colon), Some(equals)) => Some(if colon <= equals {
            KeyOp::Matches
        } else {
            KeyOp::Equals
        }),
        (Some(_), None) => Some(KeyOp::Matches),
        (None, Some(_)) => Some(KeyOp::Equals),
        (None, None) => None,
    }
}

#[derive(Default)]
struct LeafBuckets {
    whitelist: FieldFilter,
    blacklist: FieldFilter,
    exact_whitelist: FieldFilter,
    exact_blacklist: FieldFilter,
}

impl LeafBuckets {
    /// Commit the finished (key, value, negate) triple to the right bucket
    /// and reset the in-flight state.
    fn commit(
        &mut self,
        key: &mut String,
        value: &mut String,
        key_op: Option<KeyOp>,
        negative: &mut bool,
    ) {
        let mut exact = false;
        if !key.is_empty() {
            if value == EMPTY_VALUE_SENTINEL {
                value.clear();
                exact = true;
            } else if key_op == Some(KeyOp::Equals) {
                exact = true;
            }
        }

        let list = match (*negative, exact) {
            (true, true) => &mut self.exact_blacklist,
            (true, false) => &mut self.blacklist,
            (false, true) => &mut self.exact_whitelist,
            (false, false) => &mut self.whitelist,
        };

        match key.to_lowercase().as_str() {
            "id" => list.id.push(std::mem::take(value)),
            "title" => list.title.push(std::mem::take(value)),
            "series" => list.series.push(std::mem::take(value)),
            "developer" => list.developer.push(std::mem::take(value)),
            "publisher" => list.publisher.push(std::mem::take(value)),
            "platform" => list.platform.push(std::mem::take(value)),
            "genre" => list.genre.push(std::mem::take(value)),
            _ => {
                // Unknown or absent key: keep it visible as a generic
                // substring constraint, prefix and all.
                let term = match key_op {
                    Some(op) => format!("{}{}{}", key, op.ch(), std::mem::take(value)),
                    None => std::mem::take(value),
                };
                list.generic.push(term);
            }
        }

        key.clear();
        value.clear();
        *negative = false;
    }
}

/// Parse user search text into a leaf filter. Never fails.
pub fn parse_user_input(input: &str) -> GameFilter {
    let mut buckets = LeafBuckets::default();

    // Two-mode machine: idle, or capturing a quoted phrase. Exactly one
    // (key, value, negate) triple is under construction at a time.
    let mut capturing_quotes = false;
    let mut key = String::new();
    let mut value = String::new();
    let mut key_op: Option<KeyOp> = None;
    let mut negative = false;

    for raw_token in input.split(' ') {
        let mut token = raw_token;

        if !capturing_quotes && token.len() > 1 {
            if let Some(rest) = token.strip_prefix('-') {
                negative = true;
                token = rest;
            }
            if token.len() > 1 {
                if let Some(rest) = token.strip_prefix('#') {
                    key = "genre".to_string();
                    token = rest;
                } else if let Some(rest) = token.strip_prefix('!') {
                    key = "platform".to_string();
                    token = rest;
                } else if let Some(rest) = token.strip_prefix('@') {
                    key = "developer".to_string();
                    token = rest;
                }
            }
        }

        if capturing_quotes {
            if value.is_empty() {
                value.push_str(token);
            } else {
                value.push(' ');
                value.push_str(token);
            }
            if token.ends_with('"') {
                capturing_quotes = false;
                if let Some(index) = value.rfind('"') {
                    value.truncate(index);
                }
                buckets.commit(&mut key, &mut value, key_op, &mut negative);
            }
            continue;
        }

        key_op = earliest_key_op(token);
        if let Some(op) = key_op {
            if let Some((head, rest)) = token.split_once(op.ch()) {
                key = head.to_string();
                token = rest;
            }
        }

        if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
            if token.len() == 2 {
                // `""` is only meaningful straight after a key.
                if !key.is_empty() {
                    value = EMPTY_VALUE_SENTINEL.to_string();
                }
            } else {
                value = token[1..token.len() - 1].to_string();
            }
        } else if let Some(rest) = token.strip_prefix('"') {
            // Opening quote: start phrase capture with the remainder (a lone
            // `"` starts an empty capture).
            capturing_quotes = true;
            value = rest.to_string();
            continue;
        } else {
            value = token.to_string();
        }

        if !value.is_empty() {
            buckets.commit(&mut key, &mut value, key_op, &mut negative);
        }
    }

    // An unterminated quote consumes the rest of the input as one phrase.
    if capturing_quotes && !value.is_empty() {
        buckets.commit(&mut key, &mut value, key_op, &mut negative);
    }

    GameFilter::Leaf {
        whitelist: buckets.whitelist,
        blacklist: buckets.blacklist,
        exact_whitelist: buckets.exact_whitelist,
        exact_blacklist: buckets.exact_blacklist,
        match_any: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Buckets<'a> {
        whitelist: &'a FieldFilter,
        blacklist: &'a FieldFilter,
        exact_whitelist: &'a FieldFilter,
        exact_blacklist: &'a FieldFilter,
    }

    fn leaf(filter: &GameFilter) -> Buckets<'_> {
        match filter {
            GameFilter::Leaf {
                whitelist,
                blacklist,
                exact_whitelist,
                exact_blacklist,
                ..
            } => Buckets {
                whitelist,
                blacklist,
                exact_whitelist,
                exact_blacklist,
            },
            GameFilter::Composite { .. } => panic!("parser must return a leaf"),
        }
    }

    #[test]
    fn arbitrary_input_parses_without_panicking() {
        for input in [
            "", " ", "-", "\"", "\"\"", ":::", "a=b=c", "=x", ":x", "-#", "--", "\"a\"b\"",
            "key: ", "🦀 game", "  double  spaces  ",
        ] {
            let filter = parse_user_input(input);
            // All four buckets exist on every parse.
            let _ = leaf(&filter);
        }
    }

    #[test]
    fn empty_input_parses_to_an_empty_filter() {
        assert!(parse_user_input("").is_empty());
    }

    #[test]
    fn bare_words_become_generic_terms() {
        let filter = parse_user_input("sonic");
        assert_eq!(leaf(&filter).whitelist.generic, vec!["sonic"]);
    }

    #[test]
    fn quoted_phrase_is_one_term() {
        let filter = parse_user_input("\"call of duty\"");
        assert_eq!(leaf(&filter).whitelist.generic, vec!["call of duty"]);
    }

    #[test]
    fn single_token_quotes_are_stripped() {
        let filter = parse_user_input("\"sonic\"");
        assert_eq!(leaf(&filter).whitelist.generic, vec!["sonic"]);
    }

    #[test]
    fn field_scoped_fuzzy_term() {
        let filter = parse_user_input("platform:dos");
        assert_eq!(leaf(&filter).whitelist.platform, vec!["dos"]);
    }

    #[test]
    fn negated_field_scoped_term() {
        let filter = parse_user_input("-platform:dos");
        let buckets = leaf(&filter);
        assert_eq!(buckets.blacklist.platform, vec!["dos"]);
        assert!(buckets.whitelist.is_empty());
    }

    #[test]
    fn equals_selects_exact_matching() {
        let filter = parse_user_input("genre=Action");
        assert_eq!(leaf(&filter).exact_whitelist.genre, vec!["Action"]);
    }

    #[test]
    fn quick_search_prefixes_pin_the_field() {
        assert_eq!(leaf(&parse_user_input("#rpg")).whitelist.genre, vec!["rpg"]);
        assert_eq!(leaf(&parse_user_input("!dos")).whitelist.platform, vec!["dos"]);
        assert_eq!(
            leaf(&parse_user_input("@sierra")).whitelist.developer,
            vec!["sierra"]
        );
        assert_eq!(
            leaf(&parse_user_input("-@sierra")).blacklist.developer,
            vec!["sierra"]
        );
    }

    #[test]
    fn quoted_value_under_a_key() {
        let filter = parse_user_input("title:\"alone in the dark\"");
        assert_eq!(leaf(&filter).whitelist.title, vec!["alone in the dark"]);
    }

    #[test]
    fn explicitly_empty_value_is_an_exact_empty_term() {
        let filter = parse_user_input("series=\"\"");
        assert_eq!(leaf(&filter).exact_whitelist.series, vec![""]);
        // Without a key, `""` is dropped.
        assert!(parse_user_input("\"\"").is_empty());
    }

    #[test]
    fn unterminated_quote_takes_the_rest_of_the_input() {
        let filter = parse_user_input("\"half li");
        assert_eq!(leaf(&filter).whitelist.generic, vec!["half li"]);
    }

    #[test]
    fn unknown_keys_stay_visible_as_generic_terms() {
        let filter = parse_user_input("engine:unity");
        assert_eq!(leaf(&filter).whitelist.generic, vec!["engine:unity"]);
        let filter = parse_user_input("engine=unity");
        assert_eq!(leaf(&filter).exact_whitelist.generic, vec!["engine=unity"]);
    }

    #[test]
    fn earliest_operator_wins() {
        // `=` comes first, so the whole tail is its value.
        let filter = parse_user_input("a=b:c");
        assert_eq!(leaf(&filter).exact_whitelist.generic, vec!["a=b:c"]);
    }

    #[test]
    fn operator_after_a_quote_is_not_a_key() {
        let filter = parse_user_input("\"a:b\"");
        assert_eq!(leaf(&filter).whitelist.generic, vec!["a:b"]);
    }

    #[test]
    fn dangling_key_picks_up_the_next_token() {
        let filter = parse_user_input("platform: dos");
        assert_eq!(leaf(&filter).whitelist.platform, vec!["dos"]);
    }

    #[test]
    fn negated_quoted_phrase() {
        let filter = parse_user_input("-\"call of duty\"");
        assert_eq!(leaf(&filter).blacklist.generic, vec!["call of duty"]);
    }

    #[test]
    fn mixed_query_routes_every_term() {
        let filter = parse_user_input("sonic platform:dos -genre=Action \"two words\"");
        let buckets = leaf(&filter);
        assert_eq!(buckets.whitelist.generic, vec!["sonic", "two words"]);
        assert_eq!(buckets.whitelist.platform, vec!["dos"]);
        assert_eq!(buckets.exact_blacklist.genre, vec!["Action"]);
    }
}
