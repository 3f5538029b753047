//! Parser for the `key=value` configuration text handed to plugins.
//!
//! The format is deliberately minimal:
//!
//! ```text
//! # comment
//! Width = 200
//! Seed=42
//! ```
//!
//! One pair per line. Blank lines and lines whose first non-blank character
//! is `#` are ignored. Whitespace around the key and value is stripped.
//! There is no escaping, nesting or type coercion; values stay strings and
//! the plugin parses them itself. Lines without `=` or with an empty key are
//! skipped silently.

use std::str::FromStr;

use indexmap::IndexMap;

/// Parsed configuration, in the order keys first appeared.
pub type ConfigMap = IndexMap<String, String>;

/// Parse configuration text into an ordered map.
///
/// A key that appears twice keeps its first position and its last value.
///
/// ```
/// let map = charlie_core::parse_config("# size\nX=1\n Y = 2 \n\nbogus\n");
/// assert_eq!(map.len(), 2);
/// assert_eq!(map["X"], "1");
/// assert_eq!(map["Y"], "2");
/// ```
pub fn parse_config(text: &str) -> ConfigMap {
    let mut map = ConfigMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), value.trim().to_string());
    }
    map
}

/// Look up `key` and parse it, falling back to `default` when the key is
/// missing or does not parse.
pub fn value_or<T: FromStr>(config: &ConfigMap, key: &str, default: T) -> T {
    config
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_simple_pairs_in_order() {
        let map = parse_config("X=1\nY=2\n");
        let pairs: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, vec![("X", "1"), ("Y", "2")]);
    }

    #[test]
    fn skips_comments_blanks_and_malformed_lines() {
        let text = "# header\n\n   # indented comment\nno equals here\n=orphan\nA = b\n";
        let map = parse_config(text);
        assert_eq!(map.len(), 1);
        assert_eq!(map["A"], "b");
    }

    #[test]
    fn keeps_everything_after_first_equals() {
        let map = parse_config("expr = a=b=c");
        assert_eq!(map["expr"], "a=b=c");
    }

    #[test]
    fn empty_value_is_kept() {
        let map = parse_config("Name=");
        assert_eq!(map["Name"], "");
    }

    #[test]
    fn duplicate_key_keeps_position_takes_last_value() {
        let map = parse_config("A=1\nB=2\nA=3");
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(map["A"], "3");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let map = parse_config("A=1\r\nB=2\r\n");
        assert_eq!(map["A"], "1");
        assert_eq!(map["B"], "2");
    }

    #[test]
    fn value_or_falls_back() {
        let map = parse_config("Count=12\nRatio=abc");
        assert_eq!(value_or(&map, "Count", 0u32), 12);
        assert_eq!(value_or(&map, "Ratio", 0.5f64), 0.5);
        assert_eq!(value_or(&map, "Missing", -1i64), -1);
    }

    fn arb_key() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_]{0,8}"
    }

    fn arb_value() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_.,-]{0,12}"
    }

    proptest! {
        #[test]
        fn rendered_pairs_parse_back(
            pairs in proptest::collection::vec((arb_key(), arb_value()), 0..16),
        ) {
            let mut expected = ConfigMap::new();
            let mut text = String::new();
            for (k, v) in &pairs {
                text.push_str(&format!("  {k} =  {v}\n# noise\n\n"));
                expected.insert(k.clone(), v.clone());
            }
            prop_assert_eq!(parse_config(&text), expected);
        }

        #[test]
        fn never_panics(text in "\\PC*") {
            let _ = parse_config(&text);
        }
    }
}
