//! Keycode table.
//!
//! Host key identifiers (`"ArrowUp"`, `"a"`, `" "`) are not small or stable, so the guest only
//! ever sees the position of the key name in [`KEYS`]. Lookups are case-insensitive and total:
//! anything not in the table maps to [`UNKNOWN_KEY`].

use std::collections::HashMap;

/// Canonical key names. A key's code is its index.
pub const KEYS: [&str; 59] = [
    " ",
    "alt",
    "control",
    "shift",
    "enter",
    "tab",
    "arrowdown",
    "arrowup",
    "arrowleft",
    "arrowright",
    "backspace",
    "delete",
    "escape",
    "meta",
    "a",
    "b",
    "c",
    "d",
    "e",
    "f",
    "g",
    "h",
    "i",
    "j",
    "k",
    "l",
    "m",
    "n",
    "o",
    "p",
    "q",
    "r",
    "s",
    "t",
    "u",
    "v",
    "w",
    "x",
    "y",
    "z",
    "1",
    "2",
    "3",
    "4",
    "5",
    "6",
    "7",
    "8",
    "9",
    "0",
    "[",
    "]",
    ";",
    "'",
    "\\",
    "/",
    ".",
    ",",
    "`",
];

/// Code returned for names outside the table. Always larger than any valid code.
pub const UNKNOWN_KEY: u32 = KEYS.len() as u32 + 20;

lazy_static::lazy_static! {
    static ref KEYCODES: HashMap<&'static str, u32> = KEYS
        .iter()
        .enumerate()
        .map(|(code, name)| (*name, code as u32))
        .collect();
}

/// Code for a key name, case-insensitive.
pub fn code_of(name: &str) -> u32 {
    KEYCODES
        .get(name.to_lowercase().as_str())
        .copied()
        .unwrap_or(UNKNOWN_KEY)
}

/// Inverse of [`code_of`].
pub fn name_of(code: u32) -> Option<&'static str> {
    KEYS.get(code as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(code_of("A"), code_of("a"));
        assert_eq!(code_of("ArrowUp"), code_of("arrowup"));
        assert_eq!(code_of("ESCAPE"), 12);
    }

    #[test]
    fn arrow_up_is_small_and_distinct() {
        let up = code_of("ArrowUp");
        assert_eq!(up, 7);
        assert_ne!(up, code_of("a"));
    }

    #[test]
    fn unknown_names_are_out_of_range() {
        for name in ["F13", "", "arrow up", "PageDown"] {
            let code = code_of(name);
            assert_eq!(code, UNKNOWN_KEY);
            assert!(code > KEYS.len() as u32);
            assert_eq!(name_of(code), None);
        }
    }

    #[test]
    fn table_round_trips() {
        for (i, name) in KEYS.iter().enumerate() {
            assert_eq!(code_of(name), i as u32);
            assert_eq!(name_of(i as u32), Some(*name));
        }
    }

    #[test]
    fn names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(KEYS.iter().all(|k| seen.insert(*k)));
    }
}
