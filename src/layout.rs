//! Keyboard-layout conversion between the Russian ЙЦУКЕН and the US QWERTY
//! layouts.
//!
//! This is a physical-key substitution, not a phonetic transliteration: the
//! Russian word "печать" typed with the Latin layout active comes out as
//! "gtxfnm", and `latin_to_ru("gtxfnm")` recovers it.

use once_cell::sync::Lazy;
use std::collections::HashMap;

// Same physical keys, position by position. Both directions are derived from
// these strings, so they stay exact inverses of each other.
const LATIN_UNSHIFT: &str = "`qwertyuiop[]asdfghjkl;'zxcvbnm,.";
const RU_UNSHIFT: &str = "ёйцукенгшщзхъфывапролджэячсмитьбю";
const LATIN_SHIFT: &str = "~QWERTYUIOP{}ASDFGHJKL:\"ZXCVBNM<>";
const RU_SHIFT: &str = "ЁЙЦУКЕНГШЩЗХЪФЫВАПРОЛДЖЭЯЧСМИТЬБЮ";

static RU_TO_LATIN: Lazy<HashMap<char, char>> = Lazy::new(|| {
    key_pairs()
        .map(|(latin, ru)| (ru, latin))
        .collect()
});

static LATIN_TO_RU: Lazy<HashMap<char, char>> = Lazy::new(|| key_pairs().collect());

fn key_pairs() -> impl Iterator<Item = (char, char)> {
    LATIN_UNSHIFT
        .chars()
        .zip(RU_UNSHIFT.chars())
        .chain(LATIN_SHIFT.chars().zip(RU_SHIFT.chars()))
}

/// Rewrites Cyrillic letters as the Latin keys that produce them.
/// Anything without a table entry is copied through.
pub fn ru_to_latin(text: &str) -> String {
    text.chars()
        .map(|ch| RU_TO_LATIN.get(&ch).copied().unwrap_or(ch))
        .collect()
}

/// Inverse of [`ru_to_latin`].
pub fn latin_to_ru(text: &str) -> String {
    text.chars()
        .map(|ch| LATIN_TO_RU.get(&ch).copied().unwrap_or(ch))
        .collect()
}

/// True for the 66 Cyrillic letters with a Latin-layout key.
pub fn is_cyrillic_key(ch: char) -> bool {
    RU_TO_LATIN.contains_key(&ch)
}

/// True for the Latin-layout keys that stand in for a Cyrillic letter.
pub fn is_latin_key(ch: char) -> bool {
    LATIN_TO_RU.contains_key(&ch)
}
