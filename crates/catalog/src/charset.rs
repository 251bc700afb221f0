//! Character-set selection for catalog builds.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Frequent non-ASCII characters in book text: typographic punctuation,
/// currency and a handful of Latin-1 letters.
const CURATED_EXTRA: &[char] = &[
    '\u{00A1}', // ¡
    '\u{00A7}', // §
    '\u{00A9}', // ©
    '\u{00AB}', // «
    '\u{00AE}', // ®
    '\u{00B0}', // °
    '\u{00B6}', // ¶
    '\u{00B7}', // ·
    '\u{00BB}', // »
    '\u{00BF}', // ¿
    '\u{00C0}', '\u{00C9}', '\u{00E0}', '\u{00E1}', '\u{00E2}', '\u{00E4}', '\u{00E7}',
    '\u{00E8}', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00F1}', '\u{00F3}', '\u{00F4}', '\u{00F6}', '\u{00FA}', '\u{00FC}',
    '\u{2013}', // –
    '\u{2014}', // —
    '\u{2018}', // ‘
    '\u{2019}', // ’
    '\u{201C}', // “
    '\u{201D}', // ”
    '\u{2020}', // †
    '\u{2021}', // ‡
    '\u{2022}', // •
    '\u{2026}', // …
    '\u{2032}', // ′
    '\u{2033}', // ″
    '\u{20AC}', // €
    '\u{2122}', // ™
];

/// Which characters of a reference font enter the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterSet {
    /// Printable ASCII plus frequent punctuation and symbols.
    #[default]
    Curated,
    /// Every character the font maps.
    Full,
}

impl CharacterSet {
    pub fn as_str(self) -> &'static str {
        match self {
            CharacterSet::Curated => "curated",
            CharacterSet::Full => "full",
        }
    }

    /// The fixed curated list, ascending by code point.
    pub fn curated() -> Vec<char> {
        let mut chars: BTreeSet<char> = ('\u{21}'..='\u{7E}').collect();
        chars.extend(CURATED_EXTRA.iter().copied());
        chars.into_iter().collect()
    }

    /// Restrict `available` (a font's mapped characters) to this set.
    ///
    /// Whitespace and control characters draw nothing and are always
    /// dropped. The result is sorted and free of duplicates.
    pub fn select(self, available: &[char]) -> Vec<char> {
        let drawable = available
            .iter()
            .copied()
            .filter(|c| !c.is_whitespace() && !c.is_control());
        match self {
            CharacterSet::Full => drawable.collect::<BTreeSet<_>>().into_iter().collect(),
            CharacterSet::Curated => {
                let curated: BTreeSet<char> = Self::curated().into_iter().collect();
                drawable
                    .filter(|c| curated.contains(c))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            }
        }
    }
}
