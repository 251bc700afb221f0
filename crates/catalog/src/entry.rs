use std::fmt;

use perceptual::PerceptualHash;
use raster::{RasterImage, Tier};
use serde::{Deserialize, Serialize};

use crate::style::Style;

/// A (character, style) pair; orders by code point, then style priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceKey {
    pub character: char,
    pub style: Style,
}

impl ReferenceKey {
    pub fn new(character: char, style: Style) -> Self {
        Self { character, style }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U+{:04X}/{}", u32::from(self.character), self.style)
    }
}

/// Raster and hash of one reference character at one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub key: ReferenceKey,
    pub raster: RasterImage,
    pub hash: PerceptualHash,
}

/// Every entry of the catalog at a single tier, sorted by key.
#[derive(Debug, Clone, PartialEq)]
pub struct TierCatalog {
    tier: Tier,
    entries: Vec<ReferenceEntry>,
}

impl TierCatalog {
    pub(crate) fn new(tier: Tier, mut entries: Vec<ReferenceEntry>) -> Self {
        entries.sort_by_key(|e| e.key);
        entries.dedup_by_key(|e| e.key);
        Self { tier, entries }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ReferenceKey) -> Option<&ReferenceEntry> {
        self.entries
            .binary_search_by_key(key, |e| e.key)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub(crate) fn into_entries(self) -> Vec<ReferenceEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_by_code_point_then_style() {
        let mut keys = vec![
            ReferenceKey::new('b', Style::Regular),
            ReferenceKey::new('a', Style::Bold),
            ReferenceKey::new('a', Style::Regular),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ReferenceKey::new('a', Style::Regular),
                ReferenceKey::new('a', Style::Bold),
                ReferenceKey::new('b', Style::Regular),
            ]
        );
    }

    #[test]
    fn key_display_is_code_point_and_style() {
        assert_eq!(ReferenceKey::new('A', Style::Italic).to_string(), "U+0041/italic");
    }
}
