use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four standard typographic styles of a font family.
///
/// The declaration order is the tie-break priority: when two candidates are
/// equally close, the earlier style wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Regular = 0,
    Bold = 1,
    Italic = 2,
    BoldItalic = 3,
}

impl Style {
    pub const ALL: [Style; 4] = [Style::Regular, Style::Bold, Style::Italic, Style::BoldItalic];

    /// Tie-break rank; lower wins.
    pub fn priority(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Regular => "regular",
            Style::Bold => "bold",
            Style::Italic => "italic",
            Style::BoldItalic => "bold_italic",
        }
    }

    /// Infer a style from the trailing segment of a font file stem, such as
    /// `Merriweather-BoldItalic` or `Book_Oblique`.
    pub fn from_file_suffix(suffix: &str) -> Option<Style> {
        let normalized: String = suffix
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "regular" | "roman" | "book" | "normal" => Some(Style::Regular),
            "bold" => Some(Style::Bold),
            "italic" | "oblique" => Some(Style::Italic),
            "bolditalic" | "boldoblique" | "italicbold" => Some(Style::BoldItalic),
            _ => None,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
