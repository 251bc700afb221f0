#![allow(dead_code)]

use std::sync::Arc;

use glyphmatch::{
    build_catalog, Catalog, CatalogConfig, FontFamily, GlyphId, GlyphMetrics, GlyphOutline,
    OutlineFont, ReferenceFont, Style, Tier,
};

pub const A_SHAPE: &str = "M 0 1000 L 400 0 L 600 0 L 1000 1000 L 780 1000 L 680 720 L 320 720 L 220 1000 Z M 380 560 L 620 560 L 500 220 Z";
pub const B_SHAPE: &str = "M 0 0 L 600 0 C 900 0 900 480 650 500 C 950 520 950 1000 600 1000 L 0 1000 Z M 200 160 L 200 420 L 560 420 L 560 160 Z M 200 580 L 200 840 L 600 840 L 600 580 Z";
pub const SEVEN_SHAPE: &str = "M 0 0 L 900 0 L 900 160 L 420 1000 L 220 1000 L 680 160 L 0 160 Z";

/// A with its apex pushed 8 units right: a near copy that should still match.
pub const A_NUDGED: &str = "M 0 1000 L 408 0 L 608 0 L 1000 1000 L 780 1000 L 680 720 L 320 720 L 220 1000 Z M 380 560 L 620 560 L 500 220 Z";
/// A with its crossbar and counter moved 80 units down.
pub const A_LOW_BAR: &str = "M 0 1000 L 400 0 L 600 0 L 1000 1000 L 780 1000 L 709 800 L 291 800 L 220 1000 Z M 352 640 L 648 640 L 500 220 Z";
/// 7 with a heavier bar and stem.
pub const SEVEN_HEAVY: &str = "M 0 0 L 900 0 L 900 190 L 450 1000 L 200 1000 L 650 190 L 0 190 Z";

/// Redrawn reference characters, paired with the character they depict.
pub const PERTURBED: [(&str, char); 3] = [(A_NUDGED, 'A'), (A_LOW_BAR, 'A'), (SEVEN_HEAVY, '7')];

/// Four-by-four checkerboard, drawn by no fixture font.
pub fn checkerboard() -> String {
    let mut d = String::new();
    for row in 0..4 {
        for col in 0..4 {
            if (row + col) % 2 == 0 {
                let (x, y) = (col * 250, row * 250);
                d.push_str(&format!(
                    "M {x} {y} L {} {y} L {} {} L {x} {} Z ",
                    x + 250,
                    x + 250,
                    y + 250,
                    y + 250
                ));
            }
        }
    }
    d
}

pub fn fixture_font() -> OutlineFont {
    OutlineFont::new("Fixture Serif Regular")
        .with_version("1.0")
        .with_glyph('A', A_SHAPE)
        .expect("A outline")
        .with_glyph('B', B_SHAPE)
        .expect("B outline")
        .with_glyph('7', SEVEN_SHAPE)
        .expect("7 outline")
}

pub fn fixture_family() -> FontFamily {
    FontFamily::from_fonts(
        "Fixture Serif",
        [(Style::Regular, Arc::new(fixture_font()) as Arc<dyn ReferenceFont>)],
    )
    .expect("fixture family")
}

pub fn catalog_with_tiers(tiers: Vec<Tier>) -> Arc<Catalog> {
    let cfg = CatalogConfig::default().with_tiers(tiers);
    build_catalog(&fixture_family(), &cfg, None).expect("fixture catalog")
}

pub fn fixture_catalog() -> Arc<Catalog> {
    catalog_with_tiers(Tier::default_ladder())
}

pub fn glyph(id: &str, svg: &str) -> GlyphOutline {
    GlyphOutline::from_svg(id.into(), svg, GlyphMetrics::default()).expect("glyph outline")
}

/// `g1` draws A, `g2` draws B, `g3` draws nothing the font has.
pub fn book_glyphs() -> Vec<GlyphOutline> {
    vec![
        glyph("g1", A_SHAPE),
        glyph("g2", B_SHAPE),
        glyph("g3", &checkerboard()),
    ]
}

/// Shapes cycled by [`stream`], with the character each one depicts.
pub fn stream_shapes() -> Vec<(String, Option<char>)> {
    let mut shapes = vec![
        (A_SHAPE.to_string(), Some('A')),
        (B_SHAPE.to_string(), Some('B')),
        (SEVEN_SHAPE.to_string(), Some('7')),
        (checkerboard(), None),
    ];
    shapes.extend(PERTURBED.iter().map(|(svg, c)| (svg.to_string(), Some(*c))));
    shapes
}

/// A larger stream that repeats exact and redrawn fixture glyphs under many
/// ids (`s0000`, `s0001`, ...).
pub fn stream(len: usize) -> Vec<GlyphOutline> {
    let shapes = stream_shapes();
    (0..len)
        .map(|i| glyph(&format!("s{i:04}"), &shapes[i % shapes.len()].0))
        .collect()
}

/// Character drawn by a [`stream`] glyph, or `None` for shapes no font has.
pub fn stream_truth(id: &GlyphId) -> Option<char> {
    let index: usize = id.as_str()[1..].parse().expect("stream id");
    let shapes = stream_shapes();
    shapes[index % shapes.len()].1
}
