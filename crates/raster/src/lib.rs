//! # Glyph Rasterizer
//!
//! Converts a glyph's vector outline into a fixed-size filled bitmap at one
//! of a small set of resolution tiers.
//!
//! ## Contract
//!
//! - The same normalization rule applies to unknown glyphs and to reference
//!   characters: the outline's exact bounding box is scaled uniformly so its
//!   longer side spans the tier square minus [`RasterConfig::padding`] on each
//!   edge, then centered on both axes. Identical shapes therefore produce
//!   pixel-aligned bitmaps at the same tier regardless of their source units
//!   or origin.
//! - Position is not lost: every raster carries the outline's
//!   [`Placement`] inside its em square ([`GlyphMetrics::em`]), so glyphs
//!   that share a shape but not a baseline position (`,` and `’`) still
//!   compare apart downstream.
//! - Filling uses the nonzero winding rule.
//! - Failures ([`RenderError`]) are terminal for the glyph: a malformed,
//!   empty, or zero-area outline fails identically at every tier.
//!
//! ## Example
//!
//! ```
//! use raster::{rasterize, GlyphMetrics, GlyphOutline, RasterConfig, Tier};
//!
//! let square = GlyphOutline::from_svg(
//!     "g1".into(),
//!     "M 0 0 L 100 0 L 100 100 L 0 100 Z",
//!     GlyphMetrics::default(),
//! )
//! .unwrap();
//!
//! let image = rasterize(&square, Tier::T128, &RasterConfig::default()).unwrap();
//! assert_eq!(image.side(), 128);
//! assert_eq!(image.get(64, 64), 255);
//! assert_eq!(image.get(2, 2), 0);
//! ```
pub mod config;
pub mod error;
pub mod types;

use kurbo::{Affine, BezPath, PathEl};
use tiny_skia::{FillRule, Mask, PathBuilder, Transform};

pub use crate::config::RasterConfig;
pub use crate::error::RenderError;
pub use crate::types::{
    Bounds, EmBox, GlyphId, GlyphMetrics, GlyphOutline, Placement, RasterImage, Tier,
};

/// Extent below which an outline axis is considered collapsed.
const DEGENERATE_EXTENT: f64 = 1e-9;

/// Rasterize `outline` into a `tier.side()`-square coverage bitmap.
pub fn rasterize(
    outline: &GlyphOutline,
    tier: Tier,
    cfg: &RasterConfig,
) -> Result<RasterImage, RenderError> {
    cfg.validate()?;
    let id = outline.id().to_string();

    if outline.is_empty() {
        return Err(RenderError::EmptyOutline { id });
    }
    if !outline.has_finite_coordinates() {
        return Err(RenderError::NonFiniteCoordinates { id });
    }

    let Some(bbox) = outline.bounding_box() else {
        return Err(RenderError::EmptyOutline { id });
    };
    let (width, height) = (bbox.width(), bbox.height());
    if width <= DEGENERATE_EXTENT && height <= DEGENERATE_EXTENT {
        return Err(RenderError::DegenerateBounds { id, width, height });
    }

    let side = f64::from(tier.side());
    let inner = side * (1.0 - 2.0 * f64::from(cfg.padding));
    let scale = inner / width.max(height);
    let tx = (side - width * scale) / 2.0 - bbox.x0 * scale;
    let ty = (side - height * scale) / 2.0 - bbox.y0 * scale;
    let normalize = Affine::translate((tx, ty)) * Affine::scale(scale);

    let Some(path) = to_fill_path(outline.path(), normalize) else {
        return Err(RenderError::UnfillablePath { id });
    };
    let Some(mut mask) = Mask::new(tier.side(), tier.side()) else {
        return Err(RenderError::UnfillablePath { id });
    };
    mask.fill_path(&path, FillRule::Winding, cfg.anti_alias, Transform::identity());

    let pixels = mask.data().to_vec();
    if pixels.iter().all(|&p| p == 0) {
        return Err(RenderError::NothingFilled { id, tier });
    }

    tracing::trace!(glyph_id = %outline.id(), tier = %tier, "glyph_rasterized");
    Ok(RasterImage::from_pixels(tier, pixels)?.with_placement(outline.placement()))
}

/// Convert a kurbo path into a tiny-skia path, applying `affine` to every
/// point. Returns `None` when tiny-skia rejects the geometry.
fn to_fill_path(path: &BezPath, affine: Affine) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let p = affine * p;
                builder.move_to(p.x as f32, p.y as f32);
            }
            PathEl::LineTo(p) => {
                let p = affine * p;
                builder.line_to(p.x as f32, p.y as f32);
            }
            PathEl::QuadTo(c, p) => {
                let (c, p) = (affine * c, affine * p);
                builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32);
            }
            PathEl::CurveTo(c1, c2, p) => {
                let (c1, c2, p) = (affine * c1, affine * c2, affine * p);
                builder.cubic_to(
                    c1.x as f32,
                    c1.y as f32,
                    c2.x as f32,
                    c2.y as f32,
                    p.x as f32,
                    p.y as f32,
                );
            }
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(id: &str, d: &str) -> GlyphOutline {
        GlyphOutline::from_svg(id.into(), d, GlyphMetrics::default()).unwrap()
    }

    fn ink_diff(a: &RasterImage, b: &RasterImage) -> usize {
        a.pixels()
            .iter()
            .zip(b.pixels())
            .filter(|(x, y)| x.abs_diff(**y) > 32)
            .count()
    }

    #[test]
    fn square_is_centered_with_padding() {
        let img = rasterize(
            &outline("sq", "M 0 0 L 10 0 L 10 10 L 0 10 Z"),
            Tier::T128,
            &RasterConfig::default(),
        )
        .unwrap();
        // 1/16 of 128 = 8px margin on every edge.
        assert!(img.get(6, 64) < 32);
        assert!(img.get(9, 64) > 224);
        assert!(img.get(118, 64) > 224);
        assert!(img.get(121, 64) < 32);
        assert!(img.get(64, 6) < 32);
        assert!(img.get(64, 121) < 32);
        assert_eq!(img.get(64, 64), 255);
    }

    #[test]
    fn aspect_ratio_is_preserved() {
        let img = rasterize(
            &outline("bar", "M 0 0 L 100 0 L 100 20 L 0 20 Z"),
            Tier::T128,
            &RasterConfig::default(),
        )
        .unwrap();
        // A 5:1 bar keeps empty rows above and below it.
        assert_eq!(img.get(64, 20), 0);
        assert_eq!(img.get(64, 64), 255);
        assert_eq!(img.get(64, 108), 0);
    }

    #[test]
    fn translated_and_scaled_copies_align() {
        let cfg = RasterConfig::default();
        let base = rasterize(
            &outline("a", "M 0 0 L 60 0 L 30 90 Z"),
            Tier::T256,
            &cfg,
        )
        .unwrap();
        let moved = rasterize(
            &outline("b", "M 1000 -500 L 1120 -500 L 1060 -320 Z"),
            Tier::T256,
            &cfg,
        )
        .unwrap();
        assert!(ink_diff(&base, &moved) <= 4);
    }

    #[test]
    fn shifted_copy_keeps_bitmap_but_not_placement() {
        let cfg = RasterConfig::default();
        let low = rasterize(&outline("low", "M 100 700 L 200 700 L 200 950 Z"), Tier::T128, &cfg)
            .unwrap();
        let high = rasterize(&outline("high", "M 100 0 L 200 0 L 200 250 Z"), Tier::T128, &cfg)
            .unwrap();
        assert!(ink_diff(&low, &high) <= 4);
        let (lp, hp) = (low.placement().unwrap(), high.placement().unwrap());
        assert!((lp.top - 0.7).abs() < 1e-6);
        assert_eq!(hp.top, 0.0);
        assert_ne!(low, high);
    }

    #[test]
    fn nonzero_rule_keeps_counter_wound_holes() {
        // Outer square clockwise, inner square counter-clockwise.
        let ring = outline(
            "ring",
            "M 0 0 L 100 0 L 100 100 L 0 100 Z M 30 30 L 30 70 L 70 70 L 70 30 Z",
        );
        let img = rasterize(&ring, Tier::T128, &RasterConfig::default()).unwrap();
        assert_eq!(img.get(64, 64), 0);
        assert_eq!(img.get(12, 64), 255);
    }

    #[test]
    fn nonzero_rule_fills_same_wound_overlap() {
        let doubled = outline(
            "dbl",
            "M 0 0 L 100 0 L 100 100 L 0 100 Z M 30 30 L 70 30 L 70 70 L 30 70 Z",
        );
        let img = rasterize(&doubled, Tier::T128, &RasterConfig::default()).unwrap();
        assert_eq!(img.get(64, 64), 255);
    }

    #[test]
    fn empty_outline_fails() {
        let err = rasterize(&outline("e", ""), Tier::T128, &RasterConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::EmptyOutline { .. }));
    }

    #[test]
    fn single_point_is_degenerate() {
        let err = rasterize(
            &outline("p", "M 5 5 L 5 5 Z"),
            Tier::T128,
            &RasterConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::DegenerateBounds { .. }));
    }

    #[test]
    fn zero_area_line_fills_nothing() {
        let err = rasterize(
            &outline("line", "M 0 0 L 100 0"),
            Tier::T128,
            &RasterConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RenderError::NothingFilled { .. } | RenderError::UnfillablePath { .. }
        ));
    }

    #[test]
    fn non_finite_coordinates_fail() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((f64::NAN, 10.0));
        path.line_to((10.0, 10.0));
        path.close_path();
        let glyph = GlyphOutline::new("nan".into(), path, GlyphMetrics::default());
        let err = rasterize(&glyph, Tier::T128, &RasterConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::NonFiniteCoordinates { .. }));
    }

    #[test]
    fn rasterization_is_deterministic() {
        let glyph = outline("q", "M 0 0 Q 50 -40 100 0 L 100 80 C 60 120 40 120 0 80 Z");
        let cfg = RasterConfig::default();
        let a = rasterize(&glyph, Tier::T512, &cfg).unwrap();
        let b = rasterize(&glyph, Tier::T512, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let glyph = outline("sq", "M 0 0 L 10 0 L 10 10 Z");
        let cfg = RasterConfig::default().with_padding(0.9);
        assert!(matches!(
            rasterize(&glyph, Tier::T128, &cfg),
            Err(RenderError::InvalidConfig(_))
        ));
    }
}
