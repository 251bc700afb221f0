//! Glyph outline, tier, and raster types.
//!
//! `GlyphOutline` is immutable once constructed. `RasterImage` is a square
//! coverage bitmap whose side is fixed by its [`Tier`]; images are only
//! comparable with other images of the same tier.
//!
//! Rasters normalize the ink box away, so where the ink sits inside the em
//! square travels next to the bitmap as a [`Placement`].

use std::fmt;

use kurbo::{Affine, BezPath, PathEl, Rect, Shape};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RenderError;

/// Opaque, stable identifier for one obfuscated glyph shape within a book.
///
/// Upstream sources emit either numeric or string identifiers; both are
/// stored as text so ids from different batches compare consistently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GlyphId(String);

impl GlyphId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlyphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GlyphId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GlyphId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for GlyphId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for GlyphId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => GlyphId(n.to_string()),
            RawId::Text(s) => GlyphId(s),
        })
    }
}

/// Axis-aligned bounds reported by the content source, in outline units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// The em square an outline is drawn in, in y-down outline units.
///
/// The left edge is the glyph origin (`x = 0`); `top` is the y coordinate of
/// the ascender line, so a baseline-origin outline has `top = -ascender`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmBox {
    pub units_per_em: f32,
    pub top: f32,
}

impl EmBox {
    pub fn new(units_per_em: f32, top: f32) -> Result<Self, RenderError> {
        let em = Self { units_per_em, top };
        em.validate()?;
        Ok(em)
    }

    /// Em box of a baseline-origin outline with the given ascender.
    pub fn from_ascender(units_per_em: f32, ascender: f32) -> Result<Self, RenderError> {
        Self::new(units_per_em, -ascender)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if !(self.units_per_em.is_finite() && self.units_per_em > 0.0) || !self.top.is_finite() {
            return Err(RenderError::InvalidConfig(format!(
                "em box needs finite units_per_em > 0 and a finite top (got {} / {})",
                self.units_per_em, self.top
            )));
        }
        Ok(())
    }
}

impl Default for EmBox {
    /// A 1000-unit em whose top edge sits at `y = 0`, the usual frame for
    /// glyph paths exported as SVG.
    fn default() -> Self {
        Self {
            units_per_em: 1000.0,
            top: 0.0,
        }
    }
}

/// Layout metrics delivered alongside an outline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GlyphMetrics {
    /// Horizontal advance in outline units; `0.0` when unknown.
    pub advance_width: f32,
    /// Source-reported bounds; placement is measured from the path itself,
    /// so these are only kept for diagnostics.
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Em square of the outline; [`EmBox::default`] when absent.
    #[serde(default)]
    pub em: Option<EmBox>,
}

impl GlyphMetrics {
    pub fn with_advance(mut self, advance_width: f32) -> Self {
        self.advance_width = advance_width;
        self
    }

    pub fn with_em(mut self, em: EmBox) -> Self {
        self.em = Some(em);
        self
    }

    pub fn em_box(&self) -> EmBox {
        self.em.unwrap_or_default()
    }
}

/// Where a glyph's ink box sits in its em square, in em units.
///
/// `left` is measured from the origin, `top` from the ascender line, both
/// growing right and down. Two glyphs with one shape at different heights
/// (`,` and `’`) rasterize alike but differ here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Advance width, when the source reported one.
    #[serde(default)]
    pub advance: Option<f32>,
}

impl Placement {
    /// Largest per-field difference between two placements. Advances only
    /// count when both sides report one.
    pub fn distance(&self, other: &Placement) -> f64 {
        let mut d = [
            self.left - other.left,
            self.top - other.top,
            self.width - other.width,
            self.height - other.height,
        ]
        .iter()
        .fold(0.0f32, |acc, v| acc.max(v.abs()));
        if let (Some(a), Some(b)) = (self.advance, other.advance) {
            d = d.max((a - b).abs());
        }
        f64::from(d)
    }
}

/// An unknown (or reference) glyph's vector path plus its metrics.
///
/// Paths use a y-down coordinate system, the SVG convention. Sources with an
/// upward y axis go through [`GlyphOutline::flipped_y`] first.
#[derive(Debug, Clone)]
pub struct GlyphOutline {
    id: GlyphId,
    path: BezPath,
    metrics: GlyphMetrics,
}

impl GlyphOutline {
    pub fn new(id: GlyphId, path: BezPath, metrics: GlyphMetrics) -> Self {
        Self { id, path, metrics }
    }

    /// Parse SVG path data (`M`, `L`, `H`, `V`, `Q`, `C`, `Z` and their
    /// relative forms).
    pub fn from_svg(
        id: GlyphId,
        data: &str,
        metrics: GlyphMetrics,
    ) -> Result<Self, RenderError> {
        let path = BezPath::from_svg(data.trim()).map_err(|err| RenderError::InvalidPathData {
            id: id.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self::new(id, path, metrics))
    }

    pub fn id(&self) -> &GlyphId {
        &self.id
    }

    pub fn path(&self) -> &BezPath {
        &self.path
    }

    pub fn metrics(&self) -> &GlyphMetrics {
        &self.metrics
    }

    /// Ink box relative to the em square, or `None` for empty outlines or a
    /// malformed em box.
    pub fn placement(&self) -> Option<Placement> {
        let em = self.metrics.em_box();
        em.validate().ok()?;
        let bbox = self.bounding_box()?;
        let upem = f64::from(em.units_per_em);
        let advance = (self.metrics.advance_width.is_finite() && self.metrics.advance_width > 0.0)
            .then(|| self.metrics.advance_width / em.units_per_em);
        Some(Placement {
            left: (bbox.x0 / upem) as f32,
            top: ((bbox.y0 - f64::from(em.top)) / upem) as f32,
            width: (bbox.width() / upem) as f32,
            height: (bbox.height() / upem) as f32,
            advance,
        })
    }

    /// True when the path draws no segment at all.
    pub fn is_empty(&self) -> bool {
        self.path
            .elements()
            .iter()
            .all(|el| matches!(el, PathEl::MoveTo(_) | PathEl::ClosePath))
    }

    /// Exact bounds of the drawn path, or `None` for empty outlines.
    pub fn bounding_box(&self) -> Option<Rect> {
        if self.is_empty() {
            None
        } else {
            Some(self.path.bounding_box())
        }
    }

    /// Mirror the outline vertically, converting y-up font units to y-down.
    /// The em box is left alone; it is always given in y-down units.
    pub fn flipped_y(mut self) -> Self {
        self.path.apply_affine(Affine::FLIP_Y);
        self
    }

    pub(crate) fn has_finite_coordinates(&self) -> bool {
        self.path.elements().iter().all(|el| match *el {
            PathEl::MoveTo(p) | PathEl::LineTo(p) => p.is_finite(),
            PathEl::QuadTo(a, b) => a.is_finite() && b.is_finite(),
            PathEl::CurveTo(a, b, c) => a.is_finite() && b.is_finite() && c.is_finite(),
            PathEl::ClosePath => true,
        })
    }
}

/// One of a small set of fixed square raster resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Tier(u32);

impl Tier {
    /// Smallest side the hash and scorer windows can work with.
    pub const MIN_SIDE: u32 = 32;

    pub const T128: Tier = Tier(128);
    pub const T256: Tier = Tier(256);
    pub const T512: Tier = Tier(512);

    pub fn new(side: u32) -> Result<Self, RenderError> {
        if side < Self::MIN_SIDE {
            return Err(RenderError::InvalidTier {
                side,
                min: Self::MIN_SIDE,
            });
        }
        Ok(Self(side))
    }

    /// Side length in pixels.
    pub fn side(self) -> u32 {
        self.0
    }

    pub fn pixel_count(self) -> usize {
        (self.0 as usize) * (self.0 as usize)
    }

    /// The default escalation ladder: 128 → 256 → 512.
    pub fn default_ladder() -> Vec<Tier> {
        vec![Tier::T128, Tier::T256, Tier::T512]
    }
}

impl TryFrom<u32> for Tier {
    type Error = RenderError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Tier::new(value)
    }
}

impl From<Tier> for u32 {
    fn from(value: Tier) -> Self {
        value.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

/// Square coverage bitmap: `0` is background, `255` is full ink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterImage {
    tier: Tier,
    pixels: Vec<u8>,
    #[serde(default)]
    placement: Option<Placement>,
}

impl RasterImage {
    /// Wrap an existing row-major buffer of `side * side` coverage values.
    pub fn from_pixels(tier: Tier, pixels: Vec<u8>) -> Result<Self, RenderError> {
        if pixels.len() != tier.pixel_count() {
            return Err(RenderError::BufferSize {
                side: tier.side(),
                expected: tier.pixel_count(),
                actual: pixels.len(),
            });
        }
        Ok(Self {
            tier,
            pixels,
            placement: None,
        })
    }

    pub fn with_placement(mut self, placement: Option<Placement>) -> Self {
        self.placement = placement;
        self
    }

    /// Where the rasterized ink sat in its em square.
    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn side(&self) -> usize {
        self.tier.side() as usize
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Coverage at `(x, y)`; out-of-range coordinates read as background.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        let side = self.side();
        if x >= side || y >= side {
            return 0;
        }
        self.pixels[y * side + x]
    }

    /// Number of pixels with any coverage.
    pub fn ink_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&p| p > 0).count()
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }
}
