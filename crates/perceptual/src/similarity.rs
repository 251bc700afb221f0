//! Windowed structural-similarity distance between two rasters of one tier.
//!
//! Window statistics come from exact integer summed-area tables, so the only
//! floating-point work is the per-window SSIM formula. That formula is built
//! from commutative operations only, which makes `score(a, b)` and
//! `score(b, a)` bit-identical.
//!
//! Rasters are normalized to their ink box, so a placement term built from
//! each raster's em-relative [`raster::Placement`] is added on top of the
//! shape distance.

use raster::RasterImage;

use crate::config::{PerceptualError, SimilarityConfig};
use crate::integral::IntegralImage;

const DYNAMIC_RANGE: f64 = 255.0;

/// Shape distance plus placement penalty; `0.0` means identical.
///
/// The shape part is `1 - mean SSIM`, clamped at zero. Only windows where at
/// least one raster carries ink are averaged, so the empty margin around a
/// glyph does not dilute the score. Two blank rasters are identical and
/// score `0.0`. The placement part is `placement_weight` times the amount
/// by which the rasters' placements differ beyond `placement_tolerance`; it
/// is zero unless both rasters carry a placement.
pub fn score(
    a: &RasterImage,
    b: &RasterImage,
    cfg: &SimilarityConfig,
) -> Result<f64, PerceptualError> {
    cfg.validate()?;
    if a.tier() != b.tier() {
        return Err(PerceptualError::TierMismatch {
            left: a.tier(),
            right: b.tier(),
        });
    }
    let side = a.side();
    if cfg.window > side {
        return Err(PerceptualError::WindowTooLarge {
            window: cfg.window,
            side,
        });
    }

    let sum_a = IntegralImage::of_pixels(side, a.pixels());
    let sum_b = IntegralImage::of_pixels(side, b.pixels());
    let sum_aa = IntegralImage::of_squares(side, a.pixels());
    let sum_bb = IntegralImage::of_squares(side, b.pixels());
    let sum_ab = IntegralImage::of_products(side, a.pixels(), b.pixels());

    let c1 = (cfg.k1 * DYNAMIC_RANGE).powi(2);
    let c2 = (cfg.k2 * DYNAMIC_RANGE).powi(2);
    let n = (cfg.window * cfg.window) as f64;

    let mut total = 0.0f64;
    let mut windows = 0usize;
    let last = side - cfg.window;
    for y in (0..=last).step_by(cfg.stride) {
        for x in (0..=last).step_by(cfg.stride) {
            let (x1, y1) = (x + cfg.window, y + cfg.window);
            let sa = sum_a.sum(x, y, x1, y1);
            let sb = sum_b.sum(x, y, x1, y1);
            if sa == 0 && sb == 0 {
                continue;
            }
            let mu_a = sa as f64 / n;
            let mu_b = sb as f64 / n;
            let mu_ab = mu_a * mu_b;
            let var_a = sum_aa.sum(x, y, x1, y1) as f64 / n - mu_a * mu_a;
            let var_b = sum_bb.sum(x, y, x1, y1) as f64 / n - mu_b * mu_b;
            let cov = sum_ab.sum(x, y, x1, y1) as f64 / n - mu_ab;

            let numerator = (2.0 * mu_ab + c1) * (2.0 * cov + c2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2);
            total += numerator / denominator;
            windows += 1;
        }
    }

    let shape = if windows == 0 {
        0.0
    } else {
        (1.0 - total / windows as f64).max(0.0)
    };
    Ok(shape + placement_penalty(a, b, cfg))
}

fn placement_penalty(a: &RasterImage, b: &RasterImage, cfg: &SimilarityConfig) -> f64 {
    match (a.placement(), b.placement()) {
        (Some(pa), Some(pb)) => {
            cfg.placement_weight * (pa.distance(pb) - cfg.placement_tolerance).max(0.0)
        }
        _ => 0.0,
    }
}
