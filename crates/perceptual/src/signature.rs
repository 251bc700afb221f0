//! Coarse-grid signatures: average bits plus horizontal and vertical
//! gradient bits.
//!
//! The raster is reduced to cell means with an [`IntegralImage`]. Cell `i` of
//! an `n`-cell axis over a `side`-pixel raster spans
//! `[i * side / n, (i + 1) * side / n)`, so cells never overlap and always
//! cover the whole raster.

use raster::RasterImage;

use crate::integral::IntegralImage;

/// Mean coverage of every cell in a `cols x rows` grid, row-major.
pub(crate) fn cell_means(integral: &IntegralImage, side: usize, cols: usize, rows: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        let (y0, y1) = (r * side / rows, (r + 1) * side / rows);
        for c in 0..cols {
            let (x0, x1) = (c * side / cols, (c + 1) * side / cols);
            let area = ((x1 - x0) * (y1 - y0)).max(1) as f64;
            out.push(integral.sum(x0, y0, x1, y1) as f64 / area);
        }
    }
    out
}

/// `grid * grid` bits: a cell is set when it is darker (more ink) than the
/// mean of all cells.
pub(crate) fn average_bits(integral: &IntegralImage, side: usize, grid: usize) -> Vec<bool> {
    let cells = cell_means(integral, side, grid, grid);
    let mean = cells.iter().sum::<f64>() / cells.len() as f64;
    cells.into_iter().map(|cell| cell > mean).collect()
}

/// `grid * grid` bits from a `(grid + 1) x grid` grid: a bit is set when a
/// cell's right neighbour holds more ink than the cell itself.
pub(crate) fn horizontal_gradient_bits(
    integral: &IntegralImage,
    side: usize,
    grid: usize,
) -> Vec<bool> {
    let cols = grid + 1;
    let cells = cell_means(integral, side, cols, grid);
    let mut out = Vec::with_capacity(grid * grid);
    for r in 0..grid {
        for c in 0..grid {
            out.push(cells[r * cols + c + 1] > cells[r * cols + c]);
        }
    }
    out
}

/// `grid * grid` bits from a `grid x (grid + 1)` grid: a bit is set when the
/// cell below holds more ink than the cell itself.
pub(crate) fn vertical_gradient_bits(integral: &IntegralImage, side: usize, grid: usize) -> Vec<bool> {
    let cells = cell_means(integral, side, grid, grid + 1);
    let mut out = Vec::with_capacity(grid * grid);
    for r in 0..grid {
        for c in 0..grid {
            out.push(cells[(r + 1) * grid + c] > cells[r * grid + c]);
        }
    }
    out
}

/// Full signature in fixed order: average, horizontal, vertical.
pub(crate) fn signature_bits(image: &RasterImage, grid: usize) -> Vec<bool> {
    let side = image.side();
    let integral = IntegralImage::of_pixels(side, image.pixels());
    let mut bits = Vec::with_capacity(3 * grid * grid);
    bits.extend(average_bits(&integral, side, grid));
    bits.extend(horizontal_gradient_bits(&integral, side, grid));
    bits.extend(vertical_gradient_bits(&integral, side, grid));
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster::Tier;

    fn image_with(side: u32, ink: impl Fn(usize, usize) -> u8) -> RasterImage {
        let s = side as usize;
        let pixels = (0..s * s).map(|i| ink(i % s, i / s)).collect();
        RasterImage::from_pixels(Tier::new(side).unwrap(), pixels).unwrap()
    }

    #[test]
    fn cells_cover_uneven_sides() {
        let side = 10;
        let integral = IntegralImage::of_pixels(side, &[4u8; 100]);
        let cells = cell_means(&integral, side, 3, 3);
        assert_eq!(cells.len(), 9);
        assert!(cells.iter().all(|&c| (c - 4.0).abs() < 1e-12));
    }

    #[test]
    fn left_half_ink_sets_left_average_bits() {
        let image = image_with(32, |x, _| if x < 16 { 255 } else { 0 });
        let side = image.side();
        let integral = IntegralImage::of_pixels(side, image.pixels());
        let bits = average_bits(&integral, side, 4);
        for r in 0..4 {
            assert!(bits[r * 4] && bits[r * 4 + 1]);
            assert!(!bits[r * 4 + 2] && !bits[r * 4 + 3]);
        }
    }

    #[test]
    fn vertical_edge_shows_in_horizontal_gradient_only() {
        let image = image_with(32, |x, _| if x >= 16 { 255 } else { 0 });
        let bits = signature_bits(&image, 4);
        let (horizontal, vertical) = (&bits[16..32], &bits[32..48]);
        assert!(horizontal.iter().any(|&b| b));
        assert!(vertical.iter().all(|&b| !b));
    }

    #[test]
    fn blank_raster_has_no_bits() {
        let image = image_with(32, |_, _| 0);
        assert!(signature_bits(&image, 4).iter().all(|&b| !b));
    }

    #[test]
    fn signature_length_is_three_grids() {
        let image = image_with(64, |x, y| ((x * y) % 256) as u8);
        assert_eq!(signature_bits(&image, 8).len(), 3 * 64);
    }
}
