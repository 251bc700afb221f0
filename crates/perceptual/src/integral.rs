//! Summed-area tables over raster coverage.
//!
//! Every box sum in this crate goes through an [`IntegralImage`], so cell
//! averages and window statistics are exact integers regardless of how the
//! boxes overlap.

/// Summed-area table with one row and one column of zero padding.
///
/// `table[(y + 1) * (side + 1) + (x + 1)]` holds the sum of every value in
/// the rectangle `[0, x] x [0, y]`.
#[derive(Debug, Clone)]
pub(crate) struct IntegralImage {
    side: usize,
    table: Vec<u64>,
}

impl IntegralImage {
    /// Build from a row-major square of `side * side` values.
    pub(crate) fn from_values<I>(side: usize, values: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let stride = side + 1;
        let mut table = vec![0u64; stride * stride];
        let mut values = values.into_iter();
        for y in 0..side {
            let mut row_sum = 0u64;
            for x in 0..side {
                row_sum += values.next().unwrap_or(0);
                table[(y + 1) * stride + (x + 1)] = table[y * stride + (x + 1)] + row_sum;
            }
        }
        Self { side, table }
    }

    pub(crate) fn of_pixels(side: usize, pixels: &[u8]) -> Self {
        Self::from_values(side, pixels.iter().map(|&p| u64::from(p)))
    }

    pub(crate) fn of_squares(side: usize, pixels: &[u8]) -> Self {
        Self::from_values(side, pixels.iter().map(|&p| u64::from(p) * u64::from(p)))
    }

    pub(crate) fn of_products(side: usize, a: &[u8], b: &[u8]) -> Self {
        Self::from_values(
            side,
            a.iter().zip(b).map(|(&p, &q)| u64::from(p) * u64::from(q)),
        )
    }

    /// Sum over the half-open box `[x0, x1) x [y0, y1)`.
    pub(crate) fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let stride = self.side + 1;
        let (x1, y1) = (x1.min(self.side), y1.min(self.side));
        if x0 >= x1 || y0 >= y1 {
            return 0;
        }
        self.table[y1 * stride + x1] + self.table[y0 * stride + x0]
            - self.table[y0 * stride + x1]
            - self.table[y1 * stride + x0]
    }
}
