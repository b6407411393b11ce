//! Grid partitioning of the square extent around the radar.
//!
//! Each axis gets boundaries at whole multiples of its step inside the
//! range, mirrored about the radar. Adjacent boundaries delimit a tile;
//! the last boundary of an axis has no successor and yields sentinel cells.

use serde::{Deserialize, Serialize};

use radar_common::{AxisSpan, TileCell, TileError, TileResult};

/// Extent and per-axis step sizes of the tile grid, in km.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub range_km: f64,
    pub x_step_km: f64,
    pub y_step_km: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            range_km: 230.0,
            x_step_km: 44.5,
            y_step_km: 55.5,
        }
    }
}

impl GridSpec {
    pub fn x_boundaries(&self) -> TileResult<Vec<f64>> {
        build_axis_boundaries(self.x_step_km, self.range_km)
    }

    pub fn y_boundaries(&self) -> TileResult<Vec<f64>> {
        build_axis_boundaries(self.y_step_km, self.range_km)
    }

    /// Every cell of the grid, sentinels included.
    pub fn cells(&self) -> TileResult<Vec<TileCell>> {
        Ok(enumerate_cells(&self.x_boundaries()?, &self.y_boundaries()?))
    }
}

/// Boundaries `-k*step ..= k*step` for every `k*step < range`, ascending.
///
/// Multiples are computed directly rather than accumulated so the
/// positive and negative halves mirror exactly.
pub fn build_axis_boundaries(step: f64, range: f64) -> TileResult<Vec<f64>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(TileError::Config(format!("Axis step must be positive, got {}", step)));
    }
    if !range.is_finite() || range <= 0.0 {
        return Err(TileError::Config(format!("Axis range must be positive, got {}", range)));
    }

    let positive: Vec<f64> = (0u32..)
        .map(|k| k as f64 * step)
        .take_while(|&v| v < range)
        .collect();

    let mut boundaries: Vec<f64> = positive
        .iter()
        .map(|&v| -v)
        .chain(positive.iter().copied())
        // -0.0 + 0.0 == +0.0
        .map(|v| v + 0.0)
        .collect();
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup();

    Ok(boundaries)
}

/// Cross product of the two boundary lists, row-major.
///
/// Row `i` (1-based) spans `xs[i-1]..xs[i]`, column `j` spans
/// `ys[j-1]..ys[j]`. The last row and last column are sentinels.
pub fn enumerate_cells(xs: &[f64], ys: &[f64]) -> Vec<TileCell> {
    let x_spans = spans(xs);
    let y_spans = spans(ys);

    let mut cells = Vec::with_capacity(x_spans.len() * y_spans.len());
    for (i, x) in x_spans.iter().enumerate() {
        for (j, y) in y_spans.iter().enumerate() {
            cells.push(TileCell::new(i as u32 + 1, j as u32 + 1, *x, *y));
        }
    }
    cells
}

fn spans(boundaries: &[f64]) -> Vec<AxisSpan> {
    boundaries
        .iter()
        .enumerate()
        .map(|(i, &low)| AxisSpan::new(low, boundaries.get(i + 1).copied()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_zero() {
        let b = build_axis_boundaries(10.0, 25.0).unwrap();
        assert_eq!(b, vec![-20.0, -10.0, 0.0, 10.0, 20.0]);
        assert!(b[2].is_sign_positive());
    }

    #[test]
    fn test_range_is_exclusive() {
        let b = build_axis_boundaries(10.0, 20.0).unwrap();
        assert_eq!(b, vec![-10.0, 0.0, 10.0]);
    }

    #[test]
    fn test_step_wider_than_range() {
        assert_eq!(build_axis_boundaries(500.0, 230.0).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        for (step, range) in [(0.0, 230.0), (-1.0, 230.0), (f64::NAN, 230.0), (44.5, 0.0), (44.5, f64::INFINITY)] {
            let err = build_axis_boundaries(step, range).unwrap_err();
            assert!(matches!(err, TileError::Config(_)));
        }
    }

    #[test]
    fn test_spans_mark_last_open() {
        let s = spans(&[-1.0, 0.0, 1.0]);
        assert_eq!(s[0], AxisSpan::closed(-1.0, 0.0));
        assert_eq!(s[2], AxisSpan::new(1.0, None));
    }
}
