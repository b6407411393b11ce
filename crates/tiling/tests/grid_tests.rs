//! Grid partitioner properties.

use tiling::{build_axis_boundaries, enumerate_cells, GridSpec};

#[test]
fn test_default_x_axis_literal() {
    let xs = build_axis_boundaries(44.5, 230.0).unwrap();
    assert_eq!(
        xs,
        vec![-222.5, -178.0, -133.5, -89.0, -44.5, 0.0, 44.5, 89.0, 133.5, 178.0, 222.5]
    );
}

#[test]
fn test_default_y_axis_literal() {
    let ys = build_axis_boundaries(55.5, 230.0).unwrap();
    assert_eq!(
        ys,
        vec![-222.0, -166.5, -111.0, -55.5, 0.0, 55.5, 111.0, 166.5, 222.0]
    );
}

#[test]
fn test_boundaries_symmetric_and_increasing() {
    for (step, range) in [(44.5, 230.0), (55.5, 230.0), (7.3, 100.0), (1.0, 3.5), (0.1, 2.0)] {
        let b = build_axis_boundaries(step, range).unwrap();
        assert!(b.windows(2).all(|w| w[0] < w[1]), "not increasing for {}", step);
        assert_eq!(b.iter().filter(|v| **v == 0.0).count(), 1);
        for (lo, hi) in b.iter().zip(b.iter().rev()) {
            assert_eq!(*lo, -*hi);
        }
        assert!(b.iter().all(|v| v.abs() < range));
    }
}

#[test]
fn test_cell_count_and_sentinels() {
    let xs = build_axis_boundaries(44.5, 230.0).unwrap();
    let ys = build_axis_boundaries(55.5, 230.0).unwrap();
    let cells = enumerate_cells(&xs, &ys);

    assert_eq!(cells.len(), 11 * 9);
    let sentinels: Vec<_> = cells.iter().filter(|c| c.is_sentinel()).collect();
    assert_eq!(sentinels.len(), 11 + 9 - 1);
    assert!(sentinels.iter().all(|c| c.row == 11 || c.col == 9));
    assert!(cells
        .iter()
        .filter(|c| !c.is_sentinel())
        .all(|c| c.window().is_some()));
}

#[test]
fn test_row_major_order_and_spans() {
    let cells = enumerate_cells(&[-1.0, 0.0, 1.0], &[-2.0, 2.0]);
    let positions: Vec<(u32, u32)> = cells.iter().map(|c| (c.row, c.col)).collect();
    assert_eq!(positions, vec![(1, 1), (1, 2), (2, 1), (2, 2), (3, 1), (3, 2)]);

    let window = cells[2].window().unwrap();
    assert_eq!((window.x_min, window.x_max), (0.0, 1.0));
    assert_eq!((window.y_min, window.y_max), (-2.0, 2.0));
    assert!(cells[3].is_sentinel());
}

#[test]
fn test_tiles_cover_the_inner_square() {
    let spec = GridSpec::default();
    let cells = spec.cells().unwrap();
    let area: f64 = cells
        .iter()
        .filter_map(|c| c.window())
        .map(|w| w.width() * w.height())
        .sum();
    assert!((area - 445.0 * 444.0).abs() < 1e-6);
}

#[test]
fn test_equal_steps() {
    let spec = GridSpec {
        range_km: 230.0,
        x_step_km: 44.5,
        y_step_km: 44.5,
    };
    let cells = spec.cells().unwrap();
    assert_eq!(cells.len(), 121);
    assert_eq!(cells.iter().filter(|c| !c.is_sentinel()).count(), 100);
}

#[test]
fn test_empty_inputs() {
    assert!(enumerate_cells(&[], &[0.0]).is_empty());
    let single = enumerate_cells(&[0.0], &[0.0]);
    assert_eq!(single.len(), 1);
    assert!(single[0].is_sentinel());
}
