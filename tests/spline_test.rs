// Spline interpolation over the filter cutoff control points.

use mos_sid::spline::{interpolate, Point, PointPlotter};

/// Interior control points of the 6581 cutoff curve below the
/// discontinuity.
static CURVE_POINTS: [(i32, i32); 16] = [
    (0, 220),
    (0, 220), // repeated start
    (128, 230),
    (256, 250),
    (384, 300),
    (512, 420),
    (640, 780),
    (768, 1600),
    (832, 2300),
    (896, 3200),
    (960, 4300),
    (992, 5000),
    (1008, 5400),
    (1016, 5700),
    (1023, 6000),
    (1023, 6000), // repeated end
];

fn plot(points: &[(i32, i32)], output: &mut [i32]) {
    let points: Vec<Point> = points
        .iter()
        .map(|&(x, y)| Point {
            x: x as f64,
            y: y as f64,
        })
        .collect();
    let mut plotter = PointPlotter::new(output);
    interpolate(&points, &mut plotter, 1.0);
}

/// The spline passes through every control point.
#[test]
fn control_points_are_exact() {
    let mut output = vec![0i32; 1024];
    plot(&CURVE_POINTS, &mut output);

    for &(x, y) in &CURVE_POINTS[1..CURVE_POINTS.len() - 1] {
        let actual = output[x as usize];
        assert!(
            (actual - y).abs() <= 2,
            "point ({}, {}) not on spline: got {}",
            x,
            y,
            actual
        );
    }
}

/// The measured curve rises monotonically, and so must its interpolation.
#[test]
fn interpolation_is_monotonic() {
    let mut output = vec![0i32; 1024];
    plot(&CURVE_POINTS, &mut output);

    for (i, w) in output.windows(2).enumerate() {
        assert!(
            w[1] >= w[0],
            "curve must not dip: y[{}]={} > y[{}]={}",
            i,
            w[0],
            i + 1,
            w[1]
        );
    }
}

/// Interpolated values stay within the envelope of the surrounding control
/// points (no wild overshoot).
#[test]
fn no_overshoot_at_curve_top() {
    let mut output = vec![0i32; 1024];
    plot(&CURVE_POINTS, &mut output);

    assert!(output[1023] <= 6000 + 60, "top overshoot: {}", output[1023]);
    assert_eq!(output[0], 220);
}

/// A repeated interior point creates a discontinuity: the curve is plotted
/// on both sides without bleeding across.
#[test]
fn repeated_interior_point_splits_curve() {
    static SPLIT: [(i32, i32); 8] = [
        (0, 100),
        (0, 100),
        (10, 200),
        (20, 300), // left branch ends here
        (20, 900), // right branch restarts here
        (30, 1000),
        (40, 1100),
        (40, 1100),
    ];
    let mut output = vec![0i32; 41];
    plot(&SPLIT, &mut output);

    assert!((output[10] - 200).abs() <= 2);
    assert!((output[30] - 1000).abs() <= 2);
    assert!(
        output[19] < 400,
        "left branch value expected below the discontinuity: {}",
        output[19]
    );
}

/// Fewer than four points cannot form a segment; the plotter output stays
/// untouched.
#[test]
fn degenerate_input_plots_nothing() {
    let points = [
        Point { x: 0.0, y: 5.0 },
        Point { x: 1.0, y: 6.0 },
        Point { x: 2.0, y: 7.0 },
    ];
    let mut output = vec![-1i32; 4];
    let mut plotter = PointPlotter::new(&mut output);
    interpolate(&points, &mut plotter, 1.0);
    assert_eq!(output, vec![-1; 4]);
}
