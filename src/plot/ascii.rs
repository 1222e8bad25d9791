//! ASCII plotting for terminal output.
//!
//! Intentionally a dumb fixed-size grid, optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed T: `o`
//! - modeled T trajectory: `-` line

use crate::domain::FitFile;
use crate::report::YearResidual;

/// Render observed points over a modeled T curve.
///
/// `curve` is a list of (year, T_model) samples, typically denser than the
/// observed series.
pub fn render_ascii_plot(
    residuals: &[YearResidual],
    curve: &[(f64, f64)],
    width: usize,
    height: usize,
) -> String {
    let (t_min, t_max) = time_range(residuals, curve).unwrap_or((0.0, 1.0));
    render_plot(residuals, curve, t_min, t_max, width, height)
}

/// Render directly from a saved fit file, using its precomputed dense grid.
pub fn render_ascii_plot_from_fit_file(fit: &FitFile, width: usize, height: usize) -> String {
    let residuals: Vec<YearResidual> = fit
        .years
        .iter()
        .zip(fit.t_obs.iter())
        .zip(fit.t_model.iter())
        .map(|((&year, &t_obs), &t_model)| YearResidual {
            year,
            t_obs,
            t_model,
            residual: t_obs - t_model,
        })
        .collect();
    let curve: Vec<(f64, f64)> = fit
        .grid
        .t
        .iter()
        .zip(fit.grid.in_treatment.iter())
        .map(|(&t, &v)| (t, v))
        .collect();
    render_ascii_plot(&residuals, &curve, width, height)
}

fn render_plot(
    residuals: &[YearResidual],
    curve: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (y_min, y_max) = y_range(residuals, curve).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so observed points can overlay it.
    draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);
    for r in residuals {
        let x = map_x(f64::from(r.year), t_min, t_max, width);
        let y = map_y(r.t_obs, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: years=[{t_min:.0}, {t_max:.0}] | T=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn time_range(residuals: &[YearResidual], curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_t = f64::INFINITY;
    let mut max_t = f64::NEG_INFINITY;
    for r in residuals {
        min_t = min_t.min(f64::from(r.year));
        max_t = max_t.max(f64::from(r.year));
    }
    for &(t, _) in curve {
        min_t = min_t.min(t);
        max_t = max_t.max(t);
    }
    if min_t.is_finite() && max_t.is_finite() && max_t > min_t {
        Some((min_t, max_t))
    } else {
        None
    }
}

fn y_range(residuals: &[YearResidual], curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for r in residuals {
        min_y = min_y.min(r.t_obs);
        max_y = max_y.max(r.t_obs);
    }
    for &(_, y) in curve {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // max maps to the top row.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    y_min: f64,
    y_max: f64,
) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish). Only fills empty cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
