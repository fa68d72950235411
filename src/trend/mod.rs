// src/trend/mod.rs

use serde::Serialize;

use crate::error::{AnalysisError, Result};

/// Number of points in the evaluated trend line.
pub const DENSE_POINTS: usize = 100_000;

/// Least-squares line through the yearly totals, plus a dense evaluation
/// of that line for drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendCurve {
    /// Year indices `0..n`.
    pub x: Vec<f64>,
    /// Observed totals, summed over regions.
    pub y: Vec<f64>,
    /// `DENSE_POINTS` evenly spaced points over `[0, n]`, both ends included.
    pub x_fit: Vec<f64>,
    pub y_fit: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
}

/// Sum the region x year `matrix` down its rows and fit `y = slope * x + intercept`.
pub fn fit(matrix: &[Vec<f64>]) -> Result<TrendCurve> {
    let total = column_totals(matrix)?;
    fit_series(&total)
}

/// Fit a line to a single series indexed `0..n`.
pub fn fit_series(total: &[f64]) -> Result<TrendCurve> {
    let n = total.len();
    if n < 2 {
        return Err(AnalysisError::ModelFit(format!(
            "need at least 2 points to fit a trend, got {n}"
        )));
    }
    if let Some(bad) = total.iter().find(|v| !v.is_finite()) {
        return Err(AnalysisError::ModelFit(format!(
            "series contains a non-finite value ({bad})"
        )));
    }

    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let (slope, intercept) = least_squares(&x, total);

    let x_fit = linspace(0.0, n as f64, DENSE_POINTS);
    let y_fit = x_fit.iter().map(|&xi| slope * xi + intercept).collect();

    Ok(TrendCurve {
        x,
        y: total.to_vec(),
        x_fit,
        y_fit,
        slope,
        intercept,
    })
}

fn column_totals(matrix: &[Vec<f64>]) -> Result<Vec<f64>> {
    let width = match matrix.first() {
        Some(row) => row.len(),
        None => return Err(AnalysisError::ModelFit("no regions to sum".into())),
    };
    let mut total = vec![0.0; width];
    for (i, row) in matrix.iter().enumerate() {
        if row.len() != width {
            return Err(AnalysisError::ModelFit(format!(
                "row {i} has {} years, expected {width}",
                row.len()
            )));
        }
        for (t, v) in total.iter_mut().zip(row) {
            *t += v;
        }
    }
    Ok(total)
}

/// Ordinary least squares on centred data; `x` must not be constant.
fn least_squares(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let (sxy, sxx) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxy, sxx), (&xi, &yi)| {
            let dx = xi - mean_x;
            (sxy + dx * (yi - mean_y), sxx + dx * dx)
        });
    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut points: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            points[count - 1] = end;
            points
        }
    }
}
