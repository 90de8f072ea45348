//! Per-well linear trend of depth-to-water against time.
//!
//! Time is measured in days since the earliest measurement; the fitted
//! daily slope is scaled to depth units per calendar year. Because depth
//! grows downward, a positive slope is a falling water table.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::classify::CoarseThresholds;
use crate::model::{DepthPoint, TrendResult, Undefined, WellRecord, WellSeries};
use crate::series::build_all_series;

pub const DAYS_PER_YEAR: f64 = 365.25;

/// Ordinary least-squares line through `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub n: usize,
}

/// Fit y = slope·x + intercept.
///
/// Fewer than two points is `InsufficientData`; zero spread in `x` is
/// `DegenerateTime`. R² is 0 when `y` has no variance.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Result<LineFit, Undefined> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Err(Undefined::InsufficientData { points: n });
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let nf = n as f64;

    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx < 1e-12 {
        return Err(Undefined::DegenerateTime);
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    // R² = 1 − SS_res / SS_tot
    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let r_squared = if ss_tot < 1e-12 {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Ok(LineFit {
        slope,
        intercept,
        r_squared,
        n,
    })
}

/// Fit a trend through raw points (any order, repeated dates allowed).
pub fn estimate_points(
    points: &[DepthPoint],
    thresholds: &CoarseThresholds,
) -> Result<TrendResult, Undefined> {
    let Some(origin) = points.iter().map(|p| p.date).min() else {
        return Err(Undefined::InsufficientData { points: 0 });
    };

    let xs: Vec<f64> = points.iter().map(|p| days_since(origin, p.date)).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.depth).collect();
    let fit = fit_line(&xs, &ys)?;

    let slope = fit.slope * DAYS_PER_YEAR;
    Ok(TrendResult {
        slope,
        intercept: fit.intercept,
        origin,
        r_squared: fit.r_squared,
        n: fit.n,
        category: thresholds.classify(slope),
    })
}

/// Fit the trend of one well. Several measurements that all fall on one
/// date are `DegenerateTime`, not a single point.
pub fn estimate_trend(
    series: &WellSeries,
    thresholds: &CoarseThresholds,
) -> Result<TrendResult, Undefined> {
    if series.len() == 1 && series.repeated_dates > 0 {
        return Err(Undefined::DegenerateTime);
    }
    estimate_points(&series.points, thresholds)
}

/// Fit every station in a record table, keyed by station id.
pub fn estimate_all(
    records: &[WellRecord],
    thresholds: &CoarseThresholds,
) -> BTreeMap<String, Result<TrendResult, Undefined>> {
    build_all_series(records)
        .into_iter()
        .map(|(id, series)| {
            let result = estimate_trend(&series, thresholds);
            (id, result)
        })
        .collect()
}

fn days_since(origin: NaiveDate, date: NaiveDate) -> f64 {
    (date - origin).num_days() as f64
}
