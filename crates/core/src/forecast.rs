//! Logistic growth fitting and projection.
//!
//! The curve `K / (1 + ((K - P0) / P0) * e^(-r t))` is fitted to a cumulative
//! yearly series by Levenberg-Marquardt least squares, `t` counting years from
//! the first observed year. The starting point is `K = max cumulative`,
//! `P0 = 1`, `r = 0.1`.

use crate::error::{AnalysisError, Result};
use crate::models::{logistic, FitQuality, GrowthModel, YearlySeries};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MIN_DISTINCT_YEARS: usize = 3;

const FTOL: f64 = 1.49012e-8;
const XTOL: f64 = 1.49012e-8;
const GTOL: f64 = 1e-14;
const LAMBDA_START: f64 = 1e-3;
const LAMBDA_FLOOR: f64 = 1e-12;
/// Below these the fitted curve is flat and says nothing about growth.
const MIN_GROWTH_RATE: f64 = 1e-6;
const MIN_SHAPE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthFit {
    pub model: GrowthModel,
    pub quality: FitQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthForecaster {
    max_evaluations: usize,
}

impl Default for GrowthForecaster {
    fn default() -> Self {
        Self {
            max_evaluations: 5000,
        }
    }
}

impl GrowthForecaster {
    pub fn new(max_evaluations: usize) -> Self {
        Self { max_evaluations }
    }

    pub fn initial_guess(series: &YearlySeries) -> [f64; 3] {
        [series.total() as f64, 1.0, 0.1]
    }

    pub fn fit(&self, series: &YearlySeries) -> Result<GrowthFit> {
        if series.len() < MIN_DISTINCT_YEARS {
            return Err(AnalysisError::InsufficientData {
                distinct_years: series.len(),
            });
        }
        // YearlySeries only holds distinct, ascending years with a running sum.
        let points = series.points();
        let origin_year = points[0].year;
        let ts: Vec<f64> = points
            .iter()
            .map(|p| f64::from(p.year - origin_year))
            .collect();
        let ys: Vec<f64> = points.iter().map(|p| p.cumulative as f64).collect();

        let (params, evaluations) =
            levenberg_marquardt(&ts, &ys, Self::initial_guess(series), self.max_evaluations)?;
        let model = GrowthModel {
            carrying_capacity: params[0],
            initial_population: params[1],
            growth_rate: params[2],
            origin_year,
        };
        let mut quality = fit_quality(&model, series);
        quality.evaluations = evaluations;
        if !is_usable(&model, &quality) {
            debug!(
                k = model.carrying_capacity,
                p0 = model.initial_population,
                r = model.growth_rate,
                r_squared = quality.r_squared,
                "logistic fit stalled on a flat curve"
            );
            return Err(AnalysisError::FitDivergence { evaluations });
        }
        debug!(
            k = model.carrying_capacity,
            p0 = model.initial_population,
            r = model.growth_rate,
            evaluations,
            "logistic fit converged"
        );
        Ok(GrowthFit { model, quality })
    }
}

/// Rejects a stopping point where the curve degenerated to a constant: no
/// growth rate, `K == P0`, or a fit no better than the mean.
fn is_usable(model: &GrowthModel, quality: &FitQuality) -> bool {
    let shape = (model.carrying_capacity - model.initial_population) / model.initial_population;
    model.growth_rate > MIN_GROWTH_RATE && shape.abs() > MIN_SHAPE && quality.r_squared > 0.0
}

/// Sum of squared residuals and R² of `model` against the observed series.
pub fn fit_quality(model: &GrowthModel, series: &YearlySeries) -> FitQuality {
    let observed: Vec<(f64, f64)> = series
        .points()
        .iter()
        .map(|p| (model.value_for_year(p.year), p.cumulative as f64))
        .collect();
    let ssr: f64 = observed.iter().map(|(f, y)| (y - f).powi(2)).sum();
    let mean = observed.iter().map(|(_, y)| y).sum::<f64>() / observed.len().max(1) as f64;
    let sst: f64 = observed.iter().map(|(_, y)| (y - mean).powi(2)).sum();
    let r_squared = if sst > 0.0 {
        1.0 - ssr / sst
    } else if ssr == 0.0 {
        1.0
    } else {
        0.0
    };
    FitQuality {
        sum_squared_residuals: ssr,
        r_squared,
        evaluations: 0,
    }
}

fn sum_squares(ts: &[f64], ys: &[f64], p: &[f64; 3]) -> f64 {
    ts.iter()
        .zip(ys)
        .map(|(t, y)| (y - logistic(*t, p[0], p[1], p[2])).powi(2))
        .sum()
}

/// Partial derivatives of the logistic curve with respect to (K, P0, r).
fn gradient_row(t: f64, p: &[f64; 3]) -> [f64; 3] {
    let [k, p0, r] = *p;
    let a = (k - p0) / p0;
    let e = (-r * t).exp();
    let d = 1.0 + a * e;
    let d2 = d * d;
    [
        1.0 / d - k * e / (p0 * d2),
        k * k * e / (p0 * p0 * d2),
        k * t * a * e / d2,
    ]
}

fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < f64::MIN_POSITIVE {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn norm(v: &[f64; 3]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Returns the fitted parameters and the number of objective evaluations.
fn levenberg_marquardt(
    ts: &[f64],
    ys: &[f64],
    start: [f64; 3],
    max_evaluations: usize,
) -> Result<([f64; 3], usize)> {
    let mut params = start;
    let mut current = sum_squares(ts, ys, &params);
    let mut evaluations = 1;
    if !current.is_finite() {
        return Err(AnalysisError::FitDivergence { evaluations });
    }
    let mut lambda = LAMBDA_START;

    while evaluations < max_evaluations {
        let mut jtj = [[0.0; 3]; 3];
        let mut jtr = [0.0; 3];
        for (t, y) in ts.iter().zip(ys) {
            let row = gradient_row(*t, &params);
            let residual = y - logistic(*t, params[0], params[1], params[2]);
            for i in 0..3 {
                jtr[i] += row[i] * residual;
                for j in 0..3 {
                    jtj[i][j] += row[i] * row[j];
                }
            }
        }
        if jtr.iter().all(|g| g.abs() <= GTOL * (1.0 + current)) {
            return Ok((params, evaluations));
        }

        // Retry the step with growing damping until the residual shrinks.
        loop {
            let mut damped = jtj;
            for (i, row) in damped.iter_mut().enumerate() {
                row[i] += lambda * jtj[i][i].max(1e-12);
            }
            evaluations += 1;
            let Some(step) = solve3(damped, jtr) else {
                lambda *= 10.0;
                if evaluations >= max_evaluations {
                    return Err(AnalysisError::FitDivergence { evaluations });
                }
                continue;
            };
            let trial = [
                params[0] + step[0],
                params[1] + step[1],
                params[2] + step[2],
            ];
            let step_norm = norm(&step);
            let tolerance = XTOL * (XTOL + norm(&params));
            let admissible =
                trial[0] > 0.0 && trial[1] > 0.0 && trial.iter().all(|v| v.is_finite());
            let candidate = if admissible {
                sum_squares(ts, ys, &trial)
            } else {
                f64::INFINITY
            };

            if candidate.is_finite() && candidate < current {
                let reduction = if current > 0.0 {
                    (current - candidate) / current
                } else {
                    0.0
                };
                params = trial;
                current = candidate;
                lambda = (lambda / 10.0).max(LAMBDA_FLOOR);
                if reduction <= FTOL || step_norm <= tolerance {
                    return Ok((params, evaluations));
                }
                break;
            }
            if step_norm <= tolerance {
                return Ok((params, evaluations));
            }
            lambda *= 10.0;
            if evaluations >= max_evaluations {
                return Err(AnalysisError::FitDivergence { evaluations });
            }
        }
    }
    Err(AnalysisError::FitDivergence { evaluations })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub cumulative: f64,
}

/// Projection of a fitted model from its origin year through the horizon
/// year inclusive. Iterating is pure and can be repeated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    model: GrowthModel,
    horizon_year: i32,
}

impl Forecast {
    pub fn new(model: GrowthModel, horizon_year: i32) -> Self {
        Self {
            model,
            horizon_year,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ForecastPoint> {
        let model = self.model;
        (model.origin_year..=self.horizon_year).map(move |year| ForecastPoint {
            year,
            cumulative: model.value_for_year(year),
        })
    }

    /// Only the years strictly after `year`, typically the last observed one.
    pub fn after(&self, year: i32) -> impl Iterator<Item = ForecastPoint> {
        self.iter().filter(move |p| p.year > year)
    }
}
