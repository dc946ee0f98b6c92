//! Result types of a trend analysis run.

use crate::error::AnalysisError;
use crate::forecast::{Forecast, ForecastPoint, GrowthFit};
use crate::models::{CodeCount, YearlySeries};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CodeForecast {
    pub series: YearlySeries,
    pub fit: GrowthFit,
    pub horizon_year: i32,
    pub projection: Vec<ForecastPoint>,
}

impl CodeForecast {
    pub fn new(series: YearlySeries, fit: GrowthFit, horizon_year: i32) -> Self {
        let projection = Forecast::new(fit.model, horizon_year).iter().collect();
        Self {
            series,
            fit,
            horizon_year,
            projection,
        }
    }

    pub fn forecast(&self) -> Forecast {
        Forecast::new(self.fit.model, self.horizon_year)
    }

    pub fn at_horizon(&self) -> Option<ForecastPoint> {
        self.projection.last().copied()
    }
}

/// What happened to one classification code. Every branch other than
/// `Forecasted` is a normal, reportable result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendOutcome {
    Forecasted(Box<CodeForecast>),
    NoData,
    InsufficientData {
        distinct_years: usize,
        series: YearlySeries,
    },
    FitFailed {
        evaluations: usize,
        series: YearlySeries,
    },
    RetrievalFailed {
        reason: String,
    },
}

impl TrendOutcome {
    pub fn from_fit_error(err: AnalysisError, series: YearlySeries) -> Self {
        match err {
            AnalysisError::InsufficientData { distinct_years } => TrendOutcome::InsufficientData {
                distinct_years,
                series,
            },
            AnalysisError::FitDivergence { evaluations } => TrendOutcome::FitFailed {
                evaluations,
                series,
            },
            other => TrendOutcome::RetrievalFailed {
                reason: other.to_string(),
            },
        }
    }

    pub fn is_forecast(&self) -> bool {
        matches!(self, TrendOutcome::Forecasted(_))
    }

    pub fn series(&self) -> Option<&YearlySeries> {
        match self {
            TrendOutcome::Forecasted(f) => Some(&f.series),
            TrendOutcome::InsufficientData { series, .. }
            | TrendOutcome::FitFailed { series, .. } => Some(series),
            TrendOutcome::NoData | TrendOutcome::RetrievalFailed { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TrendOutcome::Forecasted(f) => match f.at_horizon() {
                Some(point) => format!(
                    "Forecast for {}: {:.1} cumulative patents (K = {:.1}).",
                    point.year, point.cumulative, f.fit.model.carrying_capacity
                ),
                None => format!(
                    "Fitted growth model (K = {:.1}).",
                    f.fit.model.carrying_capacity
                ),
            },
            TrendOutcome::NoData => "No data: no dated documents found for this code.".to_string(),
            TrendOutcome::InsufficientData { distinct_years, .. } => {
                AnalysisError::InsufficientData {
                    distinct_years: *distinct_years,
                }
                .user_message()
            }
            TrendOutcome::FitFailed { evaluations, .. } => AnalysisError::FitDivergence {
                evaluations: *evaluations,
            }
            .user_message(),
            TrendOutcome::RetrievalFailed { reason } => {
                AnalysisError::Retrieval(reason.clone()).user_message()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeTrend {
    pub code: CodeCount,
    pub outcome: TrendOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub query: String,
    pub searched_hits: usize,
    pub relevant_hits: usize,
    pub top_codes: Vec<CodeCount>,
    pub trends: Vec<CodeTrend>,
}

impl TrendReport {
    pub fn trend(&self, code: &str) -> Option<&CodeTrend> {
        self.trends.iter().find(|t| t.code.code == code)
    }
}

/// Outcome of a whole run; empty results are ordinary variants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    NoRelevantHits { searched_hits: usize, threshold: f32 },
    NoCodes { relevant_hits: usize },
    Found(TrendReport),
}

impl AnalysisOutcome {
    pub fn report(&self) -> Option<&TrendReport> {
        match self {
            AnalysisOutcome::Found(report) => Some(report),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AnalysisOutcome::NoRelevantHits {
                searched_hits,
                threshold,
            } => format!(
                "No results: none of {} hits reached relevance {:.2}.",
                searched_hits, threshold
            ),
            AnalysisOutcome::NoCodes { .. } => {
                "No classification codes found in the results.".to_string()
            }
            AnalysisOutcome::Found(report) => format!(
                "{} relevant hits, {} codes analysed.",
                report.relevant_hits,
                report.trends.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_are_distinct() {
        let series = YearlySeries::from_years([2015, 2016]);
        let messages = [
            TrendOutcome::NoData.message(),
            TrendOutcome::from_fit_error(
                AnalysisError::InsufficientData { distinct_years: 2 },
                series.clone(),
            )
            .message(),
            TrendOutcome::from_fit_error(AnalysisError::FitDivergence { evaluations: 5000 }, series)
                .message(),
            TrendOutcome::RetrievalFailed {
                reason: "request timed out".into(),
            }
            .message(),
        ];
        assert!(messages[0].starts_with("No data"));
        assert!(messages[1].starts_with("Not enough data to forecast"));
        assert!(messages[2].starts_with("Could not fit a growth model"));
        assert!(messages[3].contains("request timed out"));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(TrendOutcome::NoData).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "no_data" }));
        let value = serde_json::to_value(AnalysisOutcome::NoCodes { relevant_hits: 4 }).unwrap();
        assert_eq!(value["status"], "no_codes");
        assert_eq!(value["relevant_hits"], 4);
    }
}
