//! Text rendering of analysis results.

use std::fmt::Write;
use trend_core::models::{CodeCount, SearchHit, YearlySeries};
use trend_core::report::{AnalysisOutcome, CodeForecast, CodeTrend, TrendOutcome, TrendReport};

const BAR_WIDTH: usize = 40;

pub fn outcome(outcome: &AnalysisOutcome) -> String {
    match outcome {
        AnalysisOutcome::Found(report) => report_text(report),
        other => format!("{}\n", other.message()),
    }
}

pub fn report_text(report: &TrendReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Query: {} ({} hits, {} above threshold)",
        report.query, report.searched_hits, report.relevant_hits
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Top {} most used CPC codes", report.top_codes.len());
    out.push_str(&code_table(&report.top_codes));
    let _ = writeln!(out);
    out.push_str(&bar_chart(&report.top_codes, BAR_WIDTH));
    for trend in &report.trends {
        let _ = writeln!(out);
        out.push_str(&trend_text(trend));
    }
    out
}

pub fn code_table(codes: &[CodeCount]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:>6}", "CPC Code", "Count");
    for c in codes {
        let _ = writeln!(out, "{:<10} {:>6}", c.code, c.count);
    }
    out
}

/// Horizontal bars scaled so the largest count spans `width` cells.
pub fn bar_chart(codes: &[CodeCount], width: usize) -> String {
    let max = codes.iter().map(|c| c.count).max().unwrap_or(0);
    let mut out = String::new();
    for c in codes {
        let len = if max == 0 {
            0
        } else {
            ((c.count * width) as f64 / max as f64).round() as usize
        };
        let _ = writeln!(out, "{:<6} {} {}", c.code, "#".repeat(len.max(1)), c.count);
    }
    out
}

pub fn trend_text(trend: &CodeTrend) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "S-curve for CPC code {}", trend.code.code);
    if let Some(series) = trend.outcome.series() {
        out.push_str(&series_table(series));
    }
    match &trend.outcome {
        TrendOutcome::Forecasted(forecast) => out.push_str(&forecast_text(forecast)),
        other => {
            let _ = writeln!(out, "  {}", other.message());
        }
    }
    out
}

pub fn series_table(series: &YearlySeries) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {:<6} {:>6} {:>10}", "Year", "Count", "Cumulative");
    for p in series.points() {
        let _ = writeln!(out, "  {:<6} {:>6} {:>10}", p.year, p.count, p.cumulative);
    }
    out
}

fn forecast_text(forecast: &CodeForecast) -> String {
    let model = &forecast.fit.model;
    let quality = &forecast.fit.quality;
    let mut out = String::new();
    let _ = writeln!(out, "  Logistic model parameters:");
    let _ = writeln!(out, "    Carrying capacity (K): {:.4}", model.carrying_capacity);
    let _ = writeln!(out, "    Initial population (P0): {:.4}", model.initial_population);
    let _ = writeln!(out, "    Growth rate (r): {:.4}", model.growth_rate);
    let _ = writeln!(
        out,
        "    SSR: {:.4}  R²: {:.4}  evaluations: {}",
        quality.sum_squared_residuals, quality.r_squared, quality.evaluations
    );
    let last_observed = forecast.series.last_year().unwrap_or(model.origin_year);
    let _ = writeln!(out, "  Forecast through {}:", forecast.horizon_year);
    for p in forecast.forecast().after(last_observed) {
        let _ = writeln!(out, "    {:<6} {:>10.1}", p.year, p.cumulative);
    }
    out
}

pub fn hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.\n".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(out, "{}", hit.title.as_deref().unwrap_or("(untitled)"));
        if let Some(text) = &hit.abstract_text {
            let _ = writeln!(out, "Abstract: {}", text);
        }
        let _ = writeln!(out, "Score: {:.3}", hit.score);
        let _ = writeln!(out, "{}", "-".repeat(60));
    }
    out
}
