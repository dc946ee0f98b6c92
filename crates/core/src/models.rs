use serde::{Deserialize, Serialize};

/// One document returned by the search index for a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub classification_codes: Vec<String>,
    #[serde(default)]
    pub application_date: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub abstract_text: Option<String>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            classification_codes: Vec::new(),
            application_date: None,
            title: None,
            abstract_text: None,
        }
    }

    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classification_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.application_date = Some(date.into());
        self
    }

    /// Calendar year of the application date, if one can be read.
    pub fn application_year(&self) -> Option<i32> {
        self.application_date.as_deref().and_then(parse_year)
    }
}

/// Reads the year out of a year-first date string ("2019-03-07", "2019/03",
/// "2019"). The first numeric field is taken as the year.
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(chrono::Datelike::year(&date));
    }
    let field = raw.split(|c: char| !c.is_ascii_digit()).next()?;
    if field.is_empty() {
        return None;
    }
    field.parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCount {
    pub code: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearPoint {
    pub year: i32,
    pub count: u64,
    pub cumulative: u64,
}

/// Cumulative document counts for the years that actually have documents.
/// Missing years are not filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlySeries {
    points: Vec<YearPoint>,
}

impl YearlySeries {
    /// Builds the series from per-year counts in any order; duplicate years
    /// are merged.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (i32, u64)>,
    {
        let mut per_year = std::collections::BTreeMap::new();
        for (year, count) in counts {
            *per_year.entry(year).or_insert(0u64) += count;
        }
        let mut running = 0u64;
        let points = per_year
            .into_iter()
            .map(|(year, count)| {
                running += count;
                YearPoint {
                    year,
                    count,
                    cumulative: running,
                }
            })
            .collect();
        Self { points }
    }

    pub fn from_years<I>(years: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        Self::from_counts(years.into_iter().map(|y| (y, 1)))
    }

    pub fn points(&self) -> &[YearPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.points.first().map(|p| p.year)
    }

    pub fn last_year(&self) -> Option<i32> {
        self.points.last().map(|p| p.year)
    }

    pub fn total(&self) -> u64 {
        self.points.last().map(|p| p.cumulative).unwrap_or(0)
    }
}

/// Fitted logistic growth curve for one classification code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthModel {
    pub carrying_capacity: f64,
    pub initial_population: f64,
    pub growth_rate: f64,
    pub origin_year: i32,
}

impl GrowthModel {
    /// `K / (1 + ((K - P0) / P0) * e^(-r t))` with `t` counted from the origin year.
    pub fn value_at(&self, t: f64) -> f64 {
        logistic(
            t,
            self.carrying_capacity,
            self.initial_population,
            self.growth_rate,
        )
    }

    pub fn value_for_year(&self, year: i32) -> f64 {
        self.value_at(f64::from(year - self.origin_year))
    }
}

pub fn logistic(t: f64, k: f64, p0: f64, r: f64) -> f64 {
    k / (1.0 + ((k - p0) / p0) * (-r * t).exp())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sum_squared_residuals: f64,
    pub r_squared: f64,
    pub evaluations: usize,
}
