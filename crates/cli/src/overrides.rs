use trend_core::config::AppConfig;

/// Command line values that take precedence over the loaded config.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub index: Option<String>,
    pub threshold: Option<f32>,
    pub top_n: Option<usize>,
    pub horizon: Option<i32>,
    pub candidates: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, mut cfg: AppConfig) -> AppConfig {
        if let Some(index) = &self.index {
            cfg.store.index = index.clone();
        }
        if let Some(threshold) = self.threshold {
            cfg.analysis.relevance_threshold = threshold;
        }
        if let Some(n) = self.top_n {
            cfg.analysis.top_n_codes = n;
        }
        if let Some(year) = self.horizon {
            cfg.analysis.forecast_horizon_year = year;
        }
        if let Some(pool) = self.candidates {
            cfg.analysis.candidate_pool_size = pool;
        }
        cfg
    }
}
