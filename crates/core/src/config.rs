use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub embeddings: EmbeddingConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    pub fields: FieldSchema,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:9200".to_string(),
            index: "uav_patents".to_string(),
            username: None,
            password: None,
            api_key: None,
            timeout_secs: 60,
            accept_invalid_certs: false,
            fields: FieldSchema::default(),
        }
    }
}

/// Field names of the patent documents in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSchema {
    pub vector: String,
    pub classification: String,
    pub application_date: String,
    pub title: String,
    pub abstract_text: String,
    /// Suffix of the keyword sub-field used for prefix scans.
    pub keyword_suffix: String,
    /// Separator between codes inside the classification field.
    pub code_delimiter: String,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            vector: "DescriptionVector".to_string(),
            classification: "CPC".to_string(),
            application_date: "Application Date".to_string(),
            title: "Title (Translated)(English)".to_string(),
            abstract_text: "Abstract (Translated)(English)".to_string(),
            keyword_suffix: ".keyword".to_string(),
            code_delimiter: "|".to_string(),
        }
    }
}

impl FieldSchema {
    pub fn keyword_field(&self) -> String {
        format!("{}{}", self.classification, self.keyword_suffix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "all-mpnet-base-v2".to_string(),
            base_url: None,
        }
    }
}

/// Tunables of one trend analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum relevance score a hit needs to be kept, in `[0, 1]`.
    pub relevance_threshold: f32,
    pub top_n_codes: usize,
    /// Number of hits the semantic search returns.
    pub search_k: u64,
    /// Candidate pool of the approximate search; never below `search_k`.
    pub candidate_pool_size: u64,
    pub forecast_horizon_year: i32,
    pub fit_iteration_cap: usize,
    /// Maximum number of documents fetched per code for the yearly series.
    pub series_size_cap: u64,
    pub code_prefix_len: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.7,
            top_n_codes: 5,
            search_k: 500,
            candidate_pool_size: 500,
            forecast_horizon_year: 2050,
            fit_iteration_cap: 5000,
            series_size_cap: 10_000,
            code_prefix_len: 4,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "relevance threshold {} is outside [0, 1]",
                self.relevance_threshold
            )));
        }
        if self.top_n_codes == 0 {
            return Err(AnalysisError::InvalidConfig(
                "top_n_codes must be at least 1".into(),
            ));
        }
        if self.search_k == 0 {
            return Err(AnalysisError::InvalidConfig(
                "search_k must be at least 1".into(),
            ));
        }
        if self.candidate_pool_size < self.search_k {
            return Err(AnalysisError::InvalidConfig(format!(
                "candidate pool {} is smaller than k {}",
                self.candidate_pool_size, self.search_k
            )));
        }
        if self.fit_iteration_cap == 0 {
            return Err(AnalysisError::InvalidConfig(
                "fit_iteration_cap must be at least 1".into(),
            ));
        }
        if self.series_size_cap == 0 {
            return Err(AnalysisError::InvalidConfig(
                "series_size_cap must be at least 1".into(),
            ));
        }
        if self.code_prefix_len == 0 {
            return Err(AnalysisError::InvalidConfig(
                "code_prefix_len must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

pub const ENV_PREFIX: &str = "PATENT_TRENDS";

/// Loads the config file (or `config/default` when none is given) and then
/// environment overrides such as `PATENT_TRENDS_STORE__URL`.
pub fn load(path: Option<&str>) -> Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let cfg = settings.build()?;
    let app: AppConfig = cfg.try_deserialize()?;
    app.analysis.validate()?;
    Ok(app)
}
