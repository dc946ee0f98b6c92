use crate::codes::CodeFrequencyAnalyzer;
use crate::config::{AnalysisConfig, AppConfig, FieldSchema};
use crate::embeddings::embed_query;
use crate::error::{AnalysisError, Result};
use crate::forecast::GrowthForecaster;
use crate::models::{CodeCount, SearchHit};
use crate::relevance::RelevanceFilter;
use crate::report::{AnalysisOutcome, CodeForecast, CodeTrend, TrendOutcome, TrendReport};
use crate::search;
use crate::series::YearlySeriesBuilder;
use crate::store::{DocumentStore, ElasticStore};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::{EmbeddingProvider, ProviderRegistry};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// External services a run talks to, built once and shared by every stage.
#[derive(Clone)]
pub struct Capabilities {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn DocumentStore>,
}

impl Capabilities {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }
}

pub struct TrendPipeline {
    caps: Capabilities,
    fields: FieldSchema,
    analysis: AnalysisConfig,
}

impl TrendPipeline {
    pub fn new(caps: Capabilities, fields: FieldSchema, analysis: AnalysisConfig) -> Result<Self> {
        analysis.validate()?;
        Ok(Self {
            caps,
            fields,
            analysis,
        })
    }

    pub async fn check_connection(&self) -> Result<()> {
        self.caps
            .store
            .ping()
            .await
            .map_err(|e| AnalysisError::Connection(e.to_string()))
    }

    /// Query → embedding → kNN search → relevance filter → top codes →
    /// per-code series and forecast.
    pub async fn run(&self, query: &str) -> Result<AnalysisOutcome> {
        let query = query.trim();
        let filter = RelevanceFilter::new(self.analysis.relevance_threshold)?;
        let vector = embed_query(query, self.caps.embedder.as_ref()).await?;

        let request = search::trend_request(vector, &self.analysis, &self.fields);
        let hits = search::vector_search(self.caps.store.as_ref(), &request).await?;
        let searched_hits = hits.len();
        let relevant = filter.apply(hits);
        info!(
            searched_hits,
            relevant_hits = relevant.len(),
            threshold = filter.threshold(),
            "semantic search complete"
        );
        if relevant.is_empty() {
            return Ok(AnalysisOutcome::NoRelevantHits {
                searched_hits,
                threshold: filter.threshold(),
            });
        }

        let analyzer =
            CodeFrequencyAnalyzer::new(self.analysis.code_prefix_len, self.analysis.top_n_codes);
        let top_codes = analyzer.top_codes(&relevant);
        if top_codes.is_empty() {
            return Ok(AnalysisOutcome::NoCodes {
                relevant_hits: relevant.len(),
            });
        }
        info!(codes = ?top_codes.iter().map(|c| c.code.as_str()).collect::<Vec<_>>(), "top codes");

        let trends = self.analyze_codes(&top_codes).await?;
        Ok(AnalysisOutcome::Found(TrendReport {
            query: query.to_string(),
            searched_hits,
            relevant_hits: relevant.len(),
            top_codes,
            trends,
        }))
    }

    /// Runs every code's series build and fit as its own task. Results are
    /// matched back to codes by position, so completion order is irrelevant.
    /// A fatal error from any task cancels the rest and ends the run.
    pub async fn analyze_codes(&self, codes: &[CodeCount]) -> Result<Vec<CodeTrend>> {
        let mut tasks = JoinSet::new();
        for (slot, code) in codes.iter().enumerate() {
            let store = Arc::clone(&self.caps.store);
            let fields = self.fields.clone();
            let analysis = self.analysis.clone();
            let prefix = code.code.clone();
            tasks.spawn(async move {
                let outcome = analyze_prefix(store.as_ref(), &fields, &analysis, &prefix).await;
                (slot, outcome)
            });
        }

        let mut outcomes: Vec<Option<TrendOutcome>> = vec![None; codes.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(outcome))) => outcomes[slot] = Some(outcome),
                Ok((slot, Err(err))) => {
                    warn!(code = %codes[slot].code, error = %err, "aborting run");
                    tasks.abort_all();
                    return Err(err);
                }
                Err(err) => warn!(error = %err, "code analysis task failed"),
            }
        }

        Ok(codes
            .iter()
            .cloned()
            .zip(outcomes)
            .map(|(code, outcome)| CodeTrend {
                code,
                outcome: outcome.unwrap_or_else(|| TrendOutcome::RetrievalFailed {
                    reason: "analysis task aborted".to_string(),
                }),
            })
            .collect())
    }

    /// Plain document lookup returning titles and abstracts.
    pub async fn search_documents(
        &self,
        query: &str,
        k: u64,
        num_candidates: u64,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(AnalysisError::InvalidConfig("k must be at least 1".into()));
        }
        let vector = embed_query(query, self.caps.embedder.as_ref()).await?;
        let request = search::document_request(vector, k, num_candidates, &self.fields);
        search::vector_search(self.caps.store.as_ref(), &request).await
    }
}

/// Series build, fit and projection for one code prefix. Per-code failures
/// are folded into the returned outcome; only fatal errors are returned.
pub async fn analyze_prefix(
    store: &dyn DocumentStore,
    fields: &FieldSchema,
    analysis: &AnalysisConfig,
    prefix: &str,
) -> Result<TrendOutcome> {
    let builder = YearlySeriesBuilder::new(store, fields, analysis.series_size_cap);
    let series = match builder.build(prefix).await {
        Ok(series) => series,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            warn!(prefix, error = %err, "yearly series retrieval failed");
            let reason = match err {
                AnalysisError::Retrieval(detail) => detail,
                other => other.to_string(),
            };
            return Ok(TrendOutcome::RetrievalFailed { reason });
        }
    };
    if series.is_empty() {
        info!(prefix, "no dated documents");
        return Ok(TrendOutcome::NoData);
    }

    let outcome = match GrowthForecaster::new(analysis.fit_iteration_cap).fit(&series) {
        Ok(fit) => TrendOutcome::Forecasted(Box::new(CodeForecast::new(
            series,
            fit,
            analysis.forecast_horizon_year,
        ))),
        Err(err) => {
            warn!(prefix, error = %err, "no forecast");
            TrendOutcome::from_fit_error(err, series)
        }
    };
    Ok(outcome)
}

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new();

    let base = config
        .embeddings
        .base_url
        .clone()
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok());
    if let Some(base_url) = base {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url,
            embedding_model: config.embeddings.model.clone(),
        });
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    reg.set_preferred_embedding(&config.embeddings.provider)
}

pub fn build_document_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let store = ElasticStore::from_config(&config.store)
        .map_err(|e| AnalysisError::Connection(e.to_string()))?;
    Ok(Arc::new(store))
}

pub fn build_capabilities(config: &AppConfig) -> Result<Capabilities> {
    let registry = build_registry(config);
    let embedder = registry.embedding(None).map_err(|e| {
        AnalysisError::Embedding(format!(
            "{} (available: {:?}; set embeddings.base_url or OPENAI_BASE_URL)",
            e,
            registry.embedding_names()
        ))
    })?;
    Ok(Capabilities::new(embedder, build_document_store(config)?))
}

pub fn build_pipeline(config: &AppConfig) -> Result<TrendPipeline> {
    TrendPipeline::new(
        build_capabilities(config)?,
        config.store.fields.clone(),
        config.analysis.clone(),
    )
}
