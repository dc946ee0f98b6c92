use crate::codes::split_codes;
use crate::config::{FieldSchema, StoreConfig};
use crate::models::SearchHit;
use providers::elastic::{ElasticClient, ElasticConfig, EsHit, KnnQuery};
use providers::ProviderError;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct KnnRequest {
    pub vector_field: String,
    pub query_vector: Vec<f32>,
    pub k: u64,
    pub num_candidates: u64,
    pub source_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixFilter {
    pub field: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub size_cap: u64,
    pub filter: PrefixFilter,
    pub source_fields: Vec<String>,
}

/// Read-only access to the patent collection. Implementations are shared
/// across concurrent per-code tasks.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ping(&self) -> Result<(), ProviderError>;

    /// Hits ordered by descending relevance score.
    async fn knn_search(&self, req: &KnnRequest) -> Result<Vec<SearchHit>, ProviderError>;

    /// Up to `size_cap` documents whose classification field starts with the prefix.
    async fn prefix_scan(&self, req: &ScanRequest) -> Result<Vec<SearchHit>, ProviderError>;
}

pub struct ElasticStore {
    client: ElasticClient,
    fields: FieldSchema,
}

impl ElasticStore {
    pub fn new(client: ElasticClient, fields: FieldSchema) -> Self {
        Self { client, fields }
    }

    pub fn from_config(cfg: &StoreConfig) -> Result<Self, ProviderError> {
        let client = ElasticClient::new(ElasticConfig {
            url: cfg.url.clone(),
            index: cfg.index.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            api_key: cfg.api_key.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            accept_invalid_certs: cfg.accept_invalid_certs,
        })?;
        Ok(Self::new(client, cfg.fields.clone()))
    }

    fn to_hit(&self, hit: EsHit) -> SearchHit {
        let source = hit.source.unwrap_or(serde_json::Value::Null);
        let text = |field: &str| {
            source
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let classification_codes = match source.get(&self.fields.classification) {
            Some(serde_json::Value::String(raw)) => {
                split_codes(raw, &self.fields.code_delimiter)
            }
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .flat_map(|raw| split_codes(raw, &self.fields.code_delimiter))
                .collect(),
            _ => Vec::new(),
        };
        SearchHit {
            id: hit.id,
            score: hit.score.unwrap_or(0.0),
            classification_codes,
            application_date: text(&self.fields.application_date),
            title: text(&self.fields.title),
            abstract_text: text(&self.fields.abstract_text),
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for ElasticStore {
    async fn ping(&self) -> Result<(), ProviderError> {
        self.client.ping().await
    }

    async fn knn_search(&self, req: &KnnRequest) -> Result<Vec<SearchHit>, ProviderError> {
        let knn = KnnQuery {
            field: req.vector_field.clone(),
            query_vector: req.query_vector.clone(),
            k: req.k,
            num_candidates: req.num_candidates,
        };
        let resp = self.client.knn_search(knn, &req.source_fields).await?;
        debug!(index = self.client.index(), hits = resp.hits.hits.len(), "knn search");
        Ok(resp.hits.hits.into_iter().map(|h| self.to_hit(h)).collect())
    }

    async fn prefix_scan(&self, req: &ScanRequest) -> Result<Vec<SearchHit>, ProviderError> {
        let pattern = format!("{}*", req.filter.prefix);
        let resp = self
            .client
            .wildcard_scan(&req.filter.field, &pattern, req.size_cap, &req.source_fields)
            .await?;
        if let Some(total) = &resp.hits.total {
            if total.value > req.size_cap {
                debug!(
                    prefix = %req.filter.prefix,
                    total = total.value,
                    cap = req.size_cap,
                    "prefix scan truncated at size cap"
                );
            }
        }
        Ok(resp.hits.hits.into_iter().map(|h| self.to_hit(h)).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoredPatent {
    pub id: String,
    pub vector: Vec<f32>,
    pub classification: String,
    pub application_date: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
}

/// In-memory collection. Scores are cosine similarities mapped to `[0, 1]`
/// as `(1 + cos) / 2`; prefix scans match the raw classification field.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    docs: Vec<StoredPatent>,
    delimiter: String,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(&FieldSchema::default().code_delimiter)
    }
}

impl InMemoryStore {
    pub fn new(delimiter: &str) -> Self {
        Self {
            docs: Vec::new(),
            delimiter: delimiter.to_string(),
        }
    }

    pub fn with_document(mut self, doc: StoredPatent) -> Self {
        self.insert(doc);
        self
    }

    pub fn insert(&mut self, doc: StoredPatent) {
        self.docs.push(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn to_hit(&self, doc: &StoredPatent, score: f32) -> SearchHit {
        SearchHit {
            id: doc.id.clone(),
            score,
            classification_codes: split_codes(&doc.classification, &self.delimiter),
            application_date: doc.application_date.clone(),
            title: doc.title.clone(),
            abstract_text: doc.abstract_text.clone(),
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na * nb))
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryStore {
    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn knn_search(&self, req: &KnnRequest) -> Result<Vec<SearchHit>, ProviderError> {
        let mut scored: Vec<(f32, &StoredPatent)> = self
            .docs
            .iter()
            .filter_map(|d| cosine(&req.query_vector, &d.vector).map(|c| ((1.0 + c) / 2.0, d)))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(req.num_candidates.min(req.k) as usize);
        Ok(scored
            .into_iter()
            .map(|(score, doc)| self.to_hit(doc, score))
            .collect())
    }

    async fn prefix_scan(&self, req: &ScanRequest) -> Result<Vec<SearchHit>, ProviderError> {
        Ok(self
            .docs
            .iter()
            .filter(|d| d.classification.starts_with(&req.filter.prefix))
            .take(req.size_cap as usize)
            .map(|d| self.to_hit(d, 1.0))
            .collect())
    }
}
