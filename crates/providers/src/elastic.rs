use crate::ProviderError;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ElasticConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

/// Thin client over the Elasticsearch `_search` API for a single index.
#[derive(Clone)]
pub struct ElasticClient {
    client: Client,
    cfg: ElasticConfig,
}

impl ElasticClient {
    pub fn new(cfg: ElasticConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self { client, cfg })
    }

    pub fn index(&self) -> &str {
        &self.cfg.index
    }

    fn authorize(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.cfg.api_key {
            builder = builder.header("Authorization", format!("ApiKey {}", key));
        } else if let Some(user) = &self.cfg.username {
            builder = builder.basic_auth(user, self.cfg.password.as_deref());
        }
        builder
    }

    /// Checks that the cluster answers on its root endpoint.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        let url = format!("{}/", self.cfg.url.trim_end_matches('/'));
        let resp = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        if !resp.status().is_success() {
            return Err(ProviderError::Unreachable(format!(
                "cluster answered with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Approximate kNN search over a dense vector field.
    pub async fn knn_search(
        &self,
        knn: KnnQuery,
        source: &[String],
    ) -> Result<EsSearchResponse, ProviderError> {
        #[derive(Serialize)]
        struct KnnBody<'a> {
            knn: KnnQuery,
            size: u64,
            _source: &'a [String],
        }
        let body = KnnBody {
            size: knn.k,
            knn,
            _source: source,
        };
        self.search(&body).await
    }

    /// Scans documents whose keyword field matches a wildcard pattern.
    pub async fn wildcard_scan(
        &self,
        field: &str,
        pattern: &str,
        size: u64,
        source: &[String],
    ) -> Result<EsSearchResponse, ProviderError> {
        let mut wildcard = serde_json::Map::new();
        wildcard.insert(field.to_string(), serde_json::json!({ "value": pattern }));
        let body = serde_json::json!({
            "size": size,
            "query": { "wildcard": wildcard },
            "_source": source,
        });
        self.search(&body).await
    }

    pub async fn search<B: Serialize + ?Sized>(
        &self,
        body: &B,
    ) -> Result<EsSearchResponse, ProviderError> {
        let url = format!(
            "{}/{}/_search",
            self.cfg.url.trim_end_matches('/'),
            self.cfg.index
        );
        debug!(%url, "elasticsearch search");
        let resp = self
            .authorize(self.client.post(url).json(body))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {:?}",
                status, body
            )));
        }
        let parsed: EsSearchResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KnnQuery {
    pub field: String,
    pub query_vector: Vec<f32>,
    pub k: u64,
    pub num_candidates: u64,
}

#[derive(Debug, Deserialize)]
pub struct EsSearchResponse {
    pub hits: EsHits,
}

#[derive(Debug, Deserialize)]
pub struct EsHits {
    #[serde(default)]
    pub total: Option<EsTotal>,
    #[serde(default)]
    pub hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
pub struct EsTotal {
    pub value: u64,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EsHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f32>,
    #[serde(rename = "_source", default)]
    pub source: Option<serde_json::Value>,
}
