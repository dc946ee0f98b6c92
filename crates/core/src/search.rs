use crate::config::{AnalysisConfig, FieldSchema};
use crate::error::{AnalysisError, Result};
use crate::models::SearchHit;
use crate::store::{DocumentStore, KnnRequest};

/// kNN request of a trend run: only the classification field is needed.
pub fn trend_request(
    vector: Vec<f32>,
    analysis: &AnalysisConfig,
    fields: &FieldSchema,
) -> KnnRequest {
    KnnRequest {
        vector_field: fields.vector.clone(),
        query_vector: vector,
        k: analysis.search_k,
        num_candidates: analysis.candidate_pool_size.max(analysis.search_k),
        source_fields: vec![fields.classification.clone()],
    }
}

/// kNN request for browsing documents by title and abstract.
pub fn document_request(
    vector: Vec<f32>,
    k: u64,
    num_candidates: u64,
    fields: &FieldSchema,
) -> KnnRequest {
    KnnRequest {
        vector_field: fields.vector.clone(),
        query_vector: vector,
        k,
        num_candidates: num_candidates.max(k),
        source_fields: vec![fields.title.clone(), fields.abstract_text.clone()],
    }
}

pub async fn vector_search(store: &dyn DocumentStore, req: &KnnRequest) -> Result<Vec<SearchHit>> {
    store
        .knn_search(req)
        .await
        .map_err(AnalysisError::from_search)
}
