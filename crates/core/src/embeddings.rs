use crate::error::{AnalysisError, Result};
use providers::EmbeddingProvider;

/// Embeds one query text. Blank text is rejected before the provider is called.
pub async fn embed_query(text: &str, provider: &dyn EmbeddingProvider) -> Result<Vec<f32>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::InvalidQuery("query text is empty".into()));
    }
    let resp = provider
        .embed(&[text.to_string()])
        .await
        .map_err(AnalysisError::from_embedding)?;
    let vector = resp.vectors.into_iter().next().unwrap_or_default();
    if vector.is_empty() {
        return Err(AnalysisError::Embedding(
            "provider returned an empty vector".into(),
        ));
    }
    Ok(vector)
}
