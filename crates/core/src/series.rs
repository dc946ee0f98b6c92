use crate::config::FieldSchema;
use crate::error::{AnalysisError, Result};
use crate::models::{SearchHit, YearlySeries};
use crate::store::{DocumentStore, PrefixFilter, ScanRequest};
use tracing::debug;

/// Builds the cumulative-by-year series for one classification prefix.
pub struct YearlySeriesBuilder<'a> {
    store: &'a dyn DocumentStore,
    fields: &'a FieldSchema,
    size_cap: u64,
}

impl<'a> YearlySeriesBuilder<'a> {
    pub fn new(store: &'a dyn DocumentStore, fields: &'a FieldSchema, size_cap: u64) -> Self {
        Self {
            store,
            fields,
            size_cap,
        }
    }

    pub fn scan_request(&self, prefix: &str) -> ScanRequest {
        ScanRequest {
            size_cap: self.size_cap,
            filter: PrefixFilter {
                field: self.fields.keyword_field(),
                prefix: prefix.to_string(),
            },
            source_fields: vec![
                self.fields.classification.clone(),
                self.fields.application_date.clone(),
            ],
        }
    }

    /// An empty series means the scan succeeded but found no dated documents.
    pub async fn build(&self, prefix: &str) -> Result<YearlySeries> {
        let hits = self
            .store
            .prefix_scan(&self.scan_request(prefix))
            .await
            .map_err(AnalysisError::retrieval)?;
        let series = series_from_hits(&hits);
        debug!(
            prefix,
            documents = hits.len(),
            years = series.len(),
            "yearly series built"
        );
        Ok(series)
    }
}

/// Counts documents per application year; undated documents are skipped.
pub fn series_from_hits(hits: &[SearchHit]) -> YearlySeries {
    YearlySeries::from_years(hits.iter().filter_map(SearchHit::application_year))
}
