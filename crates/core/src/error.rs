use providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("insufficient data: {distinct_years} distinct year(s), at least 3 required")]
    InsufficientData { distinct_years: usize },
    #[error("fit did not converge after {evaluations} evaluations")]
    FitDivergence { evaluations: usize },
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Store failures during a per-code step. Timeouts and failed queries
    /// are scoped to that code; an unreachable store ends the run.
    pub fn retrieval(err: ProviderError) -> Self {
        match err {
            ProviderError::Unreachable(_) => AnalysisError::Connection(err.to_string()),
            other => AnalysisError::Retrieval(other.to_string()),
        }
    }

    /// Failures of the run-wide search step: an unreachable service is a
    /// connection error, anything else a retrieval error.
    pub fn from_search(err: ProviderError) -> Self {
        if err.is_connectivity() {
            AnalysisError::Connection(err.to_string())
        } else {
            AnalysisError::Retrieval(err.to_string())
        }
    }

    pub fn from_embedding(err: ProviderError) -> Self {
        if err.is_connectivity() {
            AnalysisError::Connection(err.to_string())
        } else {
            AnalysisError::Embedding(err.to_string())
        }
    }

    /// Whether the error ends the whole run rather than one code's analysis.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AnalysisError::Retrieval(_)
                | AnalysisError::InsufficientData { .. }
                | AnalysisError::FitDivergence { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Connection(_) => {
                "Cannot connect to the search service. Check that it is running and reachable."
                    .to_string()
            }
            AnalysisError::Retrieval(detail) => {
                format!("Could not retrieve documents: {}", detail)
            }
            AnalysisError::InsufficientData { distinct_years } => format!(
                "Not enough data to forecast: found {} distinct year(s), need at least 3.",
                distinct_years
            ),
            AnalysisError::FitDivergence { .. } => {
                "Could not fit a growth model to this data.".to_string()
            }
            AnalysisError::Embedding(detail) => {
                format!("Could not embed the query text: {}", detail)
            }
            AnalysisError::InvalidQuery(detail) => format!("Invalid query: {}", detail),
            AnalysisError::InvalidConfig(detail) => format!("Invalid configuration: {}", detail),
            AnalysisError::Config(err) => format!("Could not load configuration: {}", err),
        }
    }
}
