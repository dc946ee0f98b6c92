//! Core library: patent search, classification code ranking, yearly series
//! and logistic growth forecasts.

pub mod codes;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod forecast;
pub mod models;
pub mod pipeline;
pub mod relevance;
pub mod report;
pub mod search;
pub mod series;
pub mod store;

pub use error::{AnalysisError, Result};
