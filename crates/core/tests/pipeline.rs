use providers::{EmbedResponse, EmbeddingProvider, ProviderError};
use std::sync::Arc;
use trend_core::config::{AnalysisConfig, FieldSchema};
use trend_core::models::SearchHit;
use trend_core::pipeline::{Capabilities, TrendPipeline};
use trend_core::report::{AnalysisOutcome, TrendOutcome};
use trend_core::store::{DocumentStore, InMemoryStore, KnnRequest, ScanRequest, StoredPatent};
use trend_core::AnalysisError;

struct FixedEmbedder(Vec<f32>);

#[async_trait::async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: vec![self.0.clone(); texts.len()],
        })
    }
}

struct UnreachableEmbedder;

#[async_trait::async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Err(ProviderError::Unreachable("connection refused".into()))
    }
}

/// Delegates to an in-memory store but fails scans for one prefix.
struct FlakyStore {
    inner: InMemoryStore,
    failing_prefix: String,
    failure: fn() -> ProviderError,
}

#[async_trait::async_trait]
impl DocumentStore for FlakyStore {
    async fn ping(&self) -> Result<(), ProviderError> {
        self.inner.ping().await
    }

    async fn knn_search(&self, req: &KnnRequest) -> Result<Vec<SearchHit>, ProviderError> {
        self.inner.knn_search(req).await
    }

    async fn prefix_scan(&self, req: &ScanRequest) -> Result<Vec<SearchHit>, ProviderError> {
        if req.filter.prefix == self.failing_prefix {
            return Err((self.failure)());
        }
        self.inner.prefix_scan(req).await
    }
}

struct DownStore;

#[async_trait::async_trait]
impl DocumentStore for DownStore {
    async fn ping(&self) -> Result<(), ProviderError> {
        Err(ProviderError::Unreachable("connection refused".into()))
    }

    async fn knn_search(&self, _req: &KnnRequest) -> Result<Vec<SearchHit>, ProviderError> {
        Err(ProviderError::Unreachable("connection refused".into()))
    }

    async fn prefix_scan(&self, _req: &ScanRequest) -> Result<Vec<SearchHit>, ProviderError> {
        Err(ProviderError::Unreachable("connection refused".into()))
    }
}

fn patent(id: &str, vector: Vec<f32>, cpc: &str, date: &str) -> StoredPatent {
    StoredPatent {
        id: id.to_string(),
        vector,
        classification: cpc.to_string(),
        application_date: Some(date.to_string()),
        ..StoredPatent::default()
    }
}

/// Two relevant drone patents carrying B64C, G05D, B64C, H04W; one
/// unrelated patent; background documents that only feed the yearly scans.
fn drone_corpus() -> InMemoryStore {
    let mut store = InMemoryStore::default()
        .with_document(patent(
            "swarm-1",
            vec![1.0, 0.0],
            "B64C39/024 | G05D1/0088",
            "2015-04-01",
        ))
        .with_document(patent(
            "swarm-2",
            vec![0.95, 0.31],
            "B64C27/08 | H04W84/18",
            "2016-08-12",
        ))
        .with_document(patent("plough", vec![-1.0, 0.0], "A01B1/00", "2016-01-01"));

    // B64C: cumulative 3, 9, 20, 35, 42 over 2015..2019 including the two above.
    let background = [(2015, 2), (2016, 5), (2017, 11), (2018, 15), (2019, 7)];
    for (year, count) in background {
        for i in 0..count {
            store.insert(patent(
                &format!("b64c-{}-{}", year, i),
                Vec::new(),
                "B64C39/02",
                &format!("{}-06-01", year),
            ));
        }
    }
    // G05D: only two distinct years.
    store.insert(patent("g05d-1", Vec::new(), "G05D1/10", "2018-01-01"));
    store.insert(patent("g05d-2", Vec::new(), "G05D1/10", "2019-01-01"));
    store
}

fn config() -> AnalysisConfig {
    AnalysisConfig {
        forecast_horizon_year: 2030,
        ..AnalysisConfig::default()
    }
}

fn pipeline_with(store: Arc<dyn DocumentStore>, analysis: AnalysisConfig) -> TrendPipeline {
    let caps = Capabilities::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), store);
    TrendPipeline::new(caps, FieldSchema::default(), analysis).unwrap()
}

#[tokio::test]
async fn ranks_codes_of_relevant_hits() {
    let pipeline = pipeline_with(Arc::new(drone_corpus()), config());
    let outcome = pipeline.run("drone swarm navigation").await.unwrap();
    let report = outcome.report().expect("report");

    assert_eq!(report.relevant_hits, 2);
    let top: Vec<(&str, usize)> = report
        .top_codes
        .iter()
        .map(|c| (c.code.as_str(), c.count))
        .collect();
    assert_eq!(top, vec![("B64C", 2), ("G05D", 1), ("H04W", 1)]);
    assert_eq!(report.trends.len(), 3);
}

#[tokio::test]
async fn forecasts_dominant_code_and_reports_the_rest() {
    let pipeline = pipeline_with(Arc::new(drone_corpus()), config());
    let outcome = pipeline.run("drone swarm navigation").await.unwrap();
    let report = outcome.report().unwrap();

    let b64c = report.trend("B64C").unwrap();
    let TrendOutcome::Forecasted(forecast) = &b64c.outcome else {
        panic!("expected forecast, got {:?}", b64c.outcome);
    };
    let cumulative: Vec<u64> = forecast.series.points().iter().map(|p| p.cumulative).collect();
    assert_eq!(cumulative, vec![3, 9, 20, 35, 42]);
    let k = forecast.fit.model.carrying_capacity;
    assert!((45.0..=55.0).contains(&k), "K = {}", k);
    let horizon = forecast.at_horizon().unwrap();
    assert_eq!(horizon.year, 2030);
    assert!(horizon.cumulative > 42.0 && horizon.cumulative < k);

    let g05d = report.trend("G05D").unwrap();
    assert!(matches!(
        g05d.outcome,
        TrendOutcome::InsufficientData { distinct_years: 2, .. }
    ));
    assert!(g05d.outcome.message().starts_with("Not enough data"));

    let h04w = report.trend("H04W").unwrap();
    assert!(matches!(h04w.outcome, TrendOutcome::NoData));
}

#[tokio::test]
async fn one_code_timing_out_does_not_abort_the_others() {
    let store = FlakyStore {
        inner: drone_corpus(),
        failing_prefix: "G05D".to_string(),
        failure: || ProviderError::Timeout("scan exceeded 60s".into()),
    };
    let pipeline = pipeline_with(Arc::new(store), config());
    let outcome = pipeline.run("drone swarm navigation").await.unwrap();
    let report = outcome.report().unwrap();

    let g05d = &report.trend("G05D").unwrap().outcome;
    let TrendOutcome::RetrievalFailed { reason } = g05d else {
        panic!("expected retrieval failure, got {:?}", g05d);
    };
    assert_eq!(reason, "request timed out: scan exceeded 60s");
    assert_eq!(
        g05d.message(),
        "Could not retrieve documents: request timed out: scan exceeded 60s"
    );
    assert!(report.trend("B64C").unwrap().outcome.is_forecast());
}

#[tokio::test]
async fn store_lost_during_yearly_scans_aborts_the_run() {
    let store = FlakyStore {
        inner: drone_corpus(),
        failing_prefix: "B64C".to_string(),
        failure: || ProviderError::Unreachable("connection refused".into()),
    };
    let pipeline = pipeline_with(Arc::new(store), config());
    let err = pipeline.run("drone swarm navigation").await.unwrap_err();
    assert!(matches!(err, AnalysisError::Connection(_)));
    assert!(err.user_message().starts_with("Cannot connect to the search service"));
}

#[tokio::test]
async fn one_code_failing_to_fit_does_not_abort_the_others() {
    // G01S doubles its cumulative count every year, so no saturation exists.
    let mut store = drone_corpus().with_document(patent(
        "lidar-1",
        vec![0.9, 0.2],
        "G01S17/89",
        "2013-05-01",
    ));
    for (year, count) in [(2014, 1), (2015, 2), (2016, 4), (2017, 8), (2018, 16), (2019, 32)] {
        for i in 0..count {
            store.insert(patent(
                &format!("g01s-{}-{}", year, i),
                Vec::new(),
                "G01S17/89",
                &format!("{}-06-01", year),
            ));
        }
    }
    let pipeline = pipeline_with(Arc::new(store), config());
    let outcome = pipeline.run("drone swarm navigation").await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.relevant_hits, 3);

    let g01s = report.trend("G01S").unwrap();
    let TrendOutcome::FitFailed { series, .. } = &g01s.outcome else {
        panic!("expected fit failure, got {:?}", g01s.outcome);
    };
    let cumulative: Vec<u64> = series.points().iter().map(|p| p.cumulative).collect();
    assert_eq!(cumulative, vec![1, 2, 4, 8, 16, 32, 64]);
    assert_eq!(g01s.outcome.message(), "Could not fit a growth model to this data.");

    assert!(report.trend("B64C").unwrap().outcome.is_forecast());
    assert!(matches!(
        report.trend("G05D").unwrap().outcome,
        TrendOutcome::InsufficientData { .. }
    ));
}

#[tokio::test]
async fn ranking_is_stable_across_runs() {
    let pipeline = pipeline_with(Arc::new(drone_corpus()), config());
    let first = pipeline.run("drone swarm navigation").await.unwrap();
    let second = pipeline.run("drone swarm navigation").await.unwrap();
    assert_eq!(first.report().unwrap().top_codes, second.report().unwrap().top_codes);
}

#[tokio::test]
async fn nothing_above_threshold_is_an_empty_outcome() {
    let analysis = AnalysisConfig {
        relevance_threshold: 0.999,
        ..config()
    };
    let caps = Capabilities::new(
        Arc::new(FixedEmbedder(vec![0.0, 1.0])),
        Arc::new(drone_corpus()),
    );
    let pipeline = TrendPipeline::new(caps, FieldSchema::default(), analysis).unwrap();
    let outcome = pipeline.run("anything").await.unwrap();
    assert!(matches!(
        outcome,
        AnalysisOutcome::NoRelevantHits { searched_hits: 3, .. }
    ));
}

#[tokio::test]
async fn hits_without_codes_are_an_empty_outcome() {
    let store =
        InMemoryStore::default().with_document(patent("bare", vec![1.0, 0.0], "", "2020-01-01"));
    let pipeline = pipeline_with(Arc::new(store), config());
    let outcome = pipeline.run("drone").await.unwrap();
    assert!(matches!(outcome, AnalysisOutcome::NoCodes { relevant_hits: 1 }));
    assert_eq!(outcome.message(), "No classification codes found in the results.");
}

#[tokio::test]
async fn unreachable_services_abort_the_run() {
    let pipeline = pipeline_with(Arc::new(DownStore), config());
    let err = pipeline.run("drone").await.unwrap_err();
    assert!(matches!(err, AnalysisError::Connection(_)));
    assert!(err.is_fatal());
    assert!(matches!(
        pipeline.check_connection().await,
        Err(AnalysisError::Connection(_))
    ));

    let caps = Capabilities::new(Arc::new(UnreachableEmbedder), Arc::new(drone_corpus()));
    let pipeline = TrendPipeline::new(caps, FieldSchema::default(), config()).unwrap();
    assert!(matches!(
        pipeline.run("drone").await,
        Err(AnalysisError::Connection(_))
    ));
}

#[tokio::test]
async fn blank_query_and_bad_threshold_are_rejected() {
    let pipeline = pipeline_with(Arc::new(drone_corpus()), config());
    assert!(matches!(
        pipeline.run("  ").await,
        Err(AnalysisError::InvalidQuery(_))
    ));

    let caps = Capabilities::new(
        Arc::new(FixedEmbedder(vec![1.0, 0.0])),
        Arc::new(drone_corpus()),
    );
    let bad = AnalysisConfig {
        relevance_threshold: 1.01,
        ..config()
    };
    assert!(matches!(
        TrendPipeline::new(caps, FieldSchema::default(), bad),
        Err(AnalysisError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn document_search_returns_nearest_titles() {
    let store = InMemoryStore::default()
        .with_document(StoredPatent {
            id: "t1".into(),
            vector: vec![1.0, 0.0],
            title: Some("Swarm flight controller".into()),
            abstract_text: Some("Coordinates many drones.".into()),
            ..StoredPatent::default()
        })
        .with_document(StoredPatent {
            id: "t2".into(),
            vector: vec![0.0, 1.0],
            title: Some("Seed drill".into()),
            ..StoredPatent::default()
        });
    let pipeline = pipeline_with(Arc::new(store), config());
    let hits = pipeline.search_documents("swarm", 1, 10_000).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title.as_deref(), Some("Swarm flight controller"));
}
