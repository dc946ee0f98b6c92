use cli::overrides::Overrides;
use std::fs;
use tempfile::tempdir;
use trend_core::config::{self, AppConfig};

#[test]
fn flags_take_precedence_over_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trends.toml");
    fs::write(
        &path,
        r#"
[store]
url = "http://search.internal:9200"
index = "drone_patents"

[analysis]
relevance_threshold = 0.6
top_n_codes = 3
"#,
    )
    .unwrap();

    let cfg = config::load(path.to_str()).unwrap();
    assert_eq!(cfg.store.index, "drone_patents");
    assert_eq!(cfg.analysis.top_n_codes, 3);
    assert_eq!(cfg.analysis.forecast_horizon_year, 2050);

    let cfg = Overrides {
        index: Some("uav_patents_v2".into()),
        threshold: Some(0.75),
        horizon: Some(2035),
        ..Overrides::default()
    }
    .apply(cfg);
    assert_eq!(cfg.store.url, "http://search.internal:9200");
    assert_eq!(cfg.store.index, "uav_patents_v2");
    assert_eq!(cfg.analysis.relevance_threshold, 0.75);
    assert_eq!(cfg.analysis.top_n_codes, 3);
    assert_eq!(cfg.analysis.forecast_horizon_year, 2035);
}

#[test]
fn empty_overrides_keep_config() {
    let base = AppConfig::default();
    let cfg = Overrides::default().apply(base.clone());
    assert_eq!(cfg.store.index, base.store.index);
    assert_eq!(cfg.analysis.top_n_codes, base.analysis.top_n_codes);
    assert_eq!(cfg.analysis.candidate_pool_size, base.analysis.candidate_pool_size);
}
