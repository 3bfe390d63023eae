// tests/analyzer_config.rs
use review_analyzer::config::{
    load_config_default, load_config_from, AnalyzerConfig, CounterStrategy, ResourceNames,
};
use review_analyzer::normalize;
use std::{env, fs};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("analyzer.toml");
    fs::write(
        &p_toml,
        r#"
ban_threshold = 5
extra_blocklist = ["Scammers"]

[parameters]
"table/customer_stats" = "stats-prod"
"#,
    )
    .unwrap();
    let cfg = load_config_from(&p_toml).unwrap();
    assert_eq!(cfg.ban_threshold, 5);
    assert_eq!(ResourceNames::resolve(&cfg).stats_table, "stats-prod");
    assert!(cfg
        .profanity_detector()
        .is_profane(&normalize("Total scammers!")));

    let p_json = dir.path().join("analyzer.json");
    fs::write(&p_json, r#"{"counter_strategy":"optimistic","invocation_timeout_ms":500}"#).unwrap();
    let cfg = load_config_from(&p_json).unwrap();
    assert_eq!(cfg.counter_strategy, CounterStrategy::Optimistic);
    assert_eq!(cfg.invocation_timeout().as_millis(), 500);
}

#[test]
fn bad_files_are_rejected_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = dir.path().join("analyzer.yaml");
    fs::write(&yaml, "ban_threshold: 3").unwrap();
    assert!(load_config_from(&yaml).is_err());

    let broken = dir.path().join("analyzer.toml");
    fs::write(&broken, "ban_threshold = \"three\"").unwrap();
    let err = load_config_from(&broken).unwrap_err();
    assert!(format!("{err:#}").contains("analyzer.toml"));

    let backwards = dir.path().join("backoff.json");
    fs::write(&backwards, r#"{"retry":{"initial_backoff_ms":500,"max_backoff_ms":10}}"#).unwrap();
    assert!(load_config_from(&backwards).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var("REVIEW_ANALYZER_CONFIG");

    // 1) nothing -> defaults
    assert_eq!(load_config_default().unwrap(), AnalyzerConfig::default());

    // 2) ./config/analyzer.toml
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("analyzer.toml"), "ban_threshold = 7").unwrap();
    assert_eq!(load_config_default().unwrap().ban_threshold, 7);

    // 3) env wins
    let p_env = tmp.path().join("env.json");
    fs::write(&p_env, r#"{"ban_threshold": 1}"#).unwrap();
    env::set_var("REVIEW_ANALYZER_CONFIG", p_env.display().to_string());
    assert_eq!(load_config_default().unwrap().ban_threshold, 1);

    // 4) env pointing nowhere is an error, not a silent fallback
    env::set_var("REVIEW_ANALYZER_CONFIG", tmp.path().join("gone.toml"));
    assert!(load_config_default().is_err());
    env::remove_var("REVIEW_ANALYZER_CONFIG");

    env::set_current_dir(&old).unwrap();
}
