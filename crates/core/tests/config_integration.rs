//! depgraph.toml integration tests
//!
//! - depgraph.toml.example parsing
//! - partial configs (one section only)
//! - env override precedence
//! - malformed input errors

use depgraph_core::config::DepGraphConfig;
use depgraph_core::error::{ConfigError, DepGraphError};

const EXAMPLE: &str = include_str!("../../../depgraph.toml.example");

// =============================================================================
// depgraph.toml.example
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = DepGraphConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.crawler.output_path, "dependencies.json");
    assert_eq!(config.crawler.max_iterations, 100);
    assert_eq!(config.crawler.ref_strategy, "default-branch");
}

#[test]
fn example_config_passes_validation() {
    let config = DepGraphConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = DepGraphConfig::parse(EXAMPLE).expect("should parse");
    let from_code = DepGraphConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);
    assert_eq!(from_file.crawler.seed_source, from_code.crawler.seed_source);
    assert_eq!(from_file.crawler.self_identity, from_code.crawler.self_identity);
    assert_eq!(from_file.crawler.output_path, from_code.crawler.output_path);
    assert_eq!(
        from_file.crawler.max_iterations,
        from_code.crawler.max_iterations
    );
    assert_eq!(from_file.crawler.concurrency, from_code.crawler.concurrency);
    assert_eq!(
        from_file.crawler.fetch_timeout_secs,
        from_code.crawler.fetch_timeout_secs
    );
    assert_eq!(
        from_file.crawler.git_timeout_secs,
        from_code.crawler.git_timeout_secs
    );
    assert_eq!(from_file.crawler.max_redirects, from_code.crawler.max_redirects);
    assert_eq!(from_file.crawler.forge_domains, from_code.crawler.forge_domains);
    assert_eq!(from_file.crawler.ref_strategy, from_code.crawler.ref_strategy);
    assert_eq!(
        from_file.crawler.min_tools_version,
        from_code.crawler.min_tools_version
    );
    assert_eq!(
        from_file.crawler.max_tools_version,
        from_code.crawler.max_tools_version
    );
}

// =============================================================================
// Partial configs
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "json"
"#;
    let config = DepGraphConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "json");
    // crawler section keeps defaults
    assert_eq!(config.crawler.max_iterations, 100);
}

#[test]
fn partial_config_crawler_only() {
    let toml = r#"
[crawler]
seed_source = "./packages.json"
forge_domains = ["github.com"]
ref_strategy = "latest-tag"
"#;
    let config = DepGraphConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.crawler.seed_source, "./packages.json");
    assert_eq!(config.crawler.forge_domains, vec!["github.com"]);
    assert_eq!(config.crawler.ref_strategy, "latest-tag");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn empty_config_uses_defaults() {
    let config = DepGraphConfig::parse("").expect("empty config should parse");
    config.validate().expect("defaults should validate");
}

// =============================================================================
// Env overrides
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;

    let original = std::env::var("DEPGRAPH_GENERAL_LOG_LEVEL").ok();
    // SAFETY: tests touching the environment are serialised with #[serial].
    unsafe {
        std::env::set_var("DEPGRAPH_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = DepGraphConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    // SAFETY: test cleanup
    unsafe {
        match original {
            Some(val) => std::env::set_var("DEPGRAPH_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("DEPGRAPH_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_csv_for_forge_domains() {
    let original = std::env::var("DEPGRAPH_CRAWLER_FORGE_DOMAINS").ok();
    // SAFETY: tests touching the environment are serialised with #[serial].
    unsafe {
        std::env::set_var(
            "DEPGRAPH_CRAWLER_FORGE_DOMAINS",
            "github.com, git.example.org",
        );
    }

    let mut config = DepGraphConfig::default();
    config.apply_env_overrides();
    let result = config.crawler.forge_domains.clone();

    // SAFETY: test cleanup
    unsafe {
        match original {
            Some(val) => std::env::set_var("DEPGRAPH_CRAWLER_FORGE_DOMAINS", val),
            None => std::env::remove_var("DEPGRAPH_CRAWLER_FORGE_DOMAINS"),
        }
    }

    assert_eq!(result, vec!["github.com", "git.example.org"]);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let original = std::env::var("DEPGRAPH_CRAWLER_MAX_ITERATIONS").ok();
    // SAFETY: tests touching the environment are serialised with #[serial].
    unsafe {
        std::env::set_var("DEPGRAPH_CRAWLER_MAX_ITERATIONS", "25");
    }

    let mut config = DepGraphConfig::parse(EXAMPLE).expect("should parse");
    config.apply_env_overrides();
    let result = config.crawler.max_iterations;

    // SAFETY: test cleanup
    unsafe {
        match original {
            Some(val) => std::env::set_var("DEPGRAPH_CRAWLER_MAX_ITERATIONS", val),
            None => std::env::remove_var("DEPGRAPH_CRAWLER_MAX_ITERATIONS"),
        }
    }

    assert_eq!(result, 25);
}

// =============================================================================
// Malformed input
// =============================================================================

#[test]
fn invalid_toml_syntax() {
    let result = DepGraphConfig::parse("[crawler\nmax_iterations = 3");
    assert!(matches!(
        result.unwrap_err(),
        DepGraphError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[crawler]
max_iterations = "one hundred"
"#;
    assert!(matches!(
        DepGraphConfig::parse(toml).unwrap_err(),
        DepGraphError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn out_of_range_value_fails_validation() {
    let toml = r#"
[crawler]
max_redirects = 500
"#;
    let config = DepGraphConfig::parse(toml).expect("should parse");
    assert!(matches!(
        config.validate().unwrap_err(),
        DepGraphError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn load_example_config_from_disk() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let example_path = format!("{}/../../depgraph.toml.example", manifest_dir);

    let config = DepGraphConfig::from_file(&example_path)
        .await
        .expect("example config should load");
    assert_eq!(config.general.log_level, "info");
}

#[tokio::test]
async fn load_from_tempfile() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("depgraph.toml");
    std::fs::write(&path, "[crawler]\nconcurrency = 8\n").expect("should write");

    let config = DepGraphConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.crawler.concurrency, 8);
}
