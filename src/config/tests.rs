use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.api.base_url.as_str(), DEFAULT_API_BASE_URL);
    assert!(settings.api.api_key.is_none());
    assert_eq!(settings.cache.memory_limit.get(), 256);
    assert!(settings.cache.persist);
    assert_eq!(settings.cache.quota_bytes, Some(5 * 1024 * 1024));
    assert_eq!(settings.pipeline.ttl, Duration::from_secs(60));
    assert_eq!(settings.pipeline.page_size.get(), 20);
    assert_eq!(settings.batch.concurrency.get(), 4);
    assert_eq!(settings.batch.base_delay, Duration::from_millis(300));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.pipeline.ttl_seconds = Some(600);

    let overrides = CommonOverrides {
        log_level: Some("debug".to_string()),
        ttl_seconds: Some(5),
        ..Default::default()
    };

    raw.apply_common_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.pipeline.ttl, Duration::from_secs(5));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = CommonOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_common_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn base_url_gains_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("https://example.test/api/v2".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.api.base_url.as_str(), "https://example.test/api/v2/");
}

#[test]
fn non_http_base_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("ftp://example.test/".to_string());

    let err = Settings::from_raw(raw).expect_err("ftp rejected");
    assert!(matches!(err, LoadError::Invalid { key: "api.base_url", .. }));
}

#[test]
fn blank_api_key_is_dropped() {
    let mut raw = RawSettings::default();
    raw.api.key = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.api.api_key.is_none());
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.pipeline.page_size = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero page size");
    assert!(matches!(err, LoadError::Invalid { key: "pipeline.page_size", .. }));

    let mut raw = RawSettings::default();
    raw.batch.concurrency = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero concurrency");
    assert!(matches!(err, LoadError::Invalid { key: "batch.concurrency", .. }));

    let mut raw = RawSettings::default();
    raw.cache.memory_limit = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero memory limit");
    assert!(matches!(err, LoadError::Invalid { key: "cache.memory_limit", .. }));
}

#[test]
fn zero_quota_disables_the_check() {
    let mut raw = RawSettings::default();
    raw.cache.quota_bytes = Some(0);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.quota_bytes, None);
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn parse_list_arguments() {
    let args = CliArgs::parse_from([
        "sourcedeck",
        "list",
        "products",
        "--filter",
        "status=active",
        "-f",
        "q=a=b",
        "--all",
        "--page-size",
        "50",
    ]);

    match args.command {
        Command::List(list) => {
            assert_eq!(list.path, "products");
            assert_eq!(
                list.filters,
                vec![
                    ("status".to_string(), "active".to_string()),
                    ("q".to_string(), "a=b".to_string()),
                ]
            );
            assert!(list.all);
            assert!(!list.cached);
            assert_eq!(list.page_size, Some(50));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_batch_arguments() {
    let args = CliArgs::parse_from([
        "sourcedeck",
        "batch",
        "products",
        "suppliers",
        "--concurrency",
        "2",
        "--retries",
        "3",
    ]);

    match args.command {
        Command::Batch(batch) => {
            assert_eq!(batch.paths, vec!["products", "suppliers"]);
            assert_eq!(batch.concurrency, Some(2));
            assert_eq!(batch.retries, Some(3));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_cache_show_with_global_overrides() {
    let args = CliArgs::parse_from([
        "sourcedeck",
        "cache",
        "show",
        "products",
        "--cache-directory",
        "/tmp/sourcedeck",
        "-f",
        "status=draft",
    ]);

    assert_eq!(
        args.overrides.cache_directory.as_deref(),
        Some(std::path::Path::new("/tmp/sourcedeck"))
    );
    match args.command {
        Command::Cache(CacheArgs {
            command: CacheCommand::Show(show),
        }) => {
            assert_eq!(show.path, "products");
            assert_eq!(show.filters, vec![("status".to_string(), "draft".to_string())]);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn batch_requires_a_path() {
    assert!(CliArgs::try_parse_from(["sourcedeck", "batch"]).is_err());
}

#[test]
fn filter_parser_rejects_missing_separator() {
    assert!(parse_filter("status").is_err());
    assert!(parse_filter("=active").is_err());
    assert_eq!(
        parse_filter("status=").expect("empty value allowed"),
        ("status".to_string(), String::new())
    );
}
