//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sourcedeck";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api/";
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_MEMORY_LIMIT: u64 = 256;
const DEFAULT_CACHE_DIRECTORY: &str = ".sourcedeck/cache";
const DEFAULT_CACHE_QUOTA_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_PIPELINE_TTL_SECS: u64 = 60;
const DEFAULT_PIPELINE_PAGE_SIZE: u64 = 20;
const DEFAULT_BATCH_CONCURRENCY: u64 = 4;
const DEFAULT_BATCH_RETRIES: u32 = 2;
const DEFAULT_BATCH_BASE_DELAY_MS: u64 = 300;

/// Command-line arguments for the sourcedeck binary.
#[derive(Debug, Parser)]
#[command(
    name = "sourcedeck",
    version,
    about = "Browse and warm cached list endpoints"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SOURCEDECK_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print one list query, serving a fresh cached page first.
    List(ListArgs),
    /// Fetch the first page of several lists with bounded concurrency.
    Batch(BatchArgs),
    /// Inspect the list cache.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    /// Collection path relative to the API base URL.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Query filter as `key=value`; repeatable.
    #[arg(long = "filter", short = 'f', value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    /// Keep loading pages until the collection is exhausted.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub all: bool,

    /// Override the page size.
    #[arg(long = "page-size", value_name = "COUNT")]
    pub page_size: Option<u64>,

    /// Serve a fresh cached page without revalidating it.
    #[arg(long = "cached", action = clap::ArgAction::SetTrue)]
    pub cached: bool,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Collection paths to fetch.
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<String>,

    /// Override the number of concurrent fetches.
    #[arg(long, value_name = "COUNT")]
    pub concurrency: Option<u64>,

    /// Override the retry budget for transient failures.
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Print the cache key, freshness and stored entry for a query.
    Show(CacheShowArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CacheShowArgs {
    /// Collection path relative to the API base URL.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Query filter as `key=value`; repeatable.
    #[arg(long = "filter", short = 'f', value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the API base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the API bearer key.
    #[arg(long = "api-key", env = "SOURCEDECK_API_KEY", value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// Override the list cache directory.
    #[arg(long = "cache-directory", value_name = "PATH", global = true)]
    pub cache_directory: Option<PathBuf>,

    /// Toggle writing list pages through to disk.
    #[arg(
        long = "cache-persist",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_persist: Option<bool>,

    /// Override how long a cached page counts as fresh.
    #[arg(long = "ttl-seconds", value_name = "SECONDS", global = true)]
    pub ttl_seconds: Option<u64>,
}

/// Parse a `key=value` filter argument.
pub fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("filter key must not be empty in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub pipeline: PipelineSettings,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Always ends with `/` so relative paths join beneath it.
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub memory_limit: NonZeroUsize,
    pub persist: bool,
    pub directory: PathBuf,
    /// `None` when the configured quota is zero.
    pub quota_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub ttl: Duration,
    pub page_size: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub concurrency: NonZeroUsize,
    pub retries: u32,
    pub base_delay: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SOURCEDECK").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_common_overrides(&cli.overrides);
    match &cli.command {
        Command::List(args) => {
            if let Some(size) = args.page_size {
                raw.pipeline.page_size = Some(size);
            }
        }
        Command::Batch(args) => {
            if let Some(concurrency) = args.concurrency {
                raw.batch.concurrency = Some(concurrency);
            }
            if let Some(retries) = args.retries {
                raw.batch.retries = Some(retries);
            }
        }
        Command::Cache(_) => {}
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    api: RawApiSettings,
    cache: RawCacheSettings,
    pipeline: RawPipelineSettings,
    batch: RawBatchSettings,
}

impl RawSettings {
    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(key) = overrides.api_key.as_ref() {
            self.api.key = Some(key.clone());
        }
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(persist) = overrides.cache_persist {
            self.cache.persist = Some(persist);
        }
        if let Some(ttl) = overrides.ttl_seconds {
            self.pipeline.ttl_seconds = Some(ttl);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            api,
            cache,
            pipeline,
            batch,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            api: build_api_settings(api)?,
            cache: build_cache_settings(cache)?,
            pipeline: build_pipeline_settings(pipeline)?,
            batch: build_batch_settings(batch)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid("api.base_url", "must not be empty"));
    }
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let base_url = Url::parse(&normalized)
        .map_err(|err| LoadError::invalid("api.base_url", format!("invalid url: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            format!("unsupported scheme `{}`", base_url.scheme()),
        ));
    }

    let api_key = api.key.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let timeout_secs = api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "api.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ApiSettings {
        base_url,
        api_key,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let memory_limit = non_zero_usize(
        cache.memory_limit.unwrap_or(DEFAULT_CACHE_MEMORY_LIMIT),
        "cache.memory_limit",
    )?;

    let directory = cache
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIRECTORY));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    let quota_bytes = match cache.quota_bytes.unwrap_or(DEFAULT_CACHE_QUOTA_BYTES) {
        0 => None,
        bytes => Some(bytes),
    };

    Ok(CacheSettings {
        memory_limit,
        persist: cache.persist.unwrap_or(true),
        directory,
        quota_bytes,
    })
}

fn build_pipeline_settings(pipeline: RawPipelineSettings) -> Result<PipelineSettings, LoadError> {
    let ttl_secs = pipeline.ttl_seconds.unwrap_or(DEFAULT_PIPELINE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "pipeline.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let page_size = NonZeroU64::new(pipeline.page_size.unwrap_or(DEFAULT_PIPELINE_PAGE_SIZE))
        .ok_or_else(|| LoadError::invalid("pipeline.page_size", "must be greater than zero"))?;

    Ok(PipelineSettings {
        ttl: Duration::from_secs(ttl_secs),
        page_size,
    })
}

fn build_batch_settings(batch: RawBatchSettings) -> Result<BatchSettings, LoadError> {
    let concurrency = non_zero_usize(
        batch.concurrency.unwrap_or(DEFAULT_BATCH_CONCURRENCY),
        "batch.concurrency",
    )?;

    Ok(BatchSettings {
        concurrency,
        retries: batch.retries.unwrap_or(DEFAULT_BATCH_RETRIES),
        base_delay: Duration::from_millis(
            batch.base_delay_ms.unwrap_or(DEFAULT_BATCH_BASE_DELAY_MS),
        ),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    key: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    memory_limit: Option<u64>,
    persist: Option<bool>,
    directory: Option<PathBuf>,
    quota_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPipelineSettings {
    ttl_seconds: Option<u64>,
    page_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBatchSettings {
    concurrency: Option<u64>,
    retries: Option<u32>,
    base_delay_ms: Option<u64>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
