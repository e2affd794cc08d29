//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;


const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "foglio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FILE_EXTENSION: &str = "md";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_BUST_TOKEN: &str = "bust";
const DEFAULT_TEMPLATE_DIR: &str = "templates";
const DEFAULT_TEMPLATE_EXTENSION: &str = "html";

/// Command-line arguments for the Foglio binary.
#[derive(Debug, Parser)]
#[command(name = "foglio", version, about = "Foglio site server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "FOGLIO_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the base URL documents are fetched from.
    #[arg(long = "remote-base-url", value_name = "URL")]
    pub remote_base_url: Option<String>,

    /// Override the remote document file extension.
    #[arg(long = "remote-file-extension", value_name = "EXT")]
    pub remote_file_extension: Option<String>,

    /// Override the suffix appended to every document URL (e.g. `?download`).
    #[arg(long = "remote-url-postfix", value_name = "SUFFIX")]
    pub remote_url_postfix: Option<String>,

    /// Override the prefix for relative image references.
    #[arg(long = "remote-image-path", value_name = "URL")]
    pub remote_image_path: Option<String>,

    /// Override the per-fetch timeout.
    #[arg(long = "remote-fetch-timeout-seconds", value_name = "SECONDS")]
    pub remote_fetch_timeout_seconds: Option<u64>,

    /// Override how long fetched documents stay cached.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the query-string token that busts the document cache.
    #[arg(long = "cache-bust-token", value_name = "TOKEN")]
    pub cache_bust_token: Option<String>,

    /// Override the directory layout templates are read from.
    #[arg(long = "templates-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub templates_directory: Option<PathBuf>,

    /// Override the layout template file extension.
    #[arg(long = "templates-extension", value_name = "EXT")]
    pub templates_extension: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub remote: RemoteSettings,
    pub cache: CacheSettings,
    pub templates: TemplateSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
pub struct RemoteSettings {
    pub base_url: String,
    pub file_extension: String,
    pub url_postfix: String,
    pub image_path: String,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub bust_token: String,
}

#[derive(Debug, Clone)]
pub struct TemplateSettings {
    pub directory: PathBuf,
    pub extension: String,
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

/// Parse the CLI and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOGLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    remote: RawRemoteSettings,
    cache: RawCacheSettings,
    templates: RawTemplateSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    base_url: Option<String>,
    file_extension: Option<String>,
    url_postfix: Option<String>,
    image_path: Option<String>,
    fetch_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    bust_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTemplateSettings {
    directory: Option<PathBuf>,
    extension: Option<String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.remote_base_url.as_ref() {
            self.remote.base_url = Some(url.clone());
        }
        if let Some(extension) = overrides.remote_file_extension.as_ref() {
            self.remote.file_extension = Some(extension.clone());
        }
        if let Some(postfix) = overrides.remote_url_postfix.as_ref() {
            self.remote.url_postfix = Some(postfix.clone());
        }
        if let Some(path) = overrides.remote_image_path.as_ref() {
            self.remote.image_path = Some(path.clone());
        }
        if let Some(seconds) = overrides.remote_fetch_timeout_seconds {
            self.remote.fetch_timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(seconds);
        }
        if let Some(token) = overrides.cache_bust_token.as_ref() {
            self.cache.bust_token = Some(token.clone());
        }
        if let Some(directory) = overrides.templates_directory.as_ref() {
            self.templates.directory = Some(directory.clone());
        }
        if let Some(extension) = overrides.templates_extension.as_ref() {
            self.templates.extension = Some(extension.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            remote,
            cache,
            templates,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let remote = build_remote_settings(remote)?;
        let cache = build_cache_settings(cache)?;
        let templates = build_template_settings(templates)?;

        Ok(Self {
            server,
            logging,
            remote,
            cache,
            templates,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
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

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let base_url = remote
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::invalid("remote.base_url", "a document base URL is required"))?
        .trim_end_matches('/')
        .to_string();

    Url::parse(&base_url)
        .map_err(|err| LoadError::invalid("remote.base_url", format!("failed to parse: {err}")))?;

    let file_extension = remote
        .file_extension
        .unwrap_or_else(|| DEFAULT_FILE_EXTENSION.to_string());
    if file_extension.is_empty() {
        return Err(LoadError::invalid(
            "remote.file_extension",
            "extension must not be empty",
        ));
    }

    let url_postfix = remote.url_postfix.unwrap_or_default();

    let image_path = match remote.image_path {
        Some(path) if !path.trim().is_empty() => path.trim_end_matches('/').to_string(),
        _ => format!("{base_url}/images"),
    };

    let timeout_secs = remote
        .fetch_timeout_seconds
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "remote.fetch_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RemoteSettings {
        base_url,
        file_extension,
        url_postfix,
        image_path,
        fetch_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_secs = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let bust_token = cache
        .bust_token
        .unwrap_or_else(|| DEFAULT_BUST_TOKEN.to_string());
    if bust_token.is_empty() {
        return Err(LoadError::invalid(
            "cache.bust_token",
            "token must not be empty",
        ));
    }

    Ok(CacheSettings {
        ttl: Duration::from_secs(ttl_secs),
        bust_token,
    })
}

fn build_template_settings(templates: RawTemplateSettings) -> Result<TemplateSettings, LoadError> {
    let directory = templates
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "templates.directory",
            "path must not be empty",
        ));
    }

    let extension = templates
        .extension
        .unwrap_or_else(|| DEFAULT_TEMPLATE_EXTENSION.to_string());
    if extension.is_empty() {
        return Err(LoadError::invalid(
            "templates.extension",
            "extension must not be empty",
        ));
    }

    Ok(TemplateSettings {
        directory,
        extension,
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    format!("{host}:{port}")
        .parse()
        .map_err(|err| format!("failed to parse `{host}:{port}`: {err}"))
}
