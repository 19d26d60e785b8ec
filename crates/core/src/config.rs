use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const FILE_CANDIDATES: [&str; 2] = ["hrflow.toml", "config/hrflow.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Upper bound on draining in-flight requests after a shutdown signal.
    pub graceful_shutdown_secs: u64,
}

/// Where requester status notifications go.
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub webhook_url: Option<String>,
    /// Sent as a bearer token; never printed by `Debug`.
    pub webhook_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Log,
    Webhook,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Programmatic values that win over every other source.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub notifier_kind: Option<NotifierKind>,
    pub notifier_webhook_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("config file references unset environment variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("config file has an unterminated `${{...}}` expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://hrflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            notifier: NotifierConfig {
                kind: NotifierKind::Log,
                webhook_url: None,
                webhook_token: None,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("unsupported notifier kind `{other}` (expected log|webhook)")),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => {
                Err(format!("unsupported log format `{other}` (expected compact|pretty|json)"))
            }
        }
    }
}

impl AppConfig {
    /// Precedence, lowest first: defaults, config file, `HRFLOW_*` env, `options.overrides`.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;
        let mut config = Self::default();

        match locate_file(config_path.as_deref()) {
            Some(path) => config.merge_file(read_patch(&path)?),
            None if require_file => {
                let expected = config_path.unwrap_or_else(|| PathBuf::from(FILE_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge_env()?;
        config.merge_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_notifier(&self.notifier)?;
        validate_logging(&self.logging)
    }

    fn merge_file(&mut self, patch: ConfigPatch) {
        let ConfigPatch { database, server, notifier, logging } = patch;

        if let Some(database) = database {
            merge(&mut self.database.url, database.url);
            merge(&mut self.database.max_connections, database.max_connections);
            merge(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(server) = server {
            merge(&mut self.server.bind_address, server.bind_address);
            merge(&mut self.server.port, server.port);
            merge(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(notifier) = notifier {
            merge(&mut self.notifier.kind, notifier.kind);
            merge(&mut self.notifier.webhook_url, notifier.webhook_url.map(Some));
            merge(
                &mut self.notifier.webhook_token,
                notifier.webhook_token.map(|token| Some(SecretString::from(token))),
            );
            merge(&mut self.notifier.timeout_secs, notifier.timeout_secs);
        }
        if let Some(logging) = logging {
            merge(&mut self.logging.level, logging.level);
            merge(&mut self.logging.format, logging.format);
        }
    }

    fn merge_env(&mut self) -> Result<(), ConfigError> {
        merge(&mut self.database.url, env_value(&["HRFLOW_DATABASE_URL"])?);
        merge(&mut self.database.max_connections, env_value(&["HRFLOW_DATABASE_MAX_CONNECTIONS"])?);
        merge(&mut self.database.timeout_secs, env_value(&["HRFLOW_DATABASE_TIMEOUT_SECS"])?);

        merge(&mut self.server.bind_address, env_value(&["HRFLOW_SERVER_BIND_ADDRESS"])?);
        merge(&mut self.server.port, env_value(&["HRFLOW_SERVER_PORT"])?);
        merge(
            &mut self.server.graceful_shutdown_secs,
            env_value(&["HRFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"])?,
        );

        merge(&mut self.notifier.kind, env_value(&["HRFLOW_NOTIFIER_KIND"])?);
        let webhook_url: Option<String> = env_value(&["HRFLOW_NOTIFIER_WEBHOOK_URL"])?;
        merge(&mut self.notifier.webhook_url, webhook_url.map(Some));
        let webhook_token: Option<String> = env_value(&["HRFLOW_NOTIFIER_WEBHOOK_TOKEN"])?;
        merge(
            &mut self.notifier.webhook_token,
            webhook_token.map(|token| Some(SecretString::from(token))),
        );
        merge(&mut self.notifier.timeout_secs, env_value(&["HRFLOW_NOTIFIER_TIMEOUT_SECS"])?);

        merge(&mut self.logging.level, env_value(&["HRFLOW_LOGGING_LEVEL", "HRFLOW_LOG_LEVEL"])?);
        merge(
            &mut self.logging.format,
            env_value(&["HRFLOW_LOGGING_FORMAT", "HRFLOW_LOG_FORMAT"])?,
        );

        Ok(())
    }

    fn merge_overrides(&mut self, overrides: ConfigOverrides) {
        merge(&mut self.database.url, overrides.database_url);
        merge(&mut self.logging.level, overrides.log_level);
        merge(&mut self.server.port, overrides.server_port);
        merge(&mut self.notifier.kind, overrides.notifier_kind);
        merge(&mut self.notifier.webhook_url, overrides.notifier_webhook_url.map(Some));
    }
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => FILE_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env_vars(&raw)?;

    toml::from_str(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${NAME}` with the value of environment variable `NAME`.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expression = &rest[start + 2..];
        let end = expression.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &expression[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_owned() })?;
        output.push_str(&value);
        rest = &expression[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

/// First non-blank value among `keys`, parsed. Later keys are aliases.
fn env_value<T: FromStr>(keys: &[&str]) -> Result<Option<T>, ConfigError> {
    let found = keys.iter().find_map(|key| {
        env::var(key).ok().filter(|value| !value.trim().is_empty()).map(|value| (*key, value))
    });
    let Some((key, raw)) = found else {
        return Ok(None);
    };

    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value: raw })
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_owned()))
    }
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    require(
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:",
        "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
    )?;
    require(database.max_connections > 0, "database.max_connections must be greater than zero")?;
    require(
        (1..=300).contains(&database.timeout_secs),
        "database.timeout_secs must be in range 1..=300",
    )
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    require(!server.bind_address.trim().is_empty(), "server.bind_address must not be empty")?;
    require(server.port != 0, "server.port must be greater than zero")?;
    require(
        server.graceful_shutdown_secs > 0,
        "server.graceful_shutdown_secs must be greater than zero",
    )
}

fn validate_notifier(notifier: &NotifierConfig) -> Result<(), ConfigError> {
    require(
        (1..=120).contains(&notifier.timeout_secs),
        "notifier.timeout_secs must be in range 1..=120",
    )?;

    if notifier.kind == NotifierKind::Webhook {
        let url = notifier.webhook_url.as_deref().map(str::trim).ok_or_else(|| {
            ConfigError::Validation(
                "notifier.webhook_url is required when notifier.kind = \"webhook\"".to_string(),
            )
        })?;
        require(
            url.starts_with("http://") || url.starts_with("https://"),
            "notifier.webhook_url must start with http:// or https://",
        )?;
    }

    let blank_token = notifier
        .webhook_token
        .as_ref()
        .is_some_and(|token| token.expose_secret().trim().is_empty());
    require(!blank_token, "notifier.webhook_token must not be blank when set")
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    require(
        matches!(
            logging.level.trim().to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ),
        "logging.level must be one of trace|debug|info|warn|error",
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    notifier: Option<NotifierPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotifierPatch {
    kind: Option<NotifierKind>,
    webhook_url: Option<String>,
    webhook_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
