use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub nlu: NluConfig,
    pub server: ServerConfig,
    pub ordering: OrderingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Connection details for the external NLU collaborator.
///
/// `base_url = None` disables the text-query path entirely; the webhook
/// path keeps working since it receives already-parsed intent results.
#[derive(Clone, Debug)]
pub struct NluConfig {
    pub base_url: Option<String>,
    pub project_id: Option<String>,
    pub api_token: Option<SecretString>,
    pub language_code: String,
    pub timeout_secs: u64,
}

impl NluConfig {
    pub fn enabled(&self) -> bool {
        self.base_url.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct OrderingConfig {
    pub require_active_order: bool,
    pub session_idle_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub nlu_base_url: Option<String>,
    pub nlu_project_id: Option<String>,
    pub nlu_api_token: Option<String>,
    pub server_port: Option<u16>,
    pub health_check_port: Option<u16>,
    pub require_active_order: Option<bool>,
    pub session_idle_secs: Option<u64>,
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
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
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
                url: "sqlite://cartbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            nlu: NluConfig {
                base_url: None,
                project_id: None,
                api_token: None,
                language_code: "en-US".to_string(),
                timeout_secs: 15,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 4000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
                cors_origins: Vec::new(),
            },
            ordering: OrderingConfig { require_active_order: false, session_idle_secs: 1800 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    nlu: Option<NluPatch>,
    server: Option<ServerPatch>,
    ordering: Option<OrderingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NluPatch {
    base_url: Option<String>,
    project_id: Option<String>,
    api_token: Option<String>,
    language_code: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OrderingPatch {
    require_active_order: Option<bool>,
    session_idle_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cartbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(nlu) = patch.nlu {
            if let Some(base_url) = nlu.base_url {
                self.nlu.base_url = Some(base_url);
            }
            if let Some(project_id) = nlu.project_id {
                self.nlu.project_id = Some(project_id);
            }
            if let Some(api_token_value) = nlu.api_token {
                self.nlu.api_token = Some(api_token_value.into());
            }
            if let Some(language_code) = nlu.language_code {
                self.nlu.language_code = language_code;
            }
            if let Some(timeout_secs) = nlu.timeout_secs {
                self.nlu.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(cors_origins) = server.cors_origins {
                self.server.cors_origins = cors_origins;
            }
        }

        if let Some(ordering) = patch.ordering {
            if let Some(require_active_order) = ordering.require_active_order {
                self.ordering.require_active_order = require_active_order;
            }
            if let Some(session_idle_secs) = ordering.session_idle_secs {
                self.ordering.session_idle_secs = session_idle_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARTBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARTBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CARTBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARTBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CARTBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARTBOT_NLU_BASE_URL") {
            self.nlu.base_url = Some(value);
        }
        if let Some(value) = read_env("CARTBOT_NLU_PROJECT_ID") {
            self.nlu.project_id = Some(value);
        }
        if let Some(value) = read_env("CARTBOT_NLU_API_TOKEN") {
            self.nlu.api_token = Some(value.into());
        }
        if let Some(value) = read_env("CARTBOT_NLU_LANGUAGE_CODE") {
            self.nlu.language_code = value;
        }
        if let Some(value) = read_env("CARTBOT_NLU_TIMEOUT_SECS") {
            self.nlu.timeout_secs = parse_u64("CARTBOT_NLU_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARTBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARTBOT_SERVER_PORT") {
            self.server.port = parse_u16("CARTBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CARTBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("CARTBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("CARTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CARTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTBOT_SERVER_CORS_ORIGINS") {
            self.server.cors_origins = value
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }

        if let Some(value) = read_env("CARTBOT_ORDERING_REQUIRE_ACTIVE_ORDER") {
            self.ordering.require_active_order =
                parse_bool("CARTBOT_ORDERING_REQUIRE_ACTIVE_ORDER", &value)?;
        }
        if let Some(value) = read_env("CARTBOT_ORDERING_SESSION_IDLE_SECS") {
            self.ordering.session_idle_secs =
                parse_u64("CARTBOT_ORDERING_SESSION_IDLE_SECS", &value)?;
        }

        let log_level = read_env("CARTBOT_LOGGING_LEVEL").or_else(|| read_env("CARTBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARTBOT_LOGGING_FORMAT").or_else(|| read_env("CARTBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(nlu_base_url) = overrides.nlu_base_url {
            self.nlu.base_url = Some(nlu_base_url);
        }
        if let Some(nlu_project_id) = overrides.nlu_project_id {
            self.nlu.project_id = Some(nlu_project_id);
        }
        if let Some(nlu_api_token) = overrides.nlu_api_token {
            self.nlu.api_token = Some(nlu_api_token.into());
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
        if let Some(require_active_order) = overrides.require_active_order {
            self.ordering.require_active_order = require_active_order;
        }
        if let Some(session_idle_secs) = overrides.session_idle_secs {
            self.ordering.session_idle_secs = session_idle_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_nlu(&self.nlu)?;
        validate_server(&self.server)?;
        validate_ordering(&self.ordering)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cartbot.toml"), PathBuf::from("config/cartbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_nlu(nlu: &NluConfig) -> Result<(), ConfigError> {
    if nlu.timeout_secs == 0 || nlu.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "nlu.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if let Some(base_url) = &nlu.base_url {
        if base_url.trim().is_empty() {
            return Err(ConfigError::Validation("nlu.base_url must not be blank".to_string()));
        }

        let has_project = nlu
            .project_id
            .as_ref()
            .map(|project| !project.trim().is_empty())
            .unwrap_or(false);
        if !has_project {
            return Err(ConfigError::Validation(
                "nlu.project_id is required when nlu.base_url is set".to_string(),
            ));
        }
    }

    if let Some(token) = &nlu.api_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "nlu.api_token must not be blank when set".to_string(),
            ));
        }
    }

    if nlu.language_code.trim().is_empty() {
        return Err(ConfigError::Validation("nlu.language_code must not be blank".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_ordering(ordering: &OrderingConfig) -> Result<(), ConfigError> {
    if ordering.session_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "ordering.session_idle_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
