//! Configuration loader
//!
//! Loads client configuration from a `.env` file, environment variables and
//! config files.
//!
//! ## Loading Strategy
//! 1. Reads `.env` from the working directory, if present (never overrides
//!    variables that are already set)
//! 2. Starts from defaults, or from the file named by `AUTHWIRE_CONFIG`, or
//!    from the first probed config file
//! 3. Applies environment variables on top
//! 4. Validates the result (trailing slashes trimmed, empty URL rejected)
//!
//! ## Environment Variables
//! - `AUTHWIRE_API_BASE_URL` (falls back to `API_BASE_URL`): API origin
//! - `AUTHWIRE_REQUEST_TIMEOUT_MS`: Timeout of regular requests
//! - `AUTHWIRE_REFRESH_TIMEOUT_MS`: Timeout of the token refresh call
//! - `AUTHWIRE_USER_AGENT`: User agent sent with every request
//! - `AUTHWIRE_CONFIG`: Path to a JSON or TOML config file
//!
//! ## File Locations
//! Without `AUTHWIRE_CONFIG` the loader probes, in order:
//! 1. `./authwire.json` or `./authwire.toml` (current working directory)
//! 2. `../authwire.json` or `../authwire.toml` (parent directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use authwire_domain::{AuthWireError, ClientConfig, Result};

use crate::errors::InfraError;

pub const ENV_API_BASE_URL: &str = "AUTHWIRE_API_BASE_URL";
pub const ENV_API_BASE_URL_FALLBACK: &str = "API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "AUTHWIRE_REQUEST_TIMEOUT_MS";
pub const ENV_REFRESH_TIMEOUT_MS: &str = "AUTHWIRE_REFRESH_TIMEOUT_MS";
pub const ENV_USER_AGENT: &str = "AUTHWIRE_USER_AGENT";
pub const ENV_CONFIG_PATH: &str = "AUTHWIRE_CONFIG";

/// Load configuration from every source, environment winning over files.
///
/// # Errors
/// Returns `AuthWireError::Config` if:
/// - `AUTHWIRE_CONFIG` names a missing or malformed file
/// - A numeric variable does not parse
/// - The resulting base URL is empty or not http(s)
pub fn load() -> Result<ClientConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
    }

    let base = match std::env::var(ENV_CONFIG_PATH).ok().filter(|p| !p.trim().is_empty()) {
        Some(path) => read_file(Path::new(&path))?,
        None => match probe_config_paths() {
            Some(path) => read_file(&path)?,
            None => ClientConfig::default(),
        },
    };

    let config = apply_env(base)?.validated()?;
    tracing::info!(
        api_base_url = %config.api_base_url,
        request_timeout_ms = config.request_timeout_ms,
        refresh_timeout_ms = config.refresh_timeout_ms,
        "Configuration loaded"
    );
    Ok(config)
}

/// Load configuration from environment variables over the defaults.
///
/// Unset variables keep their default value.
///
/// # Errors
/// Returns `AuthWireError::Config` if a variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    apply_env(ClientConfig::default())?.validated()
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports both JSON
/// and TOML formats (detected by file extension); missing keys keep their
/// default value.
///
/// # Errors
/// Returns `AuthWireError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| {
            AuthWireError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    read_file(&config_path)?.validated()
}

/// Probe the standard paths for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] =
        ["authwire.json", "authwire.toml", "../authwire.json", "../authwire.toml"];

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.is_file())
}

fn read_file(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Err(AuthWireError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AuthWireError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| AuthWireError::from(InfraError::from(e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuthWireError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AuthWireError::Config(format!("Unsupported config format: {extension}"))),
    }
}

fn apply_env(mut config: ClientConfig) -> Result<ClientConfig> {
    if let Some(url) = env_var(ENV_API_BASE_URL).or_else(|| env_var(ENV_API_BASE_URL_FALLBACK)) {
        config.api_base_url = url;
    }
    if let Some(ms) = env_millis(ENV_REQUEST_TIMEOUT_MS)? {
        config.request_timeout_ms = ms;
    }
    if let Some(ms) = env_millis(ENV_REFRESH_TIMEOUT_MS)? {
        config.refresh_timeout_ms = ms;
    }
    if let Some(agent) = env_var(ENV_USER_AGENT) {
        config.user_agent = agent;
    }
    Ok(config)
}

/// Non-empty environment variable
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

/// Parse a millisecond value from an environment variable
///
/// # Errors
/// Returns `AuthWireError::Config` if the variable is set but not a
/// non-negative integer.
fn env_millis(key: &str) -> Result<Option<u64>> {
    env_var(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|e| AuthWireError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}
