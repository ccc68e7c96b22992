//! Serving configuration loading and validation.
//!
//! Reads `config/serve.yaml` and resolves environment variables. Every
//! section is optional; a missing file means built-in defaults, which match
//! the SQLCoder2 deployment (TGI on port 8000, one-second readiness polls).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::launcher::LaunchCommand;

/// Env var that points directly at a config file.
pub const CONFIG_PATH_ENV: &str = "SQLCODER_TGI_CONFIG";

/// Path of the config file relative to a project root.
const CONFIG_RELATIVE_PATH: &str = "config/serve.yaml";

/// Env var name TGI reads the Hugging Face token from.
pub const HF_TOKEN_ENV: &str = "HUGGING_FACE_HUB_TOKEN";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised while locating, reading or validating the config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    /// The YAML could not be parsed into [`ServeConfig`].
    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    /// A value parsed but is out of range.
    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Low-precision weight formats understood by `text-generation-launcher --quantize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quantize {
    Bitsandbytes,
    BitsandbytesNf4,
    BitsandbytesFp4,
    Gptq,
    Awq,
}

impl Quantize {
    /// The value passed after `--quantize`.
    pub fn as_arg(self) -> &'static str {
        match self {
            Quantize::Bitsandbytes => "bitsandbytes",
            Quantize::BitsandbytesNf4 => "bitsandbytes-nf4",
            Quantize::BitsandbytesFp4 => "bitsandbytes-fp4",
            Quantize::Gptq => "gptq",
            Quantize::Awq => "awq",
        }
    }
}

/// How the inference server process is launched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Launcher executable (resolved through `PATH`).
    pub command: String,
    /// Which weights to serve.
    pub model_id: String,
    /// Pinned weight version.
    pub revision: String,
    /// Local listen port.
    pub port: u16,
    /// Optional low-precision mode, trading throughput for memory.
    pub quantize: Option<Quantize>,
    /// Appended verbatim after the generated flags.
    pub extra_args: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            command: "text-generation-launcher".into(),
            model_id: "defog/sqlcoder2".into(),
            revision: "4ccba9158b67de83b070a4eb2fadaeb58ab2cd14".into(),
            port: 8000,
            quantize: None,
            extra_args: Vec::new(),
        }
    }
}

impl LauncherConfig {
    /// Launcher arguments, in order: model id, port, revision, quantize, extras.
    pub fn launch_flags(&self) -> Vec<String> {
        let mut flags = vec![
            "--model-id".to_string(),
            self.model_id.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--revision".to_string(),
            self.revision.clone(),
        ];
        if let Some(quantize) = self.quantize {
            flags.push("--quantize".to_string());
            flags.push(quantize.as_arg().to_string());
        }
        flags.extend(self.extra_args.iter().cloned());
        flags
    }
}

/// Weight download step, run ahead of serving to pre-populate the model cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Executable providing the `download-weights` subcommand.
    pub command: String,
    /// Name of the env var holding the Hugging Face token.
    pub token_env: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            command: "text-generation-server".into(),
            token_env: HF_TOKEN_ENV.into(),
        }
    }
}

/// Readiness polling and teardown settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub host: String,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// Overall wait limit. `None` waits until the server answers or the
    /// launcher exits.
    pub timeout_secs: Option<u64>,
    /// Time between SIGTERM and SIGKILL on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            poll_interval_ms: 1_000,
            connect_timeout_ms: 1_000,
            timeout_secs: None,
            shutdown_grace_secs: 5,
        }
    }
}

/// HTTP client settings for talking to the local server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_timeout_secs: u64,
    pub stream_timeout_secs: u64,
    pub max_new_tokens: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            stream_timeout_secs: 600,
            max_new_tokens: 1024,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Write to a rotated log file instead of stderr.
    pub file: bool,
    /// Log directory; defaults to the platform data dir.
    pub dir: Option<String>,
    /// Number of rotated files to keep.
    pub keep: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "sqlcoder_tgi=info,warn".into(),
            json: false,
            file: false,
            dir: None,
            keep: 3,
        }
    }
}

/// Top-level configuration (mirrors `config/serve.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub launcher: LauncherConfig,
    pub download: DownloadConfig,
    pub readiness: ReadinessConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

impl ServeConfig {
    /// Base URL of the local inference server.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.readiness.host, self.launcher.port)
    }

    /// The launcher command line, with the token forwarded when present.
    pub fn launch_command(&self) -> LaunchCommand {
        LaunchCommand {
            program: self.launcher.command.clone(),
            args: self.launcher.launch_flags(),
            env: self.token_env(),
        }
    }

    /// Env vars to forward to child processes for gated-model access.
    pub fn token_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if let Ok(token) = std::env::var(&self.download.token_env) {
            if !token.is_empty() {
                env.insert(HF_TOKEN_ENV.to_string(), token);
            }
        }
        env
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness.connect_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.readiness.timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.readiness.shutdown_grace_secs)
    }

    /// Reject values that would make the launcher or poll loop misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.launcher.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "launcher.command must not be empty".into(),
            });
        }
        if self.launcher.model_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "launcher.model_id must not be empty".into(),
            });
        }
        if self.launcher.port == 0 {
            return Err(ConfigError::Invalid {
                reason: "launcher.port must be non-zero".into(),
            });
        }
        if self.readiness.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "readiness.poll_interval_ms must be at least 1".into(),
            });
        }
        if self.readiness.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "readiness.connect_timeout_ms must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Checks `SQLCODER_TGI_CONFIG` first, then searches upward from `start` for
/// `config/serve.yaml`. Returns `None` when neither exists.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load, interpolate and validate a config file.
pub fn load_serve_config(path: &Path) -> Result<ServeConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let config = parse_serve_config(&raw)?;
    tracing::debug!(path = %path.display(), "loaded serve config");
    Ok(config)
}

/// Parse config YAML after `${VAR}` interpolation.
pub fn parse_serve_config(raw: &str) -> Result<ServeConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);

    // An empty (or all-comment) file parses as YAML null.
    let config: ServeConfig = if interpolated.trim().is_empty() {
        ServeConfig::default()
    } else {
        serde_yaml::from_str::<Option<ServeConfig>>(&interpolated)
            .map_err(|e| ConfigError::Parse {
                reason: e.to_string(),
            })?
            .unwrap_or_default()
    };

    config.validate()?;
    Ok(config)
}

/// Resolve the effective config: explicit path, discovered file, or defaults.
pub fn resolve_serve_config(explicit: Option<&Path>) -> Result<ServeConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_serve_config(path);
    }

    let cwd = std::env::current_dir().unwrap_or_default();
    match find_config_path(&cwd) {
        Some(path) => load_serve_config(&path),
        None => Ok(ServeConfig::default()),
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => {
            std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
        }
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
