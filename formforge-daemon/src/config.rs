//! Daemon configuration handling.
//!
//! Values are read from `daemon.toml` in the platform config directory (or the
//! file named by `FORMFORGE_CONFIG`), then overridden by environment variables.

use anyhow::{Context, Result, bail};
use chrono::Duration;
use directories::ProjectDirs;
use formforge_core::{CoreConfig, OAuthClientCredentials, Secret};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "FORMFORGE_CONFIG";

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/api/auth/callback";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory for the credential store.
    pub data_dir: PathBuf,

    /// Store file; defaults to `<data_dir>/store.json`.
    pub store_path: Option<PathBuf>,

    /// Logging level used when `RUST_LOG` is unset.
    pub log_level: String,

    pub google_client_id: Option<String>,
    pub google_client_secret: Option<Secret>,
    pub google_redirect_uri: String,

    /// Secret the at-rest encryption key is derived from.
    pub secret_key: Option<Secret>,

    /// Default generation key used when a user has not saved their own.
    pub gemini_api_key: Option<Secret>,
    pub gemini_model: String,
    pub max_attempts: u32,

    pub frontend_url: String,
    pub session_ttl_hours: i64,

    /// Seconds between expired-session sweeps.
    pub reaper_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let dirs = project_dirs();
        let data_dir = dirs
            .as_ref()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".formforge"));

        let socket_path = dirs
            .as_ref()
            .map(|d| d.runtime_dir().unwrap_or(d.data_dir()).join("formforge.sock"))
            .unwrap_or_else(|| PathBuf::from("/tmp/formforge.sock"));

        Self {
            socket_path,
            config_path: PathBuf::new(),
            data_dir,
            store_path: None,
            log_level: "info".to_string(),
            google_client_id: None,
            google_client_secret: None,
            google_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            secret_key: None,
            gemini_api_key: None,
            gemini_model: formforge_core::generation::DEFAULT_MODEL.to_string(),
            max_attempts: formforge_core::generation::DEFAULT_MAX_ATTEMPTS,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            session_ttl_hours: formforge_core::session::DEFAULT_SESSION_TTL_HOURS,
            reaper_interval_secs: 300,
        }
    }
}

impl DaemonConfig {
    /// Parse a TOML document; absent keys take their defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse daemon config")
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GOOGLE_CLIENT_ID") {
            self.google_client_id = Some(v);
        }
        if let Some(v) = var("GOOGLE_CLIENT_SECRET") {
            self.google_client_secret = Some(Secret::new(v));
        }
        if let Some(v) = var("GOOGLE_REDIRECT_URI") {
            self.google_redirect_uri = v;
        }
        if let Some(v) = var("SECRET_KEY") {
            self.secret_key = Some(Secret::new(v));
        }
        if let Some(v) = var("GEMINI_API_KEY") {
            self.gemini_api_key = Some(Secret::new(v));
        }
        if let Some(v) = var("FORMFORGE_STORE_PATH") {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("FORMFORGE_SOCKET") {
            self.socket_path = PathBuf::from(v);
        }
        if let Some(v) = var("FRONTEND_URL") {
            self.frontend_url = v;
        }
    }

    /// Fail if any required setting is missing, naming all of them.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.google_client_id.as_deref().is_none_or(|v| v.trim().is_empty()) {
            missing.push("GOOGLE_CLIENT_ID");
        }
        if self.google_client_secret.as_ref().is_none_or(Secret::is_blank) {
            missing.push("GOOGLE_CLIENT_SECRET");
        }
        if self.google_redirect_uri.trim().is_empty() {
            missing.push("GOOGLE_REDIRECT_URI");
        }
        if self.secret_key.as_ref().is_none_or(Secret::is_blank) {
            missing.push("SECRET_KEY");
        }
        if self.gemini_api_key.as_ref().is_none_or(Secret::is_blank) {
            missing.push("GEMINI_API_KEY");
        }

        if !missing.is_empty() {
            bail!("Missing required configuration: {}", missing.join(", "));
        }
        if self.session_ttl_hours <= 0 {
            bail!("session_ttl_hours must be positive");
        }
        Ok(())
    }

    /// Location of the credential store file.
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("store.json"))
    }

    /// Validate and convert into the core's configuration.
    pub fn to_core_config(&self) -> Result<CoreConfig> {
        self.validate()?;

        let required = |value: &Option<Secret>| value.clone().unwrap_or_else(|| Secret::new(""));

        let mut core = CoreConfig::new(
            OAuthClientCredentials {
                client_id: self.google_client_id.clone().unwrap_or_default(),
                client_secret: required(&self.google_client_secret),
                redirect_uri: self.google_redirect_uri.clone(),
            },
            required(&self.secret_key),
            required(&self.gemini_api_key),
        );
        core.gemini_model = self.gemini_model.clone();
        core.max_attempts = self.max_attempts;
        core.session_ttl = Duration::hours(self.session_ttl_hours);
        core.frontend_url = self.frontend_url.clone();

        Ok(core)
    }
}

/// Load configuration from the default location, then apply environment overrides.
pub fn load_config() -> Result<DaemonConfig> {
    let config_path = match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => PathBuf::from(path),
        None => project_dirs()
            .map(|d| d.config_dir().join("daemon.toml"))
            .unwrap_or_else(|| PathBuf::from("formforge-daemon.toml")),
    };

    let mut config = load_config_from(&config_path)?;
    config.apply_overrides(|name| std::env::var(name).ok());

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;

    Ok(config)
}

/// Load a config file if it exists, otherwise defaults. No overrides are applied.
pub fn load_config_from(path: &Path) -> Result<DaemonConfig> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        DaemonConfig::from_toml(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?
    } else {
        DaemonConfig::default()
    };

    config.config_path = path.to_path_buf();
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "formforge")
}
