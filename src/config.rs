//! Configuration loading.
//!
//! Credentials (`BASE_URL`, `EMAIL`, `PASSWORD`) always come from the
//! environment, usually via a `.env` file loaded by `dotenv`. Everything
//! else has defaults and may be overridden by an optional TOML file
//! (`checkin.toml`, or the path in `CHECKIN_CONFIG`).

use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::api::envelope;
use crate::types::CheckinError;

/// Default TOML path, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "checkin.toml";

/// Environment variable that overrides [`DEFAULT_CONFIG_FILE`].
pub const CONFIG_PATH_ENV: &str = "CHECKIN_CONFIG";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36 Edg/143.0.0.0";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub panel: PanelConfig,
    pub http: HttpConfig,
    pub endpoints: EndpointsConfig,
    pub convert: ConvertConfig,
}

/// Where and as whom to log in.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub email: String,
    pub password: SecretString,
}

impl PanelConfig {
    /// Join the base URL and a candidate path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Header names the session token is sent under.
    pub token_headers: Vec<String>,
    /// Login response fields that may hold the token, in priority order.
    pub token_fields: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token_headers: vec!["Authorization".to_string(), "Access-Token".to_string()],
            token_fields: envelope::DEFAULT_TOKEN_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

/// Ordered candidate paths for each panel action.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub login: Vec<String>,
    pub checkin: Vec<String>,
    pub info: Vec<String>,
    pub convert: Vec<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        fn paths(list: &[&str]) -> Vec<String> {
            list.iter().map(|p| p.to_string()).collect()
        }
        Self {
            login: paths(&["/api/v1/passport/auth/login"]),
            checkin: paths(&[
                "/api/v1/user/checkin",
                "/api/v1/user/checkIn",
                "/user/checkin",
            ]),
            info: paths(&["/api/v1/user/info", "/user/info"]),
            convert: paths(&[
                "/api/v1/user/koukanntraffic",
                "/api/v1/user/convertTraffic",
                "/user/koukanntraffic",
            ]),
        }
    }
}

impl EndpointsConfig {
    /// Replace empty lists with the defaults.
    fn fill_empty(mut self) -> Self {
        let defaults = Self::default();
        if self.login.is_empty() {
            self.login = defaults.login;
        }
        if self.checkin.is_empty() {
            self.checkin = defaults.checkin;
        }
        if self.info.is_empty() {
            self.info = defaults.info;
        }
        if self.convert.is_empty() {
            self.convert = defaults.convert;
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub enabled: bool,
    /// Smallest reward (MiB) worth converting.
    pub min_traffic_mb: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_traffic_mb: 1,
        }
    }
}

/// The TOML file layout. Credentials are deliberately absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    http: HttpConfig,
    endpoints: EndpointsConfig,
    convert: ConvertConfig,
}

impl AppConfig {
    /// Build the configuration from the process environment and the
    /// optional TOML file.
    pub fn from_env() -> Result<Self, CheckinError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(&path, |name| std::env::var(name).ok())
    }

    /// Build the configuration from a TOML file (skipped if missing) and
    /// credentials resolved through `lookup`.
    pub fn load<F>(path: &str, lookup: F) -> Result<Self, CheckinError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = if Path::new(path).exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| CheckinError::Config(format!("failed to read {path}: {e}")))?;
            Self::parse_file(&contents)
                .map_err(|e| CheckinError::Config(format!("failed to parse {path}: {e}")))?
        } else {
            FileConfig::default()
        };

        let panel = Self::panel_from_lookup(lookup)?;
        Ok(Self {
            panel,
            http: file.http,
            endpoints: file.endpoints.fill_empty(),
            convert: file.convert,
        })
    }

    /// Defaults plus credentials from `lookup`, no file involved.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CheckinError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            panel: Self::panel_from_lookup(lookup)?,
            http: HttpConfig::default(),
            endpoints: EndpointsConfig::default(),
            convert: ConvertConfig::default(),
        })
    }

    fn parse_file(contents: &str) -> Result<FileConfig, toml::de::Error> {
        toml::from_str(contents)
    }

    fn panel_from_lookup<F>(lookup: F) -> Result<PanelConfig, CheckinError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut require = |name: &str| match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(name.to_string());
                String::new()
            }
        };
        let base_url = require("BASE_URL");
        let email = require("EMAIL");
        let password = require("PASSWORD");
        if !missing.is_empty() {
            return Err(CheckinError::MissingEnv(missing));
        }

        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(CheckinError::Config(format!(
                "BASE_URL must start with http:// or https://, got {base_url}"
            )));
        }

        Ok(PanelConfig {
            base_url,
            email: email.trim().to_string(),
            password: SecretString::new(password),
        })
    }
}
