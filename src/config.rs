use crate::error::ApiError;
use crate::models::Credentials;
use crate::{AuthConfig, LulaSafeConfig};
use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.staging-lula.is";
pub const ENV_PREFIX: &str = "LULASAFE";

pub(crate) fn default_auth_version() -> String {
    "/v1".to_string()
}

pub(crate) fn default_risk_base() -> String {
    "/risk".to_string()
}

pub(crate) fn default_risk_version() -> String {
    "/v0.1-beta1".to_string()
}

pub(crate) fn default_http_timeout_secs() -> u64 {
    30
}

/// Load configuration from a TOML file, then apply `LULASAFE_*` environment overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LulaSafeConfig> {
    load_config_with_env(path, None)
}

/// Same as [`load_config`] but with an explicit environment map instead of the process environment
pub fn load_config_with_env<P: AsRef<Path>>(
    path: P,
    env: Option<HashMap<String, String>>,
) -> Result<LulaSafeConfig> {
    let path = path.as_ref();
    let settings = config::Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        )
        .build()
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: LulaSafeConfig = settings
        .try_deserialize()
        .with_context(|| format!("Invalid configuration in: {}", path.display()))?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<P: AsRef<Path>>(config: &LulaSafeConfig, path: P) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Create a default configuration template
pub fn create_default_config() -> LulaSafeConfig {
    LulaSafeConfig {
        base_url: DEFAULT_BASE_URL.to_string(),
        auth_version: default_auth_version(),
        risk_base: default_risk_base(),
        risk_version: default_risk_version(),
        http_timeout_secs: default_http_timeout_secs(),
        poll_delay_secs: None,
        auth: AuthConfig {
            client_id: "".to_string(),
            client_secret: "".to_string(),
        },
    }
}

/// Credentials file in the vendor's `appsecrets.json` layout.
#[derive(Debug, Deserialize)]
pub struct AppSecrets {
    #[serde(rename = "ClientId")]
    pub client_id: String,
    #[serde(rename = "ClientSecret")]
    pub client_secret: String,
}

/// Read an `appsecrets.json` file
pub fn load_secrets<P: AsRef<Path>>(path: P) -> Result<AppSecrets> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse secrets file: {}", path.display()))
}

impl LulaSafeConfig {
    /// Fill credentials from a secrets file. Values already present in the config win.
    pub fn apply_secrets(&mut self, secrets: AppSecrets) {
        if self.auth.client_id.trim().is_empty() {
            self.auth.client_id = secrets.client_id;
        }
        if self.auth.client_secret.trim().is_empty() {
            self.auth.client_secret = secrets.client_secret;
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.auth.client_id.trim().to_string(),
            client_secret: self.auth.client_secret.clone(),
        }
    }

    /// `{base}{auth_version}/...`
    pub fn auth_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        self.build_url(&[&self.auth_version], segments)
    }

    /// `{base}{risk_base}{risk_version}/...`
    pub fn risk_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        self.build_url(&[&self.risk_base, &self.risk_version], segments)
    }

    /// `{base}{risk_base}/graphql`
    pub fn graphql_url(&self) -> Result<Url, ApiError> {
        self.build_url(&[&self.risk_base], &["graphql"])
    }

    fn build_url(&self, prefixes: &[&str], segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(self.base_url.trim())?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            path.pop_if_empty();
            for prefix in prefixes {
                for piece in prefix.split('/').filter(|piece| !piece.is_empty()) {
                    path.push(piece);
                }
            }
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}
