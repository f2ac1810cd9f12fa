//! LulaSafe API client
//!
//! This library logs in to the LulaSafe risk-assessment API, opens an assessment session,
//! submits a driver assessment over REST or GraphQL and fetches its results.

pub mod auth;
pub mod config;
pub mod error;
pub mod flow;
pub mod graphql;
pub mod logging;
pub mod models;
pub mod rest;
pub mod step;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::ApiError;
pub use flow::{ApiKind, FlowOptions};
pub use models::{
    Address, Assessee, AssessmentId, AssessmentOutcome, Credentials, DriverAssessmentRequest,
    DrivingLicense, FlowId, ProblemDetails, Session, SessionId, SessionToken,
    ValidationProblemDetails,
};

/// Configuration for the LulaSafe client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LulaSafeConfig {
    /// Root URL of the API, e.g. the staging host
    pub base_url: String,
    /// Version prefix of the login endpoints
    #[serde(default = "config::default_auth_version")]
    pub auth_version: String,
    /// Path prefix of the risk API
    #[serde(default = "config::default_risk_base")]
    pub risk_base: String,
    /// Version prefix of the REST risk endpoints
    #[serde(default = "config::default_risk_version")]
    pub risk_version: String,
    /// Per-request timeout
    #[serde(default = "config::default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Delay before fetching results; each API has its own default when unset
    #[serde(default)]
    pub poll_delay_secs: Option<u64>,
    /// Authentication credentials
    pub auth: AuthConfig,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Client identifier issued by Lula
    #[serde(default)]
    pub client_id: String,
    /// Client secret issued by Lula
    #[serde(default)]
    pub client_secret: String,
}

/// Main LulaSafe client
pub struct LulaSafeClient {
    config: LulaSafeConfig,
    client: reqwest::Client,
}

impl LulaSafeClient {
    /// Create a new LulaSafe client
    pub fn new(config: LulaSafeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LulaSafeConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Run the login handshake and return the bearer token
    pub async fn login(&self) -> Result<SessionToken, ApiError> {
        let credentials = self.config.credentials();
        let flow_id = auth::initialize_flow(&self.client, &self.config).await?;
        auth::submit_credentials(&self.client, &self.config, &flow_id, &credentials).await
    }

    /// Open an assessment session
    pub async fn create_session(&self, token: &SessionToken) -> Result<Session, ApiError> {
        auth::create_session(&self.client, &self.config, token).await
    }

    /// REST endpoints of the risk API
    pub fn rest(&self) -> rest::RestApi<'_> {
        rest::RestApi::new(self)
    }

    /// GraphQL endpoint of the risk API, scoped to one session
    pub fn graphql(&self, session_id: SessionId) -> Result<graphql::GraphQlClient<'_>, ApiError> {
        graphql::GraphQlClient::new(self, session_id)
    }
}
