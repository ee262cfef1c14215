//! CircleCI v1.1 build oracle.

use async_trait::async_trait;
use reaper_core::{BackendError, BackendResult, BuildOracle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Public CircleCI API root.
pub const DEFAULT_API_URL: &str = "https://circleci.com/api/v1.1";

/// CircleCI API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleCiConfig {
    /// API root, without trailing `/project`.
    pub base_url: String,
    /// Personal or project API token, sent as the basic-auth user.
    pub token: String,
    /// Build status filter.
    pub filter: String,
    /// Maximum builds returned per query.
    pub limit: u32,
}

impl CircleCiConfig {
    pub fn new(token: &str) -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: token.to_string(),
            filter: "running".to_string(),
            limit: 30,
        }
    }

    /// Read the token from `CIRCLE_TOKEN` and the API root from
    /// `CIRCLE_API_URL` when set.
    pub fn from_env() -> BackendResult<Self> {
        let token = std::env::var("CIRCLE_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BackendError::Config("CIRCLE_TOKEN is not set".to_string()))?;
        let mut config = Self::new(&token);
        if let Ok(url) = std::env::var("CIRCLE_API_URL") {
            config = config.with_base_url(&url);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Recent-builds endpoint for a GitHub `org/repo`.
    pub fn project_url(&self, repo: &str) -> String {
        format!("{}/project/github/{}", self.base_url, repo)
    }
}

/// HTTP client implementing [`BuildOracle`].
pub struct CircleCiClient {
    config: CircleCiConfig,
    http_client: reqwest::Client,
}

impl CircleCiClient {
    pub fn new(config: CircleCiConfig) -> BackendResult<Self> {
        if config.token.is_empty() {
            return Err(BackendError::Config("CircleCI token is empty".to_string()));
        }
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("ci-reaper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn from_env() -> BackendResult<Self> {
        Self::new(CircleCiConfig::from_env()?)
    }
}

#[async_trait]
impl BuildOracle for CircleCiClient {
    async fn active_builds(&self, repo: &str) -> BackendResult<Value> {
        let url = self.config.project_url(repo);
        debug!("Querying {} for {} builds", url, self.config.filter);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.config.token, Some(""))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("filter", self.config.filter.clone()),
                ("limit", self.config.limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Http(format!("{} from {}: {}", status, url, body)));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
