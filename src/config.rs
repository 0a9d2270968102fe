use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Main configuration structure for yuback
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the Yuque instance, e.g. "https://example.yuque.com".
    /// Must not carry a trailing slash (rejected at load time).
    pub host: String,

    /// API token for the account or group
    pub token: Token,

    /// The user or group whose repositories are mirrored
    pub target: Target,

    /// Ordered list of repository slugs to back up.
    /// An empty list means there is nothing to do.
    #[serde(default)]
    pub repos: Vec<String>,

    /// Maximum API requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
}

/// The user or group that owns the repositories
#[derive(Debug, Deserialize, Clone)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub login: String,
}

/// Yuque distinguishes group-owned and user-owned repositories in its URIs
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    #[serde(rename = "groups")]
    Group,
    #[serde(rename = "users")]
    User,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Group => write!(f, "groups"),
            TargetKind::User => write!(f, "users"),
        }
    }
}

/// A secret Yuque API token. The Debug impl redacts the credential so it
/// never ends up in logs.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*****")
    }
}

impl TryFrom<&Token> for reqwest::header::HeaderValue {
    type Error = reqwest::header::InvalidHeaderValue;

    fn try_from(value: &Token) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

// Default value functions
fn default_rate_limit() -> u32 {
    20
}

impl Config {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;

        tracing::info!(
            host = %config.host,
            target = %config.target.login,
            repos = config.repos.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration before any network activity happens
    pub fn validate(&self) -> Result<()> {
        if self.host.ends_with('/') {
            bail!(
                "Invalid config: host must not end with a trailing slash (got {:?})",
                self.host
            );
        }

        let url = Url::parse(&self.host)
            .with_context(|| format!("Invalid config: host is not a valid URL: {:?}", self.host))?;

        match url.scheme() {
            "http" | "https" => {}
            other => bail!(
                "Invalid config: host must be an http(s) URL, got scheme {:?}",
                other
            ),
        }

        if self.token.as_str().is_empty() {
            bail!("Invalid config: token must not be empty");
        }

        if self.target.login.is_empty() {
            bail!("Invalid config: target.login must not be empty");
        }

        if self.rate_limit == 0 {
            bail!("Invalid config: rate_limit must be at least 1");
        }

        Ok(())
    }

    /// The parsed host URL. Only valid after `validate()` has passed.
    pub fn host_url(&self) -> Result<Url> {
        Url::parse(&self.host).with_context(|| format!("Invalid host URL: {:?}", self.host))
    }
}
