// File: spacetraveling-server/src/config.rs
// Purpose: Configuration parsing from spacetraveling.toml and the environment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spacetraveling_isr::IsrTomlConfig;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "spacetraveling.toml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub prismic: PrismicConfig,

    #[serde(default)]
    pub isr: IsrTomlConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

/// Content repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrismicConfig {
    /// API root, e.g. https://my-repo.cdn.prismic.io/api/v2
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub access_token: Option<String>,

    /// Custom type holding the blog posts
    #[serde(default = "default_document_type")]
    pub document_type: String,

    /// Posts per listing page and per "load more"
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_document_type() -> String {
    "posts".to_string()
}

fn default_page_size() -> u32 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Default for PrismicConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: default_document_type(),
            page_size: default_page_size(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load ./spacetraveling.toml, then apply environment overrides
    pub fn load_default() -> Result<Self> {
        let mut config = Self::load(DEFAULT_CONFIG_FILE)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override file values with `PRISMIC_ENDPOINT`, `PRISMIC_ACCESS_TOKEN`
    /// and `PORT` when `lookup` has them.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("PRISMIC_ENDPOINT") {
            self.prismic.endpoint = endpoint;
        }
        if let Some(token) = lookup("PRISMIC_ACCESS_TOKEN") {
            self.prismic.access_token = Some(token);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
        }
        Ok(())
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.prismic.endpoint.trim().is_empty() {
            anyhow::bail!("prismic.endpoint is not set (or PRISMIC_ENDPOINT)");
        }
        if self.prismic.page_size == 0 {
            anyhow::bail!("prismic.page_size must be greater than zero");
        }
        Ok(())
    }
}
