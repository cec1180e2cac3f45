use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    env, DEFAULT_ADMIN_NAME, DEFAULT_API_URL, DEFAULT_COUNTRY_CODE, DEFAULT_MESSAGE_PAGE_SIZE,
    DEFAULT_PAGE_SIZE,
};
use crate::error::{CoreError, Result};
use crate::permissions::Role;
use crate::phone::PhoneNormalizer;
use crate::streaming::ReconnectPolicy;

/// Core configuration, loadable from a camelCase JSON file and overridable
/// from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Backend base URL, e.g. `https://crm.example.edu`
    pub api_base_url: String,

    /// Bearer token passed through to the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Role of the signed-in user; no role means no mutating actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Display name on optimistic admin messages
    pub admin_name: String,

    pub page_size: u32,
    pub message_page_size: u32,

    /// Country calling code folded out of phone keys, so `256700123456`,
    /// `+256 700 123456` and `0700123456` share one conversation. `null`
    /// keeps full international numbers as keys.
    pub country_code: Option<String>,

    pub reconnect: ReconnectPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            role: None,
            admin_name: DEFAULT_ADMIN_NAME.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            message_page_size: DEFAULT_MESSAGE_PAGE_SIZE,
            country_code: Some(DEFAULT_COUNTRY_CODE.to_string()),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env::API_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(env::API_TOKEN).filter(|t| !t.is_empty()) {
            self.api_token = Some(token);
        }
        if let Some(role) = lookup(env::ROLE) {
            self.role = Some(Role::parse(&role));
        }
        if let Some(cc) = lookup(env::COUNTRY_CODE) {
            self.country_code = Some(cc).filter(|c| !c.trim().is_empty());
        }
        if let Some(size) = lookup(env::PAGE_SIZE) {
            self.page_size = size
                .trim()
                .parse()
                .map_err(|_| CoreError::Config(format!("{} must be a number, got {:?}", env::PAGE_SIZE, size)))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(CoreError::Config(format!(
                "apiBaseUrl must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if self.page_size == 0 {
            return Err(CoreError::Config("pageSize must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn phone_normalizer(&self) -> PhoneNormalizer {
        PhoneNormalizer::new(self.country_code.as_deref())
    }
}
