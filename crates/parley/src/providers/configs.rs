use anyhow::{anyhow, Result};

use crate::key_manager::{Backend, CredentialStore};

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub max_tokens: u32,
}

impl AnthropicProviderConfig {
    pub fn new<K: Into<String>>(api_key: K) -> Self {
        Self {
            host: ANTHROPIC_HOST.to_string(),
            api_key: api_key.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Build a config from whatever key the credential store holds for the model API
    pub fn from_credentials(credentials: &impl CredentialStore) -> Result<Self> {
        let api_key = credentials.get_key(Backend::Anthropic).ok_or_else(|| {
            anyhow!(
                "No API key found. Set {} or run `parley configure`",
                Backend::Anthropic.key_name()
            )
        })?;
        Ok(Self::new(api_key))
    }

    pub fn with_host<H: Into<String>>(mut self, host: H) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
