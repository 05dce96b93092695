use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{to_env_var, ConfigError};
use parley::providers::configs::{ANTHROPIC_HOST, DEFAULT_MAX_TOKENS};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Parley, a friendly and concise assistant \
chatting in a terminal. Use the available tools whenever the answer depends on current \
information, the weather, or today's date, and say so when a tool is unavailable or fails.";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub host: String,
}

impl Settings {
    /// Defaults, then `PARLEY_*` environment variables
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("model", DEFAULT_MODEL)?
            .set_default("max_tokens", DEFAULT_MAX_TOKENS)?
            .set_default("system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("host", ANTHROPIC_HOST)?
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Settings>() {
            Ok(settings) => settings.validate(),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `model`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("model"),
                message: "model name cannot be empty".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("max_tokens"),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }

    /// Apply command line flags, which win over the environment
    pub fn with_overrides(mut self, model: Option<String>, max_tokens: Option<u32>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(max_tokens) = max_tokens {
            self.max_tokens = max_tokens;
        }
        self
    }
}
