use keyring::Entry;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;
#[cfg(test)]
use mockall::predicate::*;

const KEYRING_SERVICE: &str = "parley";

#[derive(Error, Debug)]
pub enum KeyManagerError {
    #[error("Failed to access keyring: {0}")]
    KeyringAccess(String),

    #[error("Failed to save to keyring: {0}")]
    KeyringSave(String),

    #[error("Failed to access environment variable: {0}")]
    EnvVarAccess(String),
}

impl From<keyring::Error> for KeyManagerError {
    fn from(err: keyring::Error) -> Self {
        KeyManagerError::KeyringAccess(err.to_string())
    }
}

impl From<env::VarError> for KeyManagerError {
    fn from(err: env::VarError) -> Self {
        KeyManagerError::EnvVarAccess(err.to_string())
    }
}

/// The services a key can unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// The model API
    Anthropic,
    /// Web search, used by `search_web`
    Search,
    /// Weather and geocoding, used by `get_weather`
    Weather,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Anthropic, Backend::Search, Backend::Weather];

    /// Name of the keyring entry and of the environment variable override
    pub fn key_name(&self) -> &'static str {
        match self {
            Backend::Anthropic => "ANTHROPIC_API_KEY",
            Backend::Search => "TAVILY_API_KEY",
            Backend::Weather => "OPENWEATHER_API_KEY",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Backend::Anthropic => "Anthropic (chat model)",
            Backend::Search => "Tavily (web search)",
            Backend::Weather => "OpenWeatherMap (weather)",
        }
    }
}

/// Read-only access to backend credentials
pub trait CredentialStore: Send + Sync {
    fn get_key(&self, backend: Backend) -> Option<String>;

    fn has_key(&self, backend: Backend) -> bool {
        self.get_key(backend).is_some()
    }
}

// Define a trait for the keyring operations
#[cfg_attr(test, automock)]
pub trait Keyring: Send + Sync {
    fn get_password(&self) -> std::result::Result<String, KeyManagerError>;
    fn set_password(&self, password: &str) -> std::result::Result<(), KeyManagerError>;
}

#[cfg_attr(test, automock)]
pub trait Environment: Send + Sync {
    fn get_var(&self, key: &str) -> std::result::Result<String, env::VarError>;
}

pub struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get_var(&self, key: &str) -> std::result::Result<String, env::VarError> {
        env::var(key)
    }
}

impl Keyring for Entry {
    fn get_password(&self) -> std::result::Result<String, KeyManagerError> {
        Entry::get_password(self).map_err(KeyManagerError::from)
    }

    fn set_password(&self, password: &str) -> std::result::Result<(), KeyManagerError> {
        Entry::set_password(self, password).map_err(KeyManagerError::from)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub enum KeyRetrievalStrategy {
    /// Only look in environment variables
    EnvironmentOnly,
    /// Only look in system keyring
    KeyringOnly,
    /// Try keyring first, then environment variables (default behavior)
    #[default]
    Both,
}

pub fn get_api_key(
    api_key_name: &str,
    strategy: KeyRetrievalStrategy,
    keyring: &impl Keyring,
    env: &impl Environment,
) -> Result<String, KeyManagerError> {
    let key = match strategy {
        KeyRetrievalStrategy::EnvironmentOnly => env.get_var(api_key_name)?,
        KeyRetrievalStrategy::KeyringOnly => keyring.get_password()?,
        KeyRetrievalStrategy::Both => match keyring.get_password() {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Could not retrieve {} from keyring: {}", api_key_name, e);
                env.get_var(api_key_name).map_err(|_| {
                    KeyManagerError::EnvVarAccess(format!(
                        "Could not find {} key in keyring or environment variables",
                        api_key_name
                    ))
                })?
            }
        },
    };

    // An empty value is the same as no value
    if key.trim().is_empty() {
        return Err(KeyManagerError::EnvVarAccess(format!(
            "{} is set but empty",
            api_key_name
        )));
    }
    Ok(key)
}

pub fn get_keyring_secret(
    key_name: &str,
    strategy: KeyRetrievalStrategy,
) -> Result<String, KeyManagerError> {
    let kr = Entry::new(KEYRING_SERVICE, key_name)?;
    get_api_key(key_name, strategy, &kr, &RealEnvironment)
}

pub fn save_to_keyring(key_name: &str, api_key: &str) -> Result<(), KeyManagerError> {
    let kr = Entry::new(KEYRING_SERVICE, key_name)?;
    save_with(&kr, key_name, api_key)
}

fn save_with(keyring: &impl Keyring, key_name: &str, api_key: &str) -> Result<(), KeyManagerError> {
    keyring.set_password(api_key).map_err(|e| {
        KeyManagerError::KeyringSave(format!("Failed to save key {}: {}", key_name, e))
    })
}

/// Credentials looked up in the system keyring with an environment fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringCredentials {
    strategy: KeyRetrievalStrategy,
}

impl KeyringCredentials {
    pub fn new(strategy: KeyRetrievalStrategy) -> Self {
        Self { strategy }
    }
}

impl CredentialStore for KeyringCredentials {
    fn get_key(&self, backend: Backend) -> Option<String> {
        get_keyring_secret(backend.key_name(), self.strategy).ok()
    }
}

/// Credentials held in memory, resolved once up front
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<Backend, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key<S: Into<String>>(mut self, backend: Backend, key: S) -> Self {
        self.keys.insert(backend, key.into());
        self
    }

    /// Snapshot every backend key from another store
    pub fn snapshot(store: &impl CredentialStore) -> Self {
        let keys = Backend::ALL
            .iter()
            .filter_map(|backend| store.get_key(*backend).map(|key| (*backend, key)))
            .collect();
        Self { keys }
    }
}

impl CredentialStore for StaticCredentials {
    fn get_key(&self, backend: Backend) -> Option<String> {
        self.keys
            .get(&backend)
            .filter(|key| !key.trim().is_empty())
            .cloned()
    }
}
