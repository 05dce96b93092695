use anyhow::Result;

use crate::prompt::cliclack::CliclackPrompt;
use crate::session::Session;
use crate::settings::Settings;
use parley::conversation::Conversation;
use parley::key_manager::{CredentialStore, KeyringCredentials, StaticCredentials};
use parley::providers::anthropic::AnthropicProvider;
use parley::providers::configs::AnthropicProviderConfig;
use parley::tools::ToolRegistry;

/// Wire a conversation from settings and whatever credentials are configured
pub fn build_conversation(
    settings: &Settings,
    credentials: &impl CredentialStore,
) -> Result<Conversation> {
    let config = AnthropicProviderConfig::from_credentials(credentials)?
        .with_host(settings.host.clone())
        .with_max_tokens(settings.max_tokens);
    let provider = AnthropicProvider::new(config)?;
    let tools = ToolRegistry::from_credentials(credentials);

    tracing::debug!(
        model = %settings.model,
        tools = tools.available_tools().len(),
        "conversation ready"
    );
    Ok(Conversation::new(Box::new(provider), tools))
}

pub fn build_session(settings: &Settings) -> Result<Session<'static>> {
    // Resolve every key once rather than hitting the keyring on each turn
    let credentials = StaticCredentials::snapshot(&KeyringCredentials::default());
    let conversation = build_conversation(settings, &credentials)?;

    Ok(Session::new(
        conversation,
        Box::new(CliclackPrompt::new()),
        settings.model.clone(),
        settings.system_prompt.clone(),
    ))
}

pub async fn execute(settings: &Settings, message: Option<&str>) -> Result<()> {
    let mut session = build_session(settings)?;
    match message {
        Some(text) => session.headless_start(text).await,
        None => session.start().await,
    }
}
