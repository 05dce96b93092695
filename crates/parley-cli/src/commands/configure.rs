use anyhow::Result;
use cliclack::spinner;
use console::style;

use crate::commands::session::build_conversation;
use crate::settings::Settings;
use parley::key_manager::{
    get_keyring_secret, save_to_keyring, Backend, KeyRetrievalStrategy, KeyringCredentials,
    StaticCredentials,
};

pub async fn handle_configure(settings: &Settings) -> Result<()> {
    cliclack::intro(style(" configure-parley ").on_cyan().black())?;

    for backend in Backend::ALL {
        configure_key(backend)?;
    }

    // Confirm everything is configured correctly by calling the model
    let credentials = StaticCredentials::snapshot(&KeyringCredentials::default());
    let conversation = match build_conversation(settings, &credentials) {
        Ok(conversation) => conversation,
        Err(e) => {
            cliclack::outro(format!("Configuration incomplete: {}", e))?;
            return Ok(());
        }
    };

    let spin = spinner();
    spin.start("Checking your configuration...");
    let result = conversation
        .run_turn(
            &[],
            "Please give a nice welcome message (one sentence) and let them know they are all set to chat",
            &settings.model,
            &settings.system_prompt,
            |_| {},
            |_| {},
        )
        .await;

    match result {
        Ok((text, _usage)) if !text.trim().is_empty() => spin.stop(text.trim()),
        Ok(_) => spin.stop("No response text available"),
        Err(e) => {
            spin.error(format!("We could not connect: {}", e));
            cliclack::outro("Try rerunning configure and check your credentials.")?;
            return Ok(());
        }
    }

    let tools: Vec<String> = conversation
        .tools()
        .available_tools()
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    cliclack::outro(format!("Ready. Tools enabled: {}", tools.join(", ")))?;
    Ok(())
}

fn configure_key(backend: Backend) -> Result<()> {
    let key = backend.key_name();

    // If the key is in the keyring, ask if we want to overwrite
    if get_keyring_secret(key, KeyRetrievalStrategy::KeyringOnly).is_ok() {
        cliclack::log::info(format!("{} is already available in the keyring", key))?;
        if cliclack::confirm("Would you like to overwrite this value?")
            .initial_value(false)
            .interact()?
        {
            prompt_and_save(key, format!("Enter the value for {}", key))?;
        }
    }
    // If the key is in the env, ask if we want to save to keyring
    else if let Ok(value) = get_keyring_secret(key, KeyRetrievalStrategy::EnvironmentOnly) {
        cliclack::log::info(format!(
            "Detected {} in env, we can use this from your environment.\nIt will need to continue to be set in future parley usage.",
            key
        ))?;
        if cliclack::confirm("Would you like to save it to your keyring?").interact()? {
            save_to_keyring(key, &value)?;
        }
    }
    // The model key is required, tool keys are optional
    else if backend == Backend::Anthropic {
        prompt_and_save(
            key,
            format!(
                "{} requires {}, please enter a value. (Will be saved to your keyring)",
                backend.description(),
                key
            ),
        )?;
    } else if cliclack::confirm(format!(
        "Enable {}? It needs {}.",
        backend.description(),
        key
    ))
    .initial_value(false)
    .interact()?
    {
        prompt_and_save(key, format!("Enter the value for {}", key))?;
    }

    Ok(())
}

fn prompt_and_save(key: &str, message: String) -> Result<()> {
    let value: String = cliclack::password(message).mask('▪').interact()?;
    save_to_keyring(key, value.trim())?;
    Ok(())
}
