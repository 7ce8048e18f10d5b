//! Non-interactive subcommands.

use anyhow::Result;
use chrono::Local;
use std::path::Path;

use crate::config::Config;
use crate::llm::TextGenerator;
use crate::session::{join_stored, ChatSession};
use crate::settings::SettingField;
use crate::storage::StorageManager;

pub async fn ask(config: &Config, generator: &dyn TextGenerator, text: &str) -> Result<()> {
    let mut session = ChatSession::new(config.prompt_template()?, config.settings);
    let reply = session.submit(generator, text).await?;
    println!("{reply}");
    Ok(())
}

pub fn list_sessions(storage: &StorageManager) -> Result<()> {
    let stored = storage.load_stored()?;
    if stored.is_empty() {
        println!("No stored sessions. Use /save in the chat to store one.");
        return Ok(());
    }

    for (i, session) in stored.iter().enumerate() {
        println!(
            "Conversation session {} ({})",
            i + 1,
            session.saved_at.with_timezone(&Local).format("%m/%d/%Y, %H:%M")
        );
        println!("{}", session.transcript);
        println!();
    }
    Ok(())
}

pub fn clear_sessions(storage: &StorageManager) -> Result<()> {
    storage.clear_stored()?;
    println!("Stored sessions deleted.");
    Ok(())
}

pub fn export_sessions(storage: &StorageManager, target: Option<&Path>) -> Result<()> {
    let stored = storage.load_stored()?;
    if stored.is_empty() {
        println!("No stored sessions to export.");
        return Ok(());
    }
    let path = storage.export_text(&join_stored(&stored), "stored_sessions", target, Local::now())?;
    println!("Exported {} sessions to {}", stored.len(), path.display());
    Ok(())
}

pub fn show_config(config: &Config) {
    println!("config file: {}", config.config_path.display());
    println!("data dir:    {}", config.data_dir.display());
    println!("endpoint:    {}/models/{}", config.base_url, config.repo_id);
    println!("api token:   {}", config.token_hint());
    println!(
        "template:    {}",
        config
            .template_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );
    println!("settings:");
    for field in SettingField::all() {
        println!("  {:<24} {}", field.label(), config.settings.display(field));
    }
}
