use address_from_editor::{config::Config, presenter::LogPresenter, AddressFromEditor};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct ExportedLetter<'a> {
    name: &'a str,
    description: &'a str,
    address_from: &'a str,
    address_from_enabled: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("export_letters=info".parse()?)
                .add_directive("address_from_editor=info".parse()?),
        )
        .init();

    info!("Starting letter export");

    // Load config from environment
    let config = Config::from_env()?;
    let output_path = config.export_path.clone();
    let mut editor = AddressFromEditor::new(config, Box::new(LogPresenter))?;

    editor
        .load_languages()
        .await
        .context("Failed to discover institution languages")?;
    editor
        .load_letters()
        .await
        .context("Failed to load letters")?;

    let letters: Vec<_> = editor
        .letters()
        .iter()
        .map(|l| ExportedLetter {
            name: l.name(),
            description: l.description(),
            address_from: l.address_from(),
            address_from_enabled: l.address_from_enabled(),
        })
        .collect();

    if let Some(parent) = Path::new(&output_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create export directory")?;
        }
    }
    let json = serde_json::to_string_pretty(&letters).context("Failed to serialize letters")?;
    fs::write(&output_path, json).context("Failed to write export file")?;

    info!("✓ Exported {} letters to {}", letters.len(), output_path);

    Ok(())
}
