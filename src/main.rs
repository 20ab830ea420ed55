use address_from_editor::{config::Config, presenter::LogPresenter, AddressFromEditor};
use anyhow::{Context, Result};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("address_from_editor=info".parse()?),
        )
        .init();

    info!("Starting addressFrom editor job");

    // Load configuration from environment
    let config = Config::from_env()?;
    let mut editor = AddressFromEditor::new(config.clone(), Box::new(LogPresenter))?;

    // Step 1: Discover languages
    let registry = editor
        .load_languages()
        .await
        .context("Failed to discover institution languages")?;
    info!(
        "Languages: {}",
        registry.all().collect::<Vec<_>>().join(", ")
    );

    // Step 2: Load letters
    let report = editor
        .load_letters()
        .await
        .context("Failed to load letters")?;
    for letter in editor.letters() {
        info!(
            "{} [{}]: {} (enabled: {})",
            letter.description(),
            letter.name(),
            letter.address_from(),
            letter.address_from_enabled()
        );
    }
    info!(
        "{} editable letters, {} without addressFrom",
        report.loaded, report.not_editable
    );

    // Step 3: Apply the configured edit
    if config.new_address_from.is_none() && config.address_from_enabled.is_none() {
        info!("No addressFrom change configured, nothing else to do");
        return Ok(());
    }

    let targets: Vec<String> = if config.target_letters.is_empty() {
        editor.letters().iter().map(|l| l.name().to_string()).collect()
    } else {
        config.target_letters.clone()
    };

    for name in &targets {
        if editor.letter(name).is_none() {
            warn!("Letter {} is not loaded or not editable, skipping", name);
            continue;
        }
        if let Some(value) = &config.new_address_from {
            editor.set_address_from(name, value)?;
        }
        if let Some(enabled) = config.address_from_enabled {
            editor.set_address_from_enabled(name, enabled)?;
        }
    }
    info!("{} letter(s) changed", editor.dirty_count());

    // Step 4: Write changes
    let update = editor
        .update_letters()
        .await
        .context("Failed to update letters")?;
    info!(
        "Update complete: {} written, {} failed",
        update.written, update.failed
    );

    // Step 5: Propagate into the selected translation
    if config.sync_translations {
        let translations = editor
            .update_translations()
            .await
            .context("Failed to update translations")?;
        info!(
            "Translations for '{}': {} modified, {} failed",
            translations.language, translations.modified, translations.failed
        );
    }

    info!("Done!");
    Ok(())
}
