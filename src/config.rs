use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Configuration API
    pub api_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub listing_path: String,
    pub languages_path: String,

    // Languages
    pub base_language: String,
    pub selected_language: Option<String>,
    pub multi_language: bool,
    pub skip_unchanged_translations: bool,

    // Batch job
    pub new_address_from: Option<String>,
    pub address_from_enabled: Option<bool>,
    pub target_letters: Vec<String>,
    pub sync_translations: bool,
    pub export_path: String,
}

impl Config {
    /// Configuration with defaults for everything except the API location
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            request_timeout_secs: 60,
            listing_path: "/conf/letters".to_string(),
            languages_path: "/conf/mapping-tables/InstitutionLanguages".to_string(),
            base_language: "en".to_string(),
            selected_language: None,
            multi_language: false,
            skip_unchanged_translations: false,
            new_address_from: None,
            address_from_enabled: None,
            target_letters: Vec::new(),
            sync_translations: false,
            export_path: "data/letters.json".to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            std::env::var("LETTERS_API_URL").context("LETTERS_API_URL not set")?,
        );

        config.api_key = non_empty_var("LETTERS_API_KEY");
        if let Some(secs) = std::env::var("LETTERS_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.request_timeout_secs = secs;
        }
        if let Some(path) = non_empty_var("LETTERS_LISTING_PATH") {
            config.listing_path = path;
        }
        if let Some(path) = non_empty_var("LETTERS_LANGUAGES_PATH") {
            config.languages_path = path;
        }

        // Languages
        if let Some(base) = non_empty_var("LETTERS_BASE_LANGUAGE") {
            config.base_language = base;
        }
        config.selected_language = non_empty_var("LETTERS_LANGUAGE");
        config.multi_language = env_flag("LETTERS_MULTI_LANGUAGE").unwrap_or(false);
        config.skip_unchanged_translations =
            env_flag("LETTERS_SKIP_UNCHANGED_TRANSLATIONS").unwrap_or(false);

        // Batch job
        config.new_address_from = std::env::var("LETTERS_NEW_ADDRESS_FROM").ok();
        config.address_from_enabled = env_flag("LETTERS_ADDRESS_FROM_ENABLED");
        config.target_letters = std::env::var("LETTERS_TARGETS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();
        config.sync_translations = env_flag("LETTERS_SYNC_TRANSLATIONS").unwrap_or(false);
        if let Some(path) = non_empty_var("LETTERS_EXPORT_PATH") {
            config.export_path = path;
        }

        Ok(config)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean variable; unset or unrecognised values yield `None`
fn env_flag(name: &str) -> Option<bool> {
    non_empty_var(name).and_then(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
