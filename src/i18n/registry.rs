//! Language registry: the languages enabled on the institution.
//!
//! Discovered once from the institution language mapping table. Rows that are
//! disabled, malformed or shaped as error markers are skipped without aborting
//! discovery.

use crate::api::{is_error_marker, ApiClient, ApiRequest};
use crate::config::Config;
use crate::error::EditorError;
use crate::i18n::ActiveLanguages;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// One row of the institution language table
#[derive(Debug, Deserialize)]
struct LanguageRow {
    /// ISO 639-1 language code (e.g. "fr")
    column0: String,
    #[serde(default)]
    enabled: bool,
}

/// Enabled languages: the base language plus every other enabled one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRegistry {
    base: String,
    others: Vec<String>,
}

impl LanguageRegistry {
    /// Build a registry; the base language and duplicates are dropped from
    /// `others`, which keeps its discovery order.
    pub fn new(base: impl Into<String>, others: impl IntoIterator<Item = String>) -> Self {
        let base = base.into();
        let mut unique: Vec<String> = Vec::new();
        for code in others {
            if code != base && !unique.contains(&code) {
                unique.push(code);
            }
        }
        Self {
            base,
            others: unique,
        }
    }

    /// Registry that knows only the base language
    pub fn base_only(base: impl Into<String>) -> Self {
        Self::new(base, Vec::new())
    }

    /// Parse the mapping table response (`{ "row": [...] }`).
    pub fn from_table(base: &str, table: &Value) -> Self {
        let rows = table
            .get("row")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut others = Vec::new();
        for row in rows {
            if is_error_marker(&row) {
                warn!("Error retrieving language row: {}", row);
                continue;
            }
            match serde_json::from_value::<LanguageRow>(row) {
                Ok(lang) if lang.enabled => {
                    info!("Loaded language: {}", lang.column0);
                    others.push(lang.column0);
                }
                Ok(lang) => info!("Skipping disabled language: {}", lang.column0),
                Err(e) => warn!("Skipping malformed language row: {}", e),
            }
        }

        Self::new(base, others)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Enabled languages other than the base, in discovery order
    pub fn others(&self) -> &[String] {
        &self.others
    }

    /// All enabled languages, base first
    pub fn all(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base.as_str()).chain(self.others.iter().map(String::as_str))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.base == code || self.others.iter().any(|lang| lang == code)
    }

    /// The last enabled language seen during discovery, or the base language
    pub fn default_selection(&self) -> &str {
        self.others.last().map(String::as_str).unwrap_or(&self.base)
    }

    /// `[base]` when `selected` is the base language, else `[base, selected]`
    pub fn select_active_set(&self, selected: &str) -> Result<ActiveLanguages, EditorError> {
        if !self.contains(selected) {
            return Err(EditorError::UnknownLanguage(selected.to_string()));
        }
        Ok(ActiveLanguages::with_selected(self.base.clone(), selected))
    }
}

/// Fetch the institution's enabled languages.
///
/// Failure of the table request itself is a [`EditorError::Discovery`].
pub async fn discover_languages(
    client: &ApiClient,
    config: &Config,
) -> Result<LanguageRegistry, EditorError> {
    info!("Discovering institution languages");

    let table = client
        .call(ApiRequest::get(&config.languages_path))
        .await
        .map_err(|e| EditorError::Discovery {
            resource: "institution languages".to_string(),
            reason: e.to_string(),
        })?;

    let registry = LanguageRegistry::from_table(&config.base_language, &table);
    info!(
        "Finished loading languages: base {}, {} others",
        registry.base(),
        registry.others().len()
    );

    Ok(registry)
}
