//! The operator-facing coordinator.
//!
//! [`AddressFromEditor`] owns the client, the language selection and the
//! letter cache, and exposes the operator actions: load, edit, update and
//! propagate to a translation. Every action ends with the language reset so
//! the platform session never stays on a translation language.

use crate::api::ApiClient;
use crate::cache::LetterCache;
use crate::config::Config;
use crate::error::EditorError;
use crate::fetch::{self, LoadReport};
use crate::i18n::{discover_languages, ActiveLanguages, LanguageRegistry};
use crate::letter::LetterRecord;
use crate::presenter::{MessageKind, Presenter};
use crate::progress::{Progress, ProgressReport};
use crate::update::{self, TranslationReport, UpdateReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared view of a running operation, readable from another task
#[derive(Debug, Clone)]
pub struct StatusHandle {
    progress: Arc<Progress>,
    loading: Arc<AtomicBool>,
}

impl StatusHandle {
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn percent_complete(&self) -> u32 {
        self.progress.percent_complete()
    }

    pub fn report(&self) -> ProgressReport {
        self.progress.report()
    }
}

pub struct AddressFromEditor {
    config: Config,
    client: ApiClient,
    presenter: Box<dyn Presenter>,
    registry: LanguageRegistry,
    selected_language: String,
    cache: LetterCache,
    progress: Arc<Progress>,
    loading: Arc<AtomicBool>,
    /// Last detail link seen, kept for the language reset
    reset_link: Option<String>,
}

impl AddressFromEditor {
    pub fn new(config: Config, presenter: Box<dyn Presenter>) -> anyhow::Result<Self> {
        let client = ApiClient::new(&config)?;
        let registry = LanguageRegistry::base_only(config.base_language.clone());
        let selected_language = config.base_language.clone();

        Ok(Self {
            config,
            client,
            presenter,
            registry,
            selected_language,
            cache: LetterCache::new(),
            progress: Arc::new(Progress::new()),
            loading: Arc::new(AtomicBool::new(false)),
            reset_link: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Languages ====================

    /// Discover the enabled languages and apply the configured selection,
    /// falling back to the last discovered language.
    pub async fn load_languages(&mut self) -> Result<&LanguageRegistry, EditorError> {
        self.begin();
        let result = self.discover().await;
        self.finish(result).await?;
        Ok(&self.registry)
    }

    async fn discover(&mut self) -> Result<(), EditorError> {
        self.registry = discover_languages(&self.client, &self.config).await?;

        let selected = match &self.config.selected_language {
            Some(code) if self.registry.contains(code) => code.clone(),
            Some(code) => return Err(EditorError::UnknownLanguage(code.clone())),
            None => self.registry.default_selection().to_string(),
        };
        info!("Selected language: {}", selected);
        self.selected_language = selected;
        Ok(())
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn selected_language(&self) -> &str {
        &self.selected_language
    }

    pub fn set_selected_language(&mut self, code: &str) -> Result<(), EditorError> {
        if !self.registry.contains(code) {
            return Err(EditorError::UnknownLanguage(code.to_string()));
        }
        self.selected_language = code.to_string();
        Ok(())
    }

    /// Languages loads and updates work on: the base language, plus the
    /// selected one in multi-language mode
    pub fn active_languages(&self) -> ActiveLanguages {
        if self.config.multi_language {
            ActiveLanguages::with_selected(self.registry.base(), &self.selected_language)
        } else {
            ActiveLanguages::base_only(self.registry.base())
        }
    }

    // ==================== Operations ====================

    /// Reload every eligible letter into the cache.
    pub async fn load_letters(&mut self) -> Result<LoadReport, EditorError> {
        self.begin();
        let active = self.active_languages();
        let result = fetch::load_letters(
            &self.client,
            &self.config,
            &self.progress,
            &mut self.cache,
            &active,
        )
        .await;

        if let Ok(report) = &result {
            self.presenter.present(
                &format!("Loaded {} letters", report.loaded),
                MessageKind::Info,
            );
            if report.failed > 0 {
                self.presenter.present(
                    &format!("{} letters could not be retrieved", report.failed),
                    MessageKind::Warning,
                );
            }
        }
        self.finish(result).await
    }

    /// Write the dirty letters back.
    pub async fn update_letters(&mut self) -> Result<UpdateReport, EditorError> {
        self.begin();
        let active = self.active_languages();
        let result = update::update_letters(
            &self.client,
            &self.progress,
            &mut self.cache,
            &active,
            self.presenter.as_ref(),
        )
        .await;
        self.finish(result).await
    }

    /// Copy the base values of every letter into the selected translation.
    pub async fn update_translations(&mut self) -> Result<TranslationReport, EditorError> {
        self.begin();
        let target = self.selected_language.clone();
        let result = update::update_translations(
            &self.client,
            &self.progress,
            &mut self.cache,
            self.registry.base(),
            &target,
            self.config.skip_unchanged_translations,
            self.presenter.as_ref(),
        )
        .await;
        self.finish(result).await
    }

    fn begin(&self) {
        self.loading.store(true, Ordering::SeqCst);
    }

    /// Runs after every operation, whatever its outcome
    async fn finish<T>(&mut self, result: Result<T, EditorError>) -> Result<T, EditorError> {
        if let Some(link) = self.cache.first_link() {
            self.reset_link = Some(link.to_string());
        }
        if let Some(link) = &self.reset_link {
            self.client.reset_language(link).await;
        }

        self.loading.store(false, Ordering::SeqCst);
        if let Err(e) = &result {
            self.presenter.present(&e.to_string(), MessageKind::Error);
        }
        result
    }

    // ==================== Editing ====================

    pub fn letters(&self) -> &[LetterRecord] {
        self.cache.letters()
    }

    pub fn letter(&self, name: &str) -> Option<&LetterRecord> {
        self.cache.letter(name)
    }

    /// Returns whether the letter is dirty afterwards.
    pub fn set_address_from(&mut self, name: &str, value: &str) -> Result<bool, EditorError> {
        self.cache.set_address_from(name, value)
    }

    pub fn set_address_from_enabled(
        &mut self,
        name: &str,
        enabled: bool,
    ) -> Result<bool, EditorError> {
        self.cache.set_address_from_enabled(name, enabled)
    }

    pub fn dirty_count(&self) -> usize {
        self.cache.dirty_count()
    }

    pub fn sort_by_address_from(&mut self) {
        self.cache.sort_by_address_from();
    }

    pub fn sort_by_description(&mut self) {
        self.cache.sort_by_description();
    }

    pub fn cache(&self) -> &LetterCache {
        &self.cache
    }

    // ==================== Status ====================

    pub fn percent_complete(&self) -> u32 {
        self.progress.percent_complete()
    }

    pub fn progress(&self) -> ProgressReport {
        self.progress.report()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> StatusHandle {
        StatusHandle {
            progress: Arc::clone(&self.progress),
            loading: Arc::clone(&self.loading),
        }
    }
}
