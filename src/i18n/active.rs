//! The set of languages a load or update works on.

/// Requests for more than two languages at once exceed the platform's
/// request/response time budget.
pub const MAX_ACTIVE_LANGUAGES: usize = 2;

/// Ordered language set: the base language first, then at most one
/// translation language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLanguages {
    base: String,
    translation: Option<String>,
}

impl ActiveLanguages {
    /// Only the base language (single-language mode)
    pub fn base_only(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            translation: None,
        }
    }

    /// `[base]` when `selected` is the base language, else `[base, selected]`
    pub fn with_selected(base: impl Into<String>, selected: &str) -> Self {
        let base = base.into();
        let translation = (selected != base).then(|| selected.to_string());
        Self { base, translation }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn translation(&self) -> Option<&str> {
        self.translation.as_deref()
    }

    /// Whether a translation language is processed alongside the base
    pub fn is_multi(&self) -> bool {
        self.translation.is_some()
    }

    pub fn is_base(&self, lang: &str) -> bool {
        self.base == lang
    }

    pub fn len(&self) -> usize {
        1 + usize::from(self.translation.is_some())
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Languages in processing order, base first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base.as_str()).chain(self.translation.as_deref())
    }
}
