//! In-memory letter cache: the single source of truth the editor binds to.
//!
//! Holds the flat editable list (base-language copies), the dirty set, one
//! record per language per letter, and the listing tables that map a letter
//! key to its display name and detail link.

use crate::error::EditorError;
use crate::letter::{compare_by_address_from, compare_by_description, LetterRecord};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct LetterCache {
    letters: Vec<LetterRecord>,
    dirty: HashSet<String>,
    per_language: HashMap<String, HashMap<String, LetterRecord>>,
    descriptions: HashMap<String, String>,
    links: HashMap<String, String>,
    /// Keys in registration order, for a stable "first known link"
    keys: Vec<String>,
}

impl LetterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, including the listing tables
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ==================== Listing Tables ====================

    /// Record a listing entry's display name and detail link under `key`.
    pub fn register(&mut self, key: &str, display_name: &str, link: &str) {
        if !self.links.contains_key(key) {
            self.keys.push(key.to_string());
        }
        self.descriptions
            .insert(key.to_string(), display_name.to_string());
        self.links.insert(key.to_string(), link.to_string());
    }

    /// Make `alias` resolve to the same description and link as `key`.
    ///
    /// The listing is keyed by letter code while detail resources carry a
    /// name; both must reach the same template.
    pub fn alias(&mut self, key: &str, alias: &str) {
        if key == alias {
            return;
        }
        let description = self.descriptions.get(key).cloned();
        let link = self.links.get(key).cloned();
        if let (Some(description), Some(link)) = (description, link) {
            self.register(alias, &description, &link);
        }
    }

    pub fn description(&self, key: &str) -> Option<&str> {
        self.descriptions.get(key).map(String::as_str)
    }

    pub fn link(&self, key: &str) -> Option<&str> {
        self.links.get(key).map(String::as_str)
    }

    /// Any already-known detail link (the first one registered)
    pub fn first_link(&self) -> Option<&str> {
        self.keys.first().and_then(|key| self.link(key))
    }

    // ==================== Records ====================

    /// Editable letters, in presentation order
    pub fn letters(&self) -> &[LetterRecord] {
        &self.letters
    }

    pub fn letter(&self, name: &str) -> Option<&LetterRecord> {
        self.letters.iter().find(|l| l.name() == name)
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// The record of `name` in `language`
    pub fn variant(&self, language: &str, name: &str) -> Option<&LetterRecord> {
        self.per_language
            .get(language)
            .and_then(|letters| letters.get(name))
    }

    /// Number of letters cached for `language`
    pub fn language_count(&self, language: &str) -> usize {
        self.per_language.get(language).map_or(0, HashMap::len)
    }

    /// Add a fully loaded letter: its base copy becomes the editable record
    /// and every variant (base included) goes into its language map.
    pub fn insert_letter(&mut self, base: LetterRecord, translations: Vec<LetterRecord>) {
        let name = base.name().to_string();
        for record in std::iter::once(base.clone()).chain(translations) {
            self.store_variant(record);
        }

        match self.letters.iter_mut().find(|l| l.name() == name) {
            Some(existing) => *existing = base,
            None => self.letters.push(base),
        }
        self.check_dirty(&name);
    }

    /// Store a variant without touching the editable list.
    pub fn store_variant(&mut self, record: LetterRecord) {
        self.per_language
            .entry(record.language().to_string())
            .or_default()
            .insert(record.name().to_string(), record);
    }

    /// Replace a letter with a refreshed copy from the server.
    ///
    /// Base-language copies also replace the editable record. Fails with
    /// [`EditorError::InternalConsistency`] when the letter is not cached.
    pub fn replace(&mut self, record: LetterRecord, base_language: &str) -> Result<(), EditorError> {
        let name = record.name().to_string();

        if record.language() == base_language {
            let index = self
                .letters
                .iter()
                .position(|l| l.name() == name)
                .ok_or_else(|| EditorError::InternalConsistency {
                    letter: name.clone(),
                })?;
            self.letters[index] = record.clone();
            self.check_dirty(&name);
        } else if self.letter(&name).is_none() {
            return Err(EditorError::InternalConsistency { letter: name });
        }

        self.store_variant(record);
        Ok(())
    }

    /// Fold the current values of the editable record into its baseline.
    pub fn mark_synced(&mut self, name: &str) -> Result<(), EditorError> {
        let letter = self
            .letters
            .iter_mut()
            .find(|l| l.name() == name)
            .ok_or_else(|| EditorError::InternalConsistency {
                letter: name.to_string(),
            })?;
        letter.mark_synced()?;
        let synced = letter.clone();
        self.dirty.remove(name);
        self.store_variant(synced);
        Ok(())
    }

    // ==================== Editing ====================

    /// Set a letter's addressFrom; returns whether the letter is now dirty.
    pub fn set_address_from(&mut self, name: &str, value: &str) -> Result<bool, EditorError> {
        self.edit(name, |letter| letter.set_address_from(value))
    }

    /// Set a letter's enabled flag; returns whether the letter is now dirty.
    pub fn set_address_from_enabled(
        &mut self,
        name: &str,
        enabled: bool,
    ) -> Result<bool, EditorError> {
        self.edit(name, |letter| letter.set_address_from_enabled(enabled))
    }

    fn edit(
        &mut self,
        name: &str,
        change: impl FnOnce(&mut LetterRecord),
    ) -> Result<bool, EditorError> {
        let letter = self
            .letters
            .iter_mut()
            .find(|l| l.name() == name)
            .ok_or_else(|| EditorError::InternalConsistency {
                letter: name.to_string(),
            })?;
        change(letter);
        Ok(self.check_dirty(name))
    }

    // ==================== Dirty Tracking ====================

    /// Sync the dirty set entry of `name` with its record
    fn check_dirty(&mut self, name: &str) -> bool {
        let dirty = self.letter(name).is_some_and(LetterRecord::is_dirty);
        if dirty {
            self.dirty.insert(name.to_string());
        } else {
            self.dirty.remove(name);
        }
        dirty
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_marked_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    /// Editable letters whose values differ from their baseline
    pub fn dirty_letters(&self) -> Vec<&LetterRecord> {
        self.letters.iter().filter(|l| l.is_dirty()).collect()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Recompute the dirty set from the records.
    pub fn rebuild_dirty(&mut self) {
        self.dirty = self
            .letters
            .iter()
            .filter(|l| l.is_dirty())
            .map(|l| l.name().to_string())
            .collect();
    }

    // ==================== Ordering ====================

    /// Sort by addressFrom, then description (default order)
    pub fn sort_by_address_from(&mut self) {
        self.letters.sort_by(compare_by_address_from);
    }

    /// Sort by description only
    pub fn sort_by_description(&mut self) {
        self.letters.sort_by(compare_by_description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::letter::tests::letter_json;

    fn record(name: &str, address_from: &str, language: &str) -> LetterRecord {
        LetterRecord::from_value(letter_json(name, address_from, true), language).unwrap()
    }

    fn populated() -> LetterCache {
        let mut cache = LetterCache::new();
        cache.register("LoanReceipt", "Loan Receipt Letter", "/conf/code-tables/LoanReceiptLabels");
        cache.register("FineNotice", "Fine Notice Letter", "/conf/code-tables/FineNoticeLabels");
        cache.insert_letter(
            record("LoanReceipt", "loans@x.edu", "en"),
            vec![record("LoanReceipt", "prets@x.edu", "fr")],
        );
        cache.insert_letter(
            record("FineNotice", "fines@x.edu", "en"),
            vec![record("FineNotice", "amendes@x.edu", "fr")],
        );
        cache
    }

    // ==================== Listing Table Tests ====================

    #[test]
    fn test_register_and_lookup() {
        let cache = populated();

        assert_eq!(cache.description("LoanReceipt"), Some("Loan Receipt Letter"));
        assert_eq!(
            cache.link("FineNotice"),
            Some("/conf/code-tables/FineNoticeLabels")
        );
        assert_eq!(cache.first_link(), Some("/conf/code-tables/LoanReceiptLabels"));
        assert!(cache.link("Unknown").is_none());
    }

    #[test]
    fn test_alias_shares_description_and_link() {
        let mut cache = LetterCache::new();
        cache.register("FulLoanReceiptLetter", "Loan Receipt Letter", "/conf/code-tables/A");

        cache.alias("FulLoanReceiptLetter", "LoanReceiptLetter");

        assert_eq!(cache.link("LoanReceiptLetter"), Some("/conf/code-tables/A"));
        assert_eq!(cache.description("LoanReceiptLetter"), Some("Loan Receipt Letter"));
        assert_eq!(cache.first_link(), Some("/conf/code-tables/A"));
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut cache = populated();
        cache.set_address_from("LoanReceipt", "new@x.edu").unwrap();

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.dirty_count(), 0);
        assert!(cache.first_link().is_none());
        assert_eq!(cache.language_count("fr"), 0);
    }

    // ==================== Record Tests ====================

    #[test]
    fn test_insert_letter_populates_flat_and_languages() {
        let cache = populated();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.language_count("en"), 2);
        assert_eq!(cache.language_count("fr"), 2);
        assert_eq!(
            cache.variant("fr", "LoanReceipt").unwrap().address_from(),
            "prets@x.edu"
        );
        assert_eq!(cache.letter("LoanReceipt").unwrap().language(), "en");
    }

    #[test]
    fn test_replace_base_updates_flat_record() {
        let mut cache = populated();
        cache.set_address_from("LoanReceipt", "edited@x.edu").unwrap();

        cache
            .replace(record("LoanReceipt", "server@x.edu", "en"), "en")
            .expect("Should replace");

        let letter = cache.letter("LoanReceipt").unwrap();
        assert_eq!(letter.address_from(), "server@x.edu");
        assert!(!letter.is_dirty());
        assert!(!cache.is_marked_dirty("LoanReceipt"));
        assert_eq!(
            cache.variant("en", "LoanReceipt").unwrap().address_from(),
            "server@x.edu"
        );
    }

    #[test]
    fn test_replace_translation_leaves_flat_record() {
        let mut cache = populated();

        cache
            .replace(record("LoanReceipt", "nouveau@x.edu", "fr"), "en")
            .expect("Should replace");

        assert_eq!(cache.letter("LoanReceipt").unwrap().address_from(), "loans@x.edu");
        assert_eq!(
            cache.variant("fr", "LoanReceipt").unwrap().address_from(),
            "nouveau@x.edu"
        );
    }

    #[test]
    fn test_replace_unknown_is_internal_consistency_error() {
        let mut cache = populated();

        let result = cache.replace(record("Ghost", "x@x.edu", "en"), "en");
        assert!(matches!(result, Err(EditorError::InternalConsistency { letter }) if letter == "Ghost"));

        let result = cache.replace(record("Ghost", "x@x.edu", "fr"), "en");
        assert!(matches!(result, Err(EditorError::InternalConsistency { .. })));
    }

    #[test]
    fn test_mark_synced_clears_dirty() {
        let mut cache = populated();
        cache.set_address_from("FineNotice", "new@x.edu").unwrap();

        cache.mark_synced("FineNotice").expect("Should sync");

        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(
            cache.variant("en", "FineNotice").unwrap().address_from(),
            "new@x.edu"
        );
    }

    // ==================== Dirty Tracking Tests ====================

    #[test]
    fn test_edit_and_undo_tracks_dirty_set() {
        let mut cache = populated();

        assert!(cache.set_address_from("LoanReceipt", "new@x.edu").unwrap());
        assert!(cache.set_address_from_enabled("FineNotice", false).unwrap());
        assert_eq!(cache.dirty_count(), 2);
        assert_eq!(cache.dirty_letters().len(), 2);

        assert!(!cache.set_address_from("LoanReceipt", "loans@x.edu").unwrap());
        assert_eq!(cache.dirty_count(), 1);
        assert!(cache.is_marked_dirty("FineNotice"));
    }

    #[test]
    fn test_edit_unknown_letter() {
        let mut cache = populated();
        assert!(cache.set_address_from("Ghost", "x").is_err());
    }

    #[test]
    fn test_clear_and_rebuild_dirty() {
        let mut cache = populated();
        cache.set_address_from("LoanReceipt", "new@x.edu").unwrap();

        cache.clear_dirty();
        assert_eq!(cache.dirty_count(), 0);

        cache.rebuild_dirty();
        assert_eq!(cache.dirty_count(), 1);
        assert!(cache.is_marked_dirty("LoanReceipt"));
    }

    // ==================== Ordering Tests ====================

    #[test]
    fn test_sorting() {
        let mut cache = populated();
        cache.letters[0].set_description("Zeta");
        cache.letters[1].set_description("Alpha");

        cache.sort_by_address_from();
        let names: Vec<_> = cache.letters().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["FineNotice", "LoanReceipt"]);

        cache.sort_by_description();
        let descriptions: Vec<_> = cache.letters().iter().map(|l| l.description()).collect();
        assert_eq!(descriptions, vec!["Alpha", "Zeta"]);
    }
}
