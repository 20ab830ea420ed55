//! Update pipeline: write dirty letters, propagate base values into a
//! translation, and nudge base records after translation writes.
//!
//! Every operation runs in strict stages separated by batch barriers:
//!
//! 1. all writes (letter or translation PUTs) are issued together
//! 2. once all of them completed, every base record whose translation was
//!    written is re-PUT unchanged (the nudge the platform needs before a
//!    translation change takes effect)
//! 3. only then is the cache refreshed from the write responses
//!
//! Failed writes are reported one by one and never stop the batch.

use crate::api::{ApiClient, ApiRequest, ApiResult};
use crate::batch::run_batch;
use crate::cache::LetterCache;
use crate::error::EditorError;
use crate::i18n::ActiveLanguages;
use crate::letter::LetterRecord;
use crate::presenter::{MessageKind, Presenter};
use crate::progress::Progress;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Identity of one write in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
struct WriteKey {
    name: String,
    language: String,
}

impl WriteKey {
    fn new(name: &str, language: &str) -> Self {
        Self {
            name: name.to_string(),
            language: language.to_string(),
        }
    }
}

/// Outcome of [`update_letters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Dirty letters at the start of the update
    pub letters: usize,
    /// PUTs issued in the write stage
    pub writes: usize,
    /// Writes that went through (spurious ones included)
    pub written: usize,
    /// Writes answered 200 with an unusable body
    pub spurious: usize,
    pub failed: usize,
    /// Successful base-record nudges
    pub nudged: usize,
}

/// Outcome of [`update_translations`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranslationReport {
    pub language: String,
    /// Letters considered
    pub processed: usize,
    /// Translations already carrying the base values
    pub unchanged: usize,
    /// Translations that differed from the base values
    pub modified: usize,
    /// Translations that could not be read or written
    pub failed: usize,
    pub nudged: usize,
}

/// Write every dirty letter in every active language.
///
/// With a single active language the PUT carries no `lang` parameter. With a
/// translation active, both variants are written, the translation adopting
/// the edited base values, and the base record is nudged afterwards.
pub async fn update_letters(
    client: &ApiClient,
    progress: &Progress,
    cache: &mut LetterCache,
    active: &ActiveLanguages,
    presenter: &dyn Presenter,
) -> Result<UpdateReport, EditorError> {
    let dirty: Vec<LetterRecord> = cache.dirty_letters().into_iter().cloned().collect();
    let mut report = UpdateReport {
        letters: dirty.len(),
        ..UpdateReport::default()
    };

    if dirty.is_empty() {
        presenter.present("Nothing to update", MessageKind::Success);
        return Ok(report);
    }
    info!("Updating {} letter(s)", dirty.len());

    let base_language = active.base();
    let mut writes = Vec::new();
    let mut sent_variants = HashMap::new();
    for letter in &dirty {
        let Some(link) = cache.link(letter.name()).map(str::to_string) else {
            fail(
                presenter,
                &mut report.failed,
                &EditorError::InternalConsistency {
                    letter: letter.name().to_string(),
                },
            );
            continue;
        };

        for lang in active.iter() {
            let record = if active.is_base(lang) {
                letter.clone()
            } else {
                match cache.variant(lang, letter.name()) {
                    Some(variant) => {
                        let mut variant = variant.clone();
                        variant.adopt_values_from(letter);
                        variant
                    }
                    None => {
                        warn!("No cached {} variant of {}, skipping", lang, letter.name());
                        continue;
                    }
                }
            };

            let body = match payload(&record) {
                Ok(body) => body,
                Err(e) => {
                    fail(presenter, &mut report.failed, &e);
                    continue;
                }
            };
            let mut request = ApiRequest::put(&link, body);
            if active.is_multi() {
                request = request.with_lang(lang);
            }
            if !active.is_base(lang) {
                sent_variants.insert((letter.name().to_string(), lang.to_string()), record);
            }
            writes.push((WriteKey::new(letter.name(), lang), request));
        }
    }

    report.writes = writes.len();
    progress.start(writes.len());
    let results = run_batch(client, progress, writes).await;

    let nudges = nudge_requests(cache, base_language, &results, |key| {
        !active.is_base(&key.language)
    });
    let nudge_results = run_nudges(client, progress, nudges).await;
    report.nudged = count_nudges(presenter, &nudge_results, &mut report.failed);

    for (key, result) in results {
        match result {
            Ok(value) => match refreshed(cache, &key, value)
                .and_then(|record| cache.replace(record, base_language))
            {
                Ok(()) => report.written += 1,
                Err(e) => fail(presenter, &mut report.failed, &e),
            },
            Err(source) => match EditorError::from_write(&key.name, &key.language, source) {
                e @ EditorError::SpuriousWrite { .. } => {
                    warn!("{}", e);
                    report.spurious += 1;
                    report.written += 1;
                    if active.is_base(&key.language) {
                        if let Err(e) = cache.mark_synced(&key.name) {
                            fail(presenter, &mut report.failed, &e);
                        }
                    } else if let Some(mut variant) =
                        sent_variants.remove(&(key.name.clone(), key.language.clone()))
                    {
                        if variant.mark_synced().is_ok() {
                            cache.store_variant(variant);
                        }
                    }
                }
                e => fail(presenter, &mut report.failed, &e),
            },
        }
    }

    cache.rebuild_dirty();

    if report.written > 0 {
        presenter.present(
            &format!("Updated {} letter record(s)", report.written),
            MessageKind::Success,
        );
    }
    info!(
        "Update finished: {} written, {} spurious, {} failed, {} nudged",
        report.written, report.spurious, report.failed, report.nudged
    );

    Ok(report)
}

/// Copy the base addressFrom values of every letter into its `target`
/// translation.
///
/// Variants missing from the cache are fetched first. With
/// `skip_unchanged`, translations already equal to the base are not written
/// and their base records are not nudged.
pub async fn update_translations(
    client: &ApiClient,
    progress: &Progress,
    cache: &mut LetterCache,
    base_language: &str,
    target: &str,
    skip_unchanged: bool,
    presenter: &dyn Presenter,
) -> Result<TranslationReport, EditorError> {
    if target == base_language {
        return Err(EditorError::NotATranslation(target.to_string()));
    }

    let letters: Vec<LetterRecord> = cache.letters().to_vec();
    let mut report = TranslationReport {
        language: target.to_string(),
        processed: letters.len(),
        ..TranslationReport::default()
    };
    info!("Propagating {} letter(s) into '{}'", letters.len(), target);

    let mut links = HashMap::new();
    let mut fetches = Vec::new();
    for letter in &letters {
        let Some(link) = cache.link(letter.name()).map(str::to_string) else {
            fail(
                presenter,
                &mut report.failed,
                &EditorError::InternalConsistency {
                    letter: letter.name().to_string(),
                },
            );
            continue;
        };
        if cache.variant(target, letter.name()).is_none() {
            fetches.push((
                letter.name().to_string(),
                ApiRequest::get(&link).with_lang(target),
            ));
        }
        links.insert(letter.name().to_string(), link);
    }

    progress.start(fetches.len());
    let mut fetched = HashMap::new();
    for (name, result) in run_batch(client, progress, fetches).await {
        let record = result
            .map_err(|source| EditorError::ItemFetch {
                letter: name.clone(),
                language: target.to_string(),
                source,
            })
            .and_then(|value| LetterRecord::from_value(value, target));
        match record {
            Ok(record) => {
                fetched.insert(name, record);
            }
            Err(e) => {
                warn!("{}", e);
                report.failed += 1;
            }
        }
    }

    let mut writes = Vec::new();
    let mut pending = HashMap::new();
    for letter in &letters {
        let Some(link) = links.get(letter.name()) else {
            continue;
        };
        let Some(mut translation) = fetched
            .remove(letter.name())
            .or_else(|| cache.variant(target, letter.name()).cloned())
        else {
            continue;
        };
        translation.set_description(letter.description());

        if translation.has_same_values(letter) {
            report.unchanged += 1;
            debug!(
                "{} translation of {} already matches the base values",
                target,
                letter.name()
            );
            if skip_unchanged {
                continue;
            }
        } else {
            report.modified += 1;
            translation.adopt_values_from(letter);
        }

        match payload(&translation) {
            Ok(body) => {
                writes.push((
                    WriteKey::new(letter.name(), target),
                    ApiRequest::put(link, body).with_lang(target),
                ));
                pending.insert(letter.name().to_string(), translation);
            }
            Err(e) => fail(presenter, &mut report.failed, &e),
        }
    }

    progress.add_expected(writes.len());
    let results = run_batch(client, progress, writes).await;

    let nudges = nudge_requests(cache, base_language, &results, |_| true);
    let nudge_results = run_nudges(client, progress, nudges).await;
    report.nudged = count_nudges(presenter, &nudge_results, &mut report.failed);

    for (key, result) in results {
        match result {
            Ok(value) => {
                if let Err(e) = refreshed(cache, &key, value)
                    .and_then(|record| cache.replace(record, base_language))
                {
                    fail(presenter, &mut report.failed, &e);
                }
            }
            Err(source) => match EditorError::from_write(&key.name, &key.language, source) {
                e @ EditorError::SpuriousWrite { .. } => {
                    warn!("{}", e);
                    if let Some(mut translation) = pending.remove(&key.name) {
                        if translation.mark_synced().is_ok() {
                            cache.store_variant(translation);
                        }
                    }
                }
                e => fail(presenter, &mut report.failed, &e),
            },
        }
    }

    for (label, count) in [
        ("processed", report.processed),
        ("unchanged", report.unchanged),
        ("modified", report.modified),
    ] {
        presenter.present(
            &format!("Translations for '{}' {}: {}", target, label, count),
            MessageKind::Success,
        );
    }

    Ok(report)
}

fn payload(record: &LetterRecord) -> Result<Value, EditorError> {
    record.update_payload()?.to_value()
}

/// Record built from a write response, labelled like the cached letter
fn refreshed(
    cache: &LetterCache,
    key: &WriteKey,
    value: Value,
) -> Result<LetterRecord, EditorError> {
    let mut record = LetterRecord::from_value(value, &key.language)?;
    if record.name() != key.name {
        return Err(EditorError::InternalConsistency {
            letter: record.name().to_string(),
        });
    }
    if let Some(description) = cache.description(&key.name) {
        record.set_description(description);
    }
    Ok(record)
}

/// One base-language PUT per letter with an issued translation write.
///
/// The body is the base record as the write stage left it on the server:
/// the write response, the edited record when that write answered with an
/// unreadable 200, or the cached record when the base was not written or its
/// write failed.
fn nudge_requests(
    cache: &LetterCache,
    base_language: &str,
    results: &[(WriteKey, ApiResult)],
    is_translation: impl Fn(&WriteKey) -> bool,
) -> Vec<(String, ApiRequest)> {
    let mut nudges: Vec<(String, ApiRequest)> = Vec::new();
    for (key, _) in results.iter().filter(|(key, _)| is_translation(key)) {
        if nudges.iter().any(|(name, _)| name == &key.name) {
            continue;
        }

        let Some(letter) = cache.letter(&key.name) else {
            warn!("Cannot nudge {}: not cached", key.name);
            continue;
        };
        let base_result = results
            .iter()
            .find(|(other, _)| other.name == key.name && other.language == base_language)
            .map(|(_, result)| result);
        let body = match base_result {
            Some(Ok(body)) => Ok(body.clone()),
            // The base write went through with the edited values
            Some(Err(source)) if source.is_spurious() => payload(letter),
            _ => letter.raw().to_value(),
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                warn!("Cannot nudge {}: {}", key.name, e);
                continue;
            }
        };

        let Some(link) = cache.link(&key.name) else {
            warn!("Cannot nudge {}: no detail link", key.name);
            continue;
        };
        nudges.push((
            key.name.clone(),
            ApiRequest::put(link, body).with_lang(base_language),
        ));
    }
    nudges
}

async fn run_nudges(
    client: &ApiClient,
    progress: &Progress,
    nudges: Vec<(String, ApiRequest)>,
) -> Vec<(String, ApiResult)> {
    if nudges.is_empty() {
        return Vec::new();
    }
    info!("Nudging {} base record(s)", nudges.len());
    progress.add_expected(nudges.len());
    run_batch(client, progress, nudges).await
}

fn count_nudges(
    presenter: &dyn Presenter,
    results: &[(String, ApiResult)],
    failed: &mut usize,
) -> usize {
    let mut nudged = 0;
    for (name, result) in results {
        match result {
            Ok(_) => nudged += 1,
            Err(source) if source.is_spurious() => {
                debug!("Spurious nudge response for {}: {}", name, source);
                nudged += 1;
            }
            Err(source) => {
                presenter.present(
                    &format!("Error updating base record of {}: {}", name, source),
                    MessageKind::Error,
                );
                *failed += 1;
            }
        }
    }
    nudged
}

fn fail(presenter: &dyn Presenter, failed: &mut usize, error: &EditorError) {
    warn!("{}", error);
    presenter.present(&error.to_string(), MessageKind::Error);
    *failed += 1;
}
