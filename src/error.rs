//! Error types for the letter editor.
//!
//! Per-request failures are first captured as [`ErrorResponse`] values by the
//! API client; the pipelines wrap them into these variants once they know
//! which letter and language the failure belongs to.

use crate::api::ErrorResponse;
use thiserror::Error;

/// All errors that can arise while loading or updating letters.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The language table or the letter listing could not be fetched.
    #[error("failed to load {resource}: {reason}")]
    Discovery { resource: String, reason: String },

    /// A single letter or translation GET failed.
    #[error("failed to fetch {letter} ({language}): {source}")]
    ItemFetch {
        letter: String,
        language: String,
        #[source]
        source: ErrorResponse,
    },

    /// A PUT failed with a genuine error status.
    #[error("failed to update {letter} ({language}): {source}")]
    Write {
        letter: String,
        language: String,
        #[source]
        source: ErrorResponse,
    },

    /// A PUT answered 200 but the body could not be used.
    #[error("unreadable response after updating {letter} ({language}): {source}")]
    SpuriousWrite {
        letter: String,
        language: String,
        #[source]
        source: ErrorResponse,
    },

    /// A returned resource could not be matched to a cached letter.
    #[error("internal error: couldn't find cached letter {letter}")]
    InternalConsistency { letter: String },

    /// A resource lacks a labelled sub-field the editor depends on.
    #[error("letter {letter} has no '{field}' sub-field")]
    MissingField { letter: String, field: String },

    /// A resource did not have the expected shape.
    #[error("malformed resource: {0}")]
    MalformedResource(#[from] serde_json::Error),

    /// The language is not enabled on the institution.
    #[error("unknown language code: '{0}'")]
    UnknownLanguage(String),

    /// Translation propagation was requested for the base language.
    #[error("'{0}' is the base language, select a translation language")]
    NotATranslation(String),
}

impl EditorError {
    /// Classify a failed write by the status on its error marker.
    pub fn from_write(letter: &str, language: &str, source: ErrorResponse) -> Self {
        if source.is_spurious() {
            EditorError::SpuriousWrite {
                letter: letter.to_string(),
                language: language.to_string(),
                source,
            }
        } else {
            EditorError::Write {
                letter: letter.to_string(),
                language: language.to_string(),
                source,
            }
        }
    }
}
