//! Operator-facing messages.
//!
//! The editor reports outcomes through a [`Presenter`] rather than printing,
//! so a UI, a log or a test can decide how to show them.

use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Info,
    Warning,
    Error,
}

pub trait Presenter: Send + Sync {
    fn present(&self, text: &str, kind: MessageKind);
}

/// Forwards messages to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn present(&self, text: &str, kind: MessageKind) {
        match kind {
            MessageKind::Success | MessageKind::Info => info!("{}", text),
            MessageKind::Warning => warn!("{}", text),
            MessageKind::Error => error!("{}", text),
        }
    }
}

/// Keeps every message; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Arc<Mutex<Vec<(MessageKind, String)>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(MessageKind, String)> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages of one kind, in order
    pub fn of_kind(&self, kind: MessageKind) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn contains(&self, kind: MessageKind, needle: &str) -> bool {
        self.of_kind(kind).iter().any(|text| text.contains(needle))
    }
}

impl Presenter for MessageLog {
    fn present(&self, text: &str, kind: MessageKind) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((kind, text.to_string()));
    }
}
