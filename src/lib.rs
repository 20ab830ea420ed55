//! Editor for the `addressFrom` sender field of email letter templates.
//!
//! Loads the enabled email letters of an institution from the configuration
//! API, tracks edits per letter, and writes changes back across the base
//! language and one translation language at a time.

pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod editor;
pub mod error;
pub mod fetch;
pub mod i18n;
pub mod letter;
pub mod presenter;
pub mod progress;
pub mod update;

pub use editor::AddressFromEditor;
pub use error::EditorError;
