//! Language handling for letter variants.
//!
//! The institution enables a set of languages; the base language is always
//! present and never listed explicitly. Letters are processed for at most two
//! languages at once, the base plus one translation.
//!
//! # Architecture
//!
//! - `registry`: discovery of the enabled languages and the selection rules
//! - `active`: the ordered, capped set of languages an operation works on
//!
//! # Example
//!
//! ```rust,ignore
//! use address_from_editor::i18n::discover_languages;
//!
//! let registry = discover_languages(&client, &config).await?;
//! let active = registry.select_active_set(registry.default_selection())?;
//! for lang in active.iter() {
//!     println!("{}", lang);
//! }
//! ```

mod active;
mod registry;

pub use active::{ActiveLanguages, MAX_ACTIVE_LANGUAGES};
pub use registry::{discover_languages, LanguageRegistry};
