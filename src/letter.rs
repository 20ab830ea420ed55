//! Letter records: a normalized, dirty-tracked view over the letter label
//! resource returned by the configuration API.

use crate::error::EditorError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Code of the labelled sub-field holding the sender address
pub const ADDRESS_FROM_CODE: &str = "addressFrom";

/// One labelled sub-field of a letter resource.
///
/// Everything but `code` is kept as received, so rows the editor does not
/// own are written back exactly as they were read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    pub code: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LabelRow {
    /// Label text; null or missing reads as empty
    pub fn description(&self) -> &str {
        self.fields
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Null or missing reads as disabled
    pub fn enabled(&self) -> bool {
        self.fields
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or_default()
    }

    pub fn set_description(&mut self, description: &str) {
        self.fields
            .insert("description".to_string(), Value::from(description));
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.fields.insert("enabled".to_string(), Value::from(enabled));
    }
}

/// Letter resource as returned by a detail link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    pub name: String,
    #[serde(default)]
    pub row: Vec<LabelRow>,
    /// Any other properties, written back untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawResource {
    /// Resource-level description, if any
    pub fn description(&self) -> Option<&str> {
        self.extra.get("description").and_then(Value::as_str)
    }

    pub fn from_value(value: Value) -> Result<Self, EditorError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, EditorError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Look up a sub-field by code.
    ///
    /// Fails with [`EditorError::MissingField`]; the remote side offers no
    /// way to add a sub-field, so callers treat this as "not editable".
    pub fn sub_field(&self, code: &str) -> Result<&LabelRow, EditorError> {
        self.row
            .iter()
            .find(|row| row.code == code)
            .ok_or_else(|| self.missing(code))
    }

    fn sub_field_mut(&mut self, code: &str) -> Result<&mut LabelRow, EditorError> {
        let missing = self.missing(code);
        self.row
            .iter_mut()
            .find(|row| row.code == code)
            .ok_or(missing)
    }

    fn missing(&self, code: &str) -> EditorError {
        EditorError::MissingField {
            letter: self.name.clone(),
            field: code.to_string(),
        }
    }
}

/// An editable letter in one language.
///
/// `raw` always mirrors the last state known to be on the server; pending
/// edits live in `address_from`/`address_from_enabled` until written.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterRecord {
    name: String,
    description: String,
    language: String,
    address_from: String,
    address_from_enabled: bool,
    address_from_original: String,
    address_from_enabled_original: bool,
    raw: RawResource,
}

impl LetterRecord {
    pub fn from_resource(raw: RawResource, language: &str) -> Result<Self, EditorError> {
        let row = raw.sub_field(ADDRESS_FROM_CODE)?;
        let address_from = row.description().to_string();
        let address_from_enabled = row.enabled();

        Ok(Self {
            name: raw.name.clone(),
            description: raw.description().unwrap_or_default().to_string(),
            language: language.to_string(),
            address_from_original: address_from.clone(),
            address_from_enabled_original: address_from_enabled,
            address_from,
            address_from_enabled,
            raw,
        })
    }

    pub fn from_value(value: Value, language: &str) -> Result<Self, EditorError> {
        Self::from_resource(RawResource::from_value(value)?, language)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replace the display label (taken from the letter listing)
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn address_from(&self) -> &str {
        &self.address_from
    }

    pub fn address_from_enabled(&self) -> bool {
        self.address_from_enabled
    }

    pub fn address_from_original(&self) -> &str {
        &self.address_from_original
    }

    pub fn address_from_enabled_original(&self) -> bool {
        self.address_from_enabled_original
    }

    pub fn set_address_from(&mut self, value: impl Into<String>) {
        self.address_from = value.into();
    }

    pub fn set_address_from_enabled(&mut self, enabled: bool) {
        self.address_from_enabled = enabled;
    }

    /// True when the editable values differ from the last synced baseline.
    /// Reverting an edit makes the record clean again.
    pub fn is_dirty(&self) -> bool {
        self.address_from != self.address_from_original
            || self.address_from_enabled != self.address_from_enabled_original
    }

    /// Copy the editable values of another record (e.g. base onto translation)
    pub fn adopt_values_from(&mut self, other: &LetterRecord) {
        self.address_from = other.address_from.clone();
        self.address_from_enabled = other.address_from_enabled;
    }

    /// Whether both records carry the same editable values
    pub fn has_same_values(&self, other: &LetterRecord) -> bool {
        self.address_from == other.address_from
            && self.address_from_enabled == other.address_from_enabled
    }

    /// Resource as last seen on the server
    pub fn raw(&self) -> &RawResource {
        &self.raw
    }

    /// Resource to PUT: the server copy with the current values written into
    /// the addressFrom sub-field. Nothing else is touched.
    pub fn update_payload(&self) -> Result<RawResource, EditorError> {
        let mut payload = self.raw.clone();
        let row = payload.sub_field_mut(ADDRESS_FROM_CODE)?;
        row.set_description(&self.address_from);
        row.set_enabled(self.address_from_enabled);
        Ok(payload)
    }

    /// Treat the current values as written: fold them into `raw` and make
    /// them the new baseline.
    pub fn mark_synced(&mut self) -> Result<(), EditorError> {
        self.raw = self.update_payload()?;
        self.address_from_original = self.address_from.clone();
        self.address_from_enabled_original = self.address_from_enabled;
        Ok(())
    }
}

/// Default presentation order: addressFrom, then description
pub fn compare_by_address_from(a: &LetterRecord, b: &LetterRecord) -> Ordering {
    locale_cmp(&a.address_from, &b.address_from)
        .then_with(|| locale_cmp(&a.description, &b.description))
}

/// Alternate presentation order: description only
pub fn compare_by_description(a: &LetterRecord, b: &LetterRecord) -> Ordering {
    locale_cmp(&a.description, &b.description)
}

/// Case-insensitive comparison with an exact tie-break
fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
