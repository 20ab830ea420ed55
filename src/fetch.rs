//! Load pipeline: listing → eligible letters → per-language detail GETs → cache.
//!
//! The detail batch is a barrier: nothing reaches the cache until every GET
//! has resolved. Within the batch a failing letter only drops that letter.

use crate::api::{ApiClient, ApiRequest};
use crate::batch::run_batch;
use crate::cache::LetterCache;
use crate::config::Config;
use crate::error::EditorError;
use crate::i18n::ActiveLanguages;
use crate::letter::LetterRecord;
use crate::progress::Progress;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Delivery channel of the letters this editor handles
pub const EMAIL_CHANNEL: &str = "EMAIL";

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    letter: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    code: String,
    /// Display name of the letter
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    enabled: Value,
    #[serde(default)]
    channel: Value,
    labels: LabelsLink,
}

#[derive(Debug, Deserialize)]
struct LabelsLink {
    link: String,
}

impl ListingEntry {
    fn is_enabled(&self) -> bool {
        match scalar(&self.enabled) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn is_email(&self) -> bool {
        matches!(scalar(&self.channel), Some(Value::String(channel)) if channel == EMAIL_CHANNEL)
    }
}

/// Listing fields come either bare or wrapped as `{ "value": ... }`
fn scalar(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => map.get("value"),
        Value::Null => None,
        other => Some(other),
    }
}

/// Outcome of a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Enabled email letters in the listing
    pub eligible: usize,
    /// Letters now in the editable list
    pub loaded: usize,
    /// Letters without an addressFrom sub-field
    pub not_editable: usize,
    /// Letters dropped because a detail GET failed
    pub failed: usize,
}

/// Replace the cache contents with the eligible letters in every active
/// language.
///
/// The cache is cleared first, so a listing failure leaves it empty.
pub async fn load_letters(
    client: &ApiClient,
    config: &Config,
    progress: &Progress,
    cache: &mut LetterCache,
    active: &ActiveLanguages,
) -> Result<LoadReport, EditorError> {
    cache.clear();
    progress.start(0);

    info!("Fetching letter listing from {}", config.listing_path);
    let listing = client
        .call(ApiRequest::get(&config.listing_path))
        .await
        .map_err(|e| EditorError::Discovery {
            resource: "letter listing".to_string(),
            reason: e.to_string(),
        })?;
    let listing: Listing =
        serde_json::from_value(listing).map_err(|e| EditorError::Discovery {
            resource: "letter listing".to_string(),
            reason: e.to_string(),
        })?;

    let mut entries = Vec::new();
    for raw in listing.letter {
        match serde_json::from_value::<ListingEntry>(raw) {
            Ok(entry) if entry.is_enabled() && entry.is_email() => {
                let display_name = entry.name.clone().unwrap_or_else(|| entry.code.clone());
                cache.register(&entry.code, &display_name, &entry.labels.link);
                entries.push(entry);
            }
            Ok(entry) => debug!("Skipping letter {} (disabled or not email)", entry.code),
            Err(e) => warn!("Skipping malformed listing entry: {}", e),
        }
    }

    let mut report = LoadReport {
        eligible: entries.len(),
        ..LoadReport::default()
    };
    info!(
        "Found {} eligible letters, fetching {} language(s)",
        entries.len(),
        active.len()
    );

    let calls: Vec<_> = entries
        .iter()
        .enumerate()
        .flat_map(|(index, entry)| {
            active.iter().map(move |lang| {
                (
                    (index, lang.to_string()),
                    ApiRequest::get(&entry.labels.link).with_lang(lang),
                )
            })
        })
        .collect();
    progress.start(calls.len());

    let mut grouped: Vec<Vec<Result<LetterRecord, EditorError>>> =
        entries.iter().map(|_| Vec::new()).collect();
    for ((index, lang), result) in run_batch(client, progress, calls).await {
        let code = &entries[index].code;
        let record = match result {
            Ok(value) => LetterRecord::from_value(value, &lang),
            Err(source) => Err(EditorError::ItemFetch {
                letter: code.clone(),
                language: lang,
                source,
            }),
        };
        grouped[index].push(record);
    }

    for (entry, records) in entries.iter().zip(grouped) {
        match records.into_iter().collect::<Result<Vec<_>, _>>() {
            Ok(mut variants) if !variants.is_empty() => {
                let description = cache.description(&entry.code).unwrap_or_default().to_string();
                for variant in &mut variants {
                    variant.set_description(description.clone());
                }

                // Active languages list the base first
                let base = variants.remove(0);
                cache.alias(&entry.code, base.name());
                cache.insert_letter(base, variants);
                report.loaded += 1;
            }
            Ok(_) => {}
            Err(EditorError::MissingField { letter, field }) => {
                info!("Letter {} is not editable: no {} sub-field", letter, field);
                report.not_editable += 1;
            }
            Err(e) => {
                warn!("Dropping letter {}: {}", entry.code, e);
                report.failed += 1;
            }
        }
    }

    cache.sort_by_address_from();
    info!(
        "Loaded {} editable letters ({} not editable, {} failed)",
        report.loaded, report.not_editable, report.failed
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::letter::tests::letter_json;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn listing_entry(code: &str, name: &str, enabled: &str, channel: &str) -> Value {
        json!({
            "code": code,
            "name": name,
            "enabled": {"value": enabled},
            "channel": channel,
            "labels": {"link": format!("/conf/code-tables/{}Labels", code)}
        })
    }

    async fn mount_letter(server: &MockServer, code: &str, lang: &str, address_from: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/conf/code-tables/{}Labels", code)))
            .and(query_param("lang", lang))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(letter_json(code, address_from, true)),
            )
            .mount(server)
            .await;
    }

    async fn mount_listing(server: &MockServer, entries: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/conf/letters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "letter": entries })))
            .mount(server)
            .await;
    }

    // ==================== Listing Tests ====================

    #[test]
    fn test_listing_entry_flags() {
        let entry: ListingEntry =
            serde_json::from_value(listing_entry("A", "A letter", "true", "EMAIL")).unwrap();
        assert!(entry.is_enabled());
        assert!(entry.is_email());

        let entry: ListingEntry = serde_json::from_value(json!({
            "code": "B",
            "enabled": {"value": false},
            "channel": {"value": "PRINT"},
            "labels": {"link": "/b"}
        }))
        .unwrap();
        assert!(!entry.is_enabled());
        assert!(!entry.is_email());
    }

    // ==================== Load Tests ====================

    #[tokio::test]
    async fn test_load_filters_and_sorts() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![
                listing_entry("Fine", "Fine Notice", "true", "EMAIL"),
                listing_entry("Loan", "Loan Receipt", "true", "EMAIL"),
                listing_entry("Off", "Disabled", "false", "EMAIL"),
                listing_entry("Print", "Printed", "true", "PRINT"),
                json!({"code": "Broken"}),
            ],
        )
        .await;
        mount_letter(&server, "Fine", "en", "z@x.edu").await;
        mount_letter(&server, "Loan", "en", "a@x.edu").await;

        let config = Config::new(server.uri());
        let client = ApiClient::new(&config).expect("client");
        let progress = Progress::new();
        let mut cache = LetterCache::new();

        let report = load_letters(
            &client,
            &config,
            &progress,
            &mut cache,
            &ActiveLanguages::base_only("en"),
        )
        .await
        .expect("Should load");

        assert_eq!(report.eligible, 2);
        assert_eq!(report.loaded, 2);
        let names: Vec<_> = cache.letters().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["Loan", "Fine"]);
        assert_eq!(cache.letter("Loan").unwrap().description(), "Loan Receipt");
        assert_eq!(progress.percent_complete(), 100);
        assert!(client.language_touched());
    }

    #[tokio::test]
    async fn test_load_drops_letter_without_address_from() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![
                listing_entry("Loan", "Loan Receipt", "true", "EMAIL"),
                listing_entry("Plain", "No Sender", "true", "EMAIL"),
            ],
        )
        .await;
        mount_letter(&server, "Loan", "en", "a@x.edu").await;
        Mock::given(method("GET"))
            .and(path("/conf/code-tables/PlainLabels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Plain",
                "row": [{"code": "header", "description": "Hi", "enabled": true}]
            })))
            .mount(&server)
            .await;

        let config = Config::new(server.uri());
        let client = ApiClient::new(&config).expect("client");
        let mut cache = LetterCache::new();

        let report = load_letters(
            &client,
            &config,
            &Progress::new(),
            &mut cache,
            &ActiveLanguages::base_only("en"),
        )
        .await
        .unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(report.not_editable, 1);
        assert!(cache.letter("Plain").is_none());
    }

    #[tokio::test]
    async fn test_load_translation_failure_drops_whole_letter() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![
                listing_entry("Loan", "Loan Receipt", "true", "EMAIL"),
                listing_entry("Fine", "Fine Notice", "true", "EMAIL"),
            ],
        )
        .await;
        mount_letter(&server, "Loan", "en", "a@x.edu").await;
        mount_letter(&server, "Loan", "fr", "a-fr@x.edu").await;
        mount_letter(&server, "Fine", "en", "b@x.edu").await;
        Mock::given(method("GET"))
            .and(path("/conf/code-tables/FineLabels"))
            .and(query_param("lang", "fr"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let config = Config::new(server.uri());
        let client = ApiClient::new(&config).expect("client");
        let mut cache = LetterCache::new();

        let report = load_letters(
            &client,
            &config,
            &Progress::new(),
            &mut cache,
            &ActiveLanguages::with_selected("en", "fr"),
        )
        .await
        .unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed, 1);
        assert!(cache.letter("Fine").is_none());
        assert!(cache.variant("en", "Fine").is_none());
        assert!(cache.variant("fr", "Fine").is_none());
        assert_eq!(
            cache.variant("fr", "Loan").unwrap().address_from(),
            "a-fr@x.edu"
        );
    }

    #[tokio::test]
    async fn test_load_aliases_resource_name_to_listing_code() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            vec![listing_entry("FulLoan", "Loan Receipt", "true", "EMAIL")],
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/conf/code-tables/FulLoanLabels"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(letter_json("LoanReceipt", "a@x.edu", true)),
            )
            .mount(&server)
            .await;

        let config = Config::new(server.uri());
        let client = ApiClient::new(&config).expect("client");
        let mut cache = LetterCache::new();

        load_letters(
            &client,
            &config,
            &Progress::new(),
            &mut cache,
            &ActiveLanguages::base_only("en"),
        )
        .await
        .unwrap();

        assert_eq!(cache.link("LoanReceipt"), Some("/conf/code-tables/FulLoanLabels"));
        assert_eq!(cache.letter("LoanReceipt").unwrap().description(), "Loan Receipt");
    }

    #[tokio::test]
    async fn test_load_listing_failure_leaves_cache_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conf/letters"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let config = Config::new(server.uri());
        let client = ApiClient::new(&config).expect("client");
        let mut cache = LetterCache::new();
        cache.register("Old", "Old", "/old");

        let result = load_letters(
            &client,
            &config,
            &Progress::new(),
            &mut cache,
            &ActiveLanguages::base_only("en"),
        )
        .await;

        assert!(matches!(result, Err(EditorError::Discovery { .. })));
        assert!(cache.is_empty());
        assert!(cache.first_link().is_none());
    }

    #[tokio::test]
    async fn test_load_malformed_listing_is_discovery_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conf/letters"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"letter": "not a list"})),
            )
            .mount(&server)
            .await;

        let config = Config::new(server.uri());
        let client = ApiClient::new(&config).expect("client");
        let mut cache = LetterCache::new();

        let result = load_letters(
            &client,
            &config,
            &Progress::new(),
            &mut cache,
            &ActiveLanguages::base_only("en"),
        )
        .await;

        match result {
            Err(EditorError::Discovery { resource, .. }) => assert_eq!(resource, "letter listing"),
            other => panic!("Expected Discovery error, got {:?}", other),
        }
        assert!(cache.is_empty());
    }
}
