//! Concurrent request batches.
//!
//! All requests of a batch are in flight together on the current task and
//! the batch resolves only once every one of them has completed. Each result
//! stays paired with its key, so one failing request never hides the others.

use crate::api::{ApiClient, ApiRequest, ApiResult};
use crate::progress::Progress;
use futures::future::join_all;

/// Issue every request concurrently and wait for all of them.
///
/// Results come back in the order the calls were given, regardless of
/// completion order. Each completion is recorded on `progress`.
pub async fn run_batch<K>(
    client: &ApiClient,
    progress: &Progress,
    calls: Vec<(K, ApiRequest)>,
) -> Vec<(K, ApiResult)> {
    let pending = calls.into_iter().map(|(key, request)| async move {
        let result = client.call(request).await;
        progress.record_processed();
        (key, result)
    });

    join_all(pending).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn test_run_batch_isolates_failures_and_keeps_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "slow"}))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "fast"})))
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(&Config::new(mock_server.uri())).expect("client");
        let progress = Progress::new();
        progress.start(3);

        let results = run_batch(
            &client,
            &progress,
            vec![
                ("slow", ApiRequest::get("/slow")),
                ("broken", ApiRequest::get("/broken")),
                ("fast", ApiRequest::get("/fast")),
            ],
        )
        .await;

        let keys: Vec<_> = results.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, vec!["slow", "broken", "fast"]);
        assert_eq!(results[0].1.as_ref().unwrap()["name"], "slow");
        assert_eq!(results[1].1.as_ref().unwrap_err().status, 500);
        assert_eq!(results[2].1.as_ref().unwrap()["name"], "fast");
        assert_eq!(progress.percent_complete(), 100);
    }

    #[tokio::test]
    async fn test_run_batch_empty() {
        let client = ApiClient::new(&Config::new("http://127.0.0.1:1")).expect("client");
        let progress = Progress::new();

        let results: Vec<((), ApiResult)> = run_batch(&client, &progress, Vec::new()).await;

        assert!(results.is_empty());
        assert_eq!(progress.processed(), 0);
    }
}
