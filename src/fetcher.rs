use std::sync::Arc;
use std::time::Duration;

use feed_rs::parser;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::SourceConfig;
use crate::store::{UpdateRecord, UpdateStore};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed parse failed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
    #[error("refresh already in progress")]
    AlreadyRunning,
    #[error("all {0} sources failed")]
    AllSourcesFailed(usize),
}

pub struct Fetcher {
    client: Client,
    store: Arc<dyn UpdateStore>,
    sources: Vec<SourceConfig>,
    refreshing: Arc<RwLock<bool>>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn UpdateStore>, sources: Vec<SourceConfig>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Patchfeed/1.0 (Update News Aggregator)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            store,
            sources,
            refreshing: Arc::new(RwLock::new(false)),
        }
    }

    /// Fetch every source and overwrite the cache with the combined
    /// record set. Returns the number of records written.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        {
            let mut refreshing = self.refreshing.write().await;
            if *refreshing {
                info!("Refresh already in progress, skipping");
                return Err(FetchError::AlreadyRunning);
            }
            *refreshing = true;
        }

        let result = self.do_refresh().await;

        {
            let mut refreshing = self.refreshing.write().await;
            *refreshing = false;
        }

        result
    }

    async fn do_refresh(&self) -> Result<usize, FetchError> {
        info!("Refreshing {} sources", self.sources.len());

        let mut records = Vec::new();
        let mut failures = 0;
        for source in &self.sources {
            match self.fetch_source(source).await {
                Ok(mut source_records) => {
                    info!(
                        "Fetched {} records from source '{}'",
                        source_records.len(),
                        source.name
                    );
                    records.append(&mut source_records);
                }
                Err(e) => {
                    error!("Failed to fetch source '{}': {}", source.name, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 && failures == self.sources.len() {
            return Err(FetchError::AllSourcesFailed(failures));
        }

        let count = records.len();
        self.store.write(&records);
        info!("Refresh complete, {} records cached", count);
        Ok(count)
    }

    async fn fetch_source(&self, source: &SourceConfig) -> Result<Vec<UpdateRecord>, FetchError> {
        info!("Fetching source: {} ({})", source.name, source.url);

        let response = self.client.get(&source.url).send().await?;
        let bytes = response.bytes().await?;
        let parsed = parser::parse(&bytes[..])?;

        let mut records = Vec::new();
        for entry in parsed.entries {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_else(|| "Untitled".to_string());

            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();

            if link.is_empty() {
                warn!("Skipping entry with no link: {}", title);
                continue;
            }

            let summary = entry.summary.as_ref().map(|s| s.content.clone());

            let published_date = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.to_rfc3339());

            records.push(UpdateRecord {
                category: Self::classify_category(&title),
                cloud_provider: source.cloud_provider.clone(),
                service_type: Self::classify_service_type(&title),
                title,
                link,
                summary,
                published_date,
                ..Default::default()
            });
        }

        Ok(records)
    }

    /// Best-effort keyword classification of an update title.
    pub fn classify_category(title: &str) -> Option<String> {
        let lower = title.to_lowercase();
        let category = if lower.contains("security") || lower.contains("vulnerability") || lower.contains("cve") {
            "security"
        } else if lower.contains("storage") || lower.contains("blob") || lower.contains("disk") {
            "storage"
        } else if lower.contains("network") || lower.contains("vpn") || lower.contains("dns") {
            "networking"
        } else if lower.contains("database") || lower.contains("sql") {
            "database"
        } else if lower.contains("compute") || lower.contains("virtual machine") || lower.contains(" vm") {
            "compute"
        } else if lower.contains(" ai") || lower.contains("machine learning") || lower.contains("copilot") {
            "ai"
        } else {
            return None;
        };
        Some(category.to_string())
    }

    pub fn classify_service_type(title: &str) -> Option<String> {
        let lower = title.to_lowercase();
        let service_type = if lower.contains("preview") {
            "preview"
        } else if lower.contains("general availability") || lower.contains("generally available") {
            "ga"
        } else if lower.contains("retirement") || lower.contains("retired") || lower.contains("deprecat") {
            "retirement"
        } else {
            return None;
        };
        Some(service_type.to_string())
    }
}

pub async fn start_background_refresh(fetcher: Arc<Fetcher>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    // Do initial fetch
    info!("Starting initial update fetch");
    if let Err(e) = fetcher.refresh().await {
        error!("Initial update fetch failed: {}", e);
    }

    // Then schedule periodic refreshes
    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled update refresh");
        if let Err(e) = fetcher.refresh().await {
            error!("Scheduled update refresh failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss_feed(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0">
                <channel>
                    <title>Cloud Updates</title>
                    <link>https://updates.example.com</link>
                    {items}
                </channel>
            </rss>"#
        )
    }

    fn source(name: &str, url: &str, provider: Option<&str>) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            url: url.to_string(),
            cloud_provider: provider.map(String::from),
        }
    }

    mod classify_tests {
        use super::*;

        #[test]
        fn test_classify_security() {
            assert_eq!(
                Fetcher::classify_category("Critical security update for Windows Server"),
                Some("security".to_string())
            );
            assert_eq!(
                Fetcher::classify_category("CVE-2024-1234 mitigation available"),
                Some("security".to_string())
            );
        }

        #[test]
        fn test_classify_storage_and_compute() {
            assert_eq!(
                Fetcher::classify_category("Premium blob storage now cheaper"),
                Some("storage".to_string())
            );
            assert_eq!(
                Fetcher::classify_category("New virtual machine sizes announced"),
                Some("compute".to_string())
            );
        }

        #[test]
        fn test_classify_unmatched_title() {
            assert_eq!(Fetcher::classify_category("Quarterly roadmap review"), None);
        }

        #[test]
        fn test_classify_service_type() {
            assert_eq!(
                Fetcher::classify_service_type("Azure Functions Flex plan now in preview"),
                Some("preview".to_string())
            );
            assert_eq!(
                Fetcher::classify_service_type("Confidential VMs reach general availability"),
                Some("ga".to_string())
            );
            assert_eq!(
                Fetcher::classify_service_type("Classic storage accounts retirement notice"),
                Some("retirement".to_string())
            );
            assert_eq!(Fetcher::classify_service_type("Plain announcement"), None);
        }
    }

    mod refresh_tests {
        use super::*;

        #[tokio::test]
        async fn test_refresh_writes_all_records() {
            let server = MockServer::start().await;
            let feed = rss_feed(
                r#"
                <item>
                    <title>New virtual machine sizes announced</title>
                    <link>https://updates.example.com/vm-sizes</link>
                    <pubDate>Sat, 01 Jun 2024 10:00:00 GMT</pubDate>
                </item>
                <item>
                    <title>Blob storage lifecycle rules in preview</title>
                    <link>https://updates.example.com/blob-lifecycle</link>
                    <pubDate>Sun, 02 Jun 2024 10:00:00 GMT</pubDate>
                </item>
                "#,
            );
            Mock::given(method("GET"))
                .and(path("/feed"))
                .respond_with(ResponseTemplate::new(200).set_body_string(feed))
                .mount(&server)
                .await;

            let store = Arc::new(MemStore::default());
            let fetcher = Fetcher::new(
                store.clone(),
                vec![source("Azure", &format!("{}/feed", server.uri()), Some("azure"))],
            );

            let count = fetcher.refresh().await.unwrap();
            assert_eq!(count, 2);

            let records = store.read();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].title, "New virtual machine sizes announced");
            assert_eq!(records[0].cloud_provider.as_deref(), Some("azure"));
            assert_eq!(records[0].category.as_deref(), Some("compute"));
            assert_eq!(records[1].service_type.as_deref(), Some("preview"));
            assert!(records[0].published_date.is_some());
        }

        #[tokio::test]
        async fn test_refresh_replaces_previous_cache() {
            let server = MockServer::start().await;
            let feed = rss_feed(
                r#"
                <item>
                    <title>Single fresh item</title>
                    <link>https://updates.example.com/fresh</link>
                </item>
                "#,
            );
            Mock::given(method("GET"))
                .and(path("/feed"))
                .respond_with(ResponseTemplate::new(200).set_body_string(feed))
                .mount(&server)
                .await;

            let store = Arc::new(MemStore::new(vec![
                UpdateRecord {
                    title: "stale".to_string(),
                    ..Default::default()
                },
                UpdateRecord {
                    title: "staler".to_string(),
                    ..Default::default()
                },
            ]));
            let fetcher = Fetcher::new(
                store.clone(),
                vec![source("Azure", &format!("{}/feed", server.uri()), None)],
            );

            fetcher.refresh().await.unwrap();

            let records = store.read();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].title, "Single fresh item");
        }

        #[tokio::test]
        async fn test_refresh_skips_entries_without_links() {
            let server = MockServer::start().await;
            let feed = rss_feed(
                r#"
                <item>
                    <title>No link here</title>
                </item>
                <item>
                    <title>Linked item</title>
                    <link>https://updates.example.com/linked</link>
                </item>
                "#,
            );
            Mock::given(method("GET"))
                .and(path("/feed"))
                .respond_with(ResponseTemplate::new(200).set_body_string(feed))
                .mount(&server)
                .await;

            let store = Arc::new(MemStore::default());
            let fetcher = Fetcher::new(
                store.clone(),
                vec![source("Azure", &format!("{}/feed", server.uri()), None)],
            );

            let count = fetcher.refresh().await.unwrap();
            assert_eq!(count, 1);
            assert_eq!(store.read()[0].title, "Linked item");
        }

        #[tokio::test]
        async fn test_refresh_fails_when_every_source_fails() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/feed"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let store = Arc::new(MemStore::new(vec![UpdateRecord {
                title: "existing".to_string(),
                ..Default::default()
            }]));
            let fetcher = Fetcher::new(
                store.clone(),
                vec![source("Broken", &format!("{}/feed", server.uri()), None)],
            );

            let result = fetcher.refresh().await;
            assert!(matches!(result, Err(FetchError::AllSourcesFailed(1))));
            // The existing cache is left alone on a total failure
            assert_eq!(store.read().len(), 1);
        }

        #[tokio::test]
        async fn test_refresh_tolerates_partial_source_failure() {
            let server = MockServer::start().await;
            let feed = rss_feed(
                r#"
                <item>
                    <title>Healthy item</title>
                    <link>https://updates.example.com/ok</link>
                </item>
                "#,
            );
            Mock::given(method("GET"))
                .and(path("/good"))
                .respond_with(ResponseTemplate::new(200).set_body_string(feed))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/bad"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let store = Arc::new(MemStore::default());
            let fetcher = Fetcher::new(
                store.clone(),
                vec![
                    source("Good", &format!("{}/good", server.uri()), None),
                    source("Bad", &format!("{}/bad", server.uri()), None),
                ],
            );

            let count = fetcher.refresh().await.unwrap();
            assert_eq!(count, 1);
        }
    }
}
