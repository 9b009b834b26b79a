//! Turns raw provider items into the simplified records returned to clients.
//!
//! Each item passes through two stages: Open Graph / fallback simplification,
//! then (optionally) heading enrichment from the linked page.

use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::PipelineSettings;
use crate::models::{SearchResultItem, SimplifiedResult, SENTINEL_HEADING};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no url to fetch")]
    MissingUrl,

    #[error("timeout fetching {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0} for {1}")]
    Status(u16, String),

    #[error("no h1 elements in {0}")]
    NoHeadings(String),
}

/// Outcome of the simplification stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simplified {
    pub result: SimplifiedResult,
    /// Page to scrape for headings; may be empty.
    pub target_url: String,
}

/// Chooses the Open Graph shape when any `og:` field is present, otherwise
/// falls back to the plain title, link and snippet.
pub fn simplify(item: &SearchResultItem, use_metadata: bool) -> Simplified {
    let og_title = item.metatag("og:title");
    let og_url = item.metatag("og:url");
    let og_description = item.metatag("og:description");

    let has_og = og_title.is_some() || og_url.is_some() || og_description.is_some();
    if use_metadata && has_og {
        let url = og_url.unwrap_or(item.link.as_str()).to_string();
        return Simplified {
            result: SimplifiedResult::OpenGraph {
                og_title: og_title.unwrap_or_default().to_string(),
                og_url: url.clone(),
                og_description: og_description.unwrap_or_default().to_string(),
                h1_tags: None,
            },
            target_url: url,
        };
    }

    Simplified {
        result: SimplifiedResult::Fallback {
            broken_title: item.title.clone(),
            broken_url: item.link.clone(),
            broken_description: item.snippet.clone(),
            h1_tags: None,
        },
        target_url: item.link.clone(),
    }
}

/// Text of every `h1` in document order, trimmed.
pub fn extract_headings(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("h1") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect()
}

pub fn sentinel_headings() -> Vec<String> {
    vec![SENTINEL_HEADING.to_string()]
}

/// Fetches linked pages and pulls their top-level headings.
#[derive(Clone)]
pub struct HeadingFetcher {
    client: Client,
}

impl HeadingFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub async fn try_fetch_headings(&self, url: &str) -> Result<Vec<String>, FetchError> {
        if url.is_empty() {
            return Err(FetchError::MissingUrl);
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16(), url.to_string()));
        }

        let html = response.text().await?;
        let headings = extract_headings(&html);
        if headings.is_empty() {
            return Err(FetchError::NoHeadings(url.to_string()));
        }
        Ok(headings)
    }

    /// Never fails: any problem yields `["unable to fetch data"]`.
    pub async fn fetch_headings(&self, url: &str) -> Vec<String> {
        match self.try_fetch_headings(url).await {
            Ok(headings) => headings,
            Err(e) => {
                debug!(url, "Heading scrape failed: {}", e);
                sentinel_headings()
            }
        }
    }
}

#[derive(Clone)]
pub struct EnrichService {
    use_metadata: bool,
    headings: Option<HeadingFetcher>,
}

impl EnrichService {
    pub fn new(use_metadata: bool, headings: Option<HeadingFetcher>) -> Self {
        Self {
            use_metadata,
            headings,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> anyhow::Result<Self> {
        let headings = if settings.scrape_headings {
            Some(HeadingFetcher::new(
                Duration::from_secs(settings.scrape_timeout_secs),
                &settings.scrape_user_agent,
            )?)
        } else {
            None
        };
        Ok(Self::new(settings.extract_metadata, headings))
    }

    /// Items are scraped one after another, in result order.
    pub async fn enrich(&self, items: &[SearchResultItem]) -> Vec<SimplifiedResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let Simplified {
                mut result,
                target_url,
            } = simplify(item, self.use_metadata);
            if let Some(fetcher) = &self.headings {
                result.set_headings(fetcher.fetch_headings(&target_url).await);
            }
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(value: serde_json::Value) -> SearchResultItem {
        serde_json::from_value(value).unwrap()
    }

    fn fetcher() -> HeadingFetcher {
        HeadingFetcher::new(Duration::from_secs(2), "test-agent/1.0").unwrap()
    }

    #[test]
    fn og_fields_win_and_link_fills_missing_url() {
        let simplified = simplify(
            &item(json!({
                "title": "plain", "link": "L", "snippet": "plain snippet",
                "pagemap": { "metatags": [{ "og:title": "A", "og:description": "B" }] }
            })),
            true,
        );

        assert_eq!(
            simplified.result,
            SimplifiedResult::OpenGraph {
                og_title: "A".into(),
                og_url: "L".into(),
                og_description: "B".into(),
                h1_tags: None,
            }
        );
        assert_eq!(simplified.target_url, "L");
    }

    #[test]
    fn og_url_alone_selects_open_graph_shape() {
        let simplified = simplify(
            &item(json!({
                "link": "https://example.com/a",
                "pagemap": { "metatags": [{ "og:url": "https://example.com/canonical" }] }
            })),
            true,
        );

        assert_eq!(
            simplified.result,
            SimplifiedResult::OpenGraph {
                og_title: String::new(),
                og_url: "https://example.com/canonical".into(),
                og_description: String::new(),
                h1_tags: None,
            }
        );
        assert_eq!(simplified.target_url, "https://example.com/canonical");
    }

    #[test]
    fn missing_metadata_falls_back_to_plain_fields() {
        let simplified = simplify(
            &item(json!({ "title": "T", "link": "L", "snippet": "S" })),
            true,
        );

        assert_eq!(
            simplified.result,
            SimplifiedResult::Fallback {
                broken_title: "T".into(),
                broken_url: "L".into(),
                broken_description: "S".into(),
                h1_tags: None,
            }
        );
        assert_eq!(simplified.target_url, "L");
    }

    #[test]
    fn only_first_metatags_block_is_consulted() {
        let simplified = simplify(
            &item(json!({
                "title": "T", "link": "L", "snippet": "S",
                "pagemap": { "metatags": [{ "viewport": "width=device-width" }, { "og:title": "late" }] }
            })),
            true,
        );
        assert!(matches!(simplified.result, SimplifiedResult::Fallback { .. }));
    }

    #[test]
    fn disabled_metadata_stage_always_falls_back() {
        let simplified = simplify(
            &item(json!({
                "title": "T", "link": "L", "snippet": "S",
                "pagemap": { "metatags": [{ "og:title": "A" }] }
            })),
            false,
        );
        assert!(matches!(simplified.result, SimplifiedResult::Fallback { .. }));
    }

    #[test]
    fn extracts_trimmed_headings_in_order() {
        let html = r#"
            <html><body>
                <h1>  First heading </h1>
                <h2>Not this one</h2>
                <div><h1>Second <span>nested</span></h1></div>
            </body></html>
        "#;
        assert_eq!(
            extract_headings(html),
            vec!["First heading".to_string(), "Second nested".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_url_yields_sentinel_without_request() {
        assert_eq!(
            fetcher().fetch_headings("").await,
            vec![SENTINEL_HEADING.to_string()]
        );
    }

    #[tokio::test]
    async fn fetches_headings_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .and(header("user-agent", "test-agent/1.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body><h1>Hello</h1><h1>World</h1></body></html>", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let headings = fetcher()
            .fetch_headings(&format!("{}/article", server.uri()))
            .await;
        assert_eq!(headings, vec!["Hello".to_string(), "World".to_string()]);
    }

    #[tokio::test]
    async fn page_without_headings_yields_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>no headings</p>", "text/html"))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let url = server.uri();
        assert!(matches!(
            fetcher.try_fetch_headings(&url).await,
            Err(FetchError::NoHeadings(_))
        ));
        assert_eq!(fetcher.fetch_headings(&url).await, sentinel_headings());
    }

    #[tokio::test]
    async fn error_status_yields_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_raw("<h1>Not Found</h1>", "text/html"))
            .mount(&server)
            .await;

        assert_eq!(fetcher().fetch_headings(&server.uri()).await, sentinel_headings());
    }

    #[tokio::test]
    async fn slow_page_times_out_to_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<h1>late</h1>", "text/html")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HeadingFetcher::new(Duration::from_millis(100), "test-agent/1.0").unwrap();
        assert!(matches!(
            fetcher.try_fetch_headings(&server.uri()).await,
            Err(FetchError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn one_failing_page_does_not_affect_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>Fine</h1>", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let items = vec![
            item(json!({ "title": "broken", "link": format!("{}/broken", server.uri()) })),
            item(json!({ "title": "no link" })),
            item(json!({
                "link": "unused",
                "pagemap": { "metatags": [{ "og:url": format!("{}/ok", server.uri()) }] }
            })),
        ];

        let service = EnrichService::new(true, Some(fetcher()));
        let results = service.enrich(&items).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].headings(), Some(&sentinel_headings()[..]));
        assert_eq!(results[1].headings(), Some(&sentinel_headings()[..]));
        assert_eq!(results[2].headings(), Some(&["Fine".to_string()][..]));
    }

    #[tokio::test]
    async fn scraping_disabled_leaves_headings_unset() {
        let service = EnrichService::new(true, None);
        let results = service
            .enrich(&[item(json!({ "title": "T", "link": "https://example.invalid/" }))])
            .await;
        assert_eq!(results[0].headings(), None);
    }
}
