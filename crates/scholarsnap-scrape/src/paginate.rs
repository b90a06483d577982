use std::time::Duration;

use rand::Rng;
use scholarsnap_core::config::{PaginationConfig, secs};
use scholarsnap_core::{Publication, PublicationSet};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::http::{BrowserClient, RequestKind, RetryPolicy};

/// One paginated listing of publications.
pub trait PageSource {
    fn label(&self) -> &'static str;

    fn request_kind(&self) -> RequestKind;

    /// URL shapes to try for one page, in order. The first that yields rows wins.
    fn page_urls(&self, offset: usize, page_size: usize) -> Vec<String>;

    fn parse_page(&self, body: &str) -> Result<Vec<Publication>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    pub page_size: usize,
    pub max_pages: usize,
    pub retry: RetryPolicy,
    pub delay: Duration,
    pub delay_jitter: Duration,
}

impl PageSettings {
    pub fn from_config(config: &PaginationConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            max_pages: config.max_pages,
            retry: RetryPolicy::new(
                config.page_retries,
                secs(config.page_backoff_secs),
                secs(config.delay_jitter_secs),
            ),
            delay: secs(config.delay_secs),
            delay_jitter: secs(config.delay_jitter_secs),
        }
    }

    /// `delay` plus `delay_jitter * jitter_fraction`.
    pub fn pause_for(&self, jitter_fraction: f64) -> Duration {
        self.delay + self.delay_jitter.mul_f64(jitter_fraction.clamp(0.0, 1.0))
    }

    /// Polite pause between two page requests.
    fn pause(&self) -> Duration {
        self.pause_for(rand::rng().random::<f64>())
    }
}

impl Default for PageSettings {
    fn default() -> Self {
        Self::from_config(&PaginationConfig::default())
    }
}

/// Walks a [`PageSource`] page by page, strictly sequentially.
pub struct Paginator<'a> {
    client: &'a BrowserClient,
    settings: PageSettings,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a BrowserClient, settings: PageSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &PageSettings {
        &self.settings
    }

    pub async fn fetch_all(&self, source: &dyn PageSource) -> Result<Vec<Publication>> {
        self.fetch_from(source, PublicationSet::new(), 0).await
    }

    /// Continues a listing whose first `start_page` pages are already in `seen`.
    ///
    /// Stops when a page adds no new rows, when a page is shorter than the page
    /// size (after keeping it), or after `max_pages` pages. Titles already seen
    /// are dropped, first occurrence wins. Fails only if nothing was collected
    /// and a request failed.
    pub async fn fetch_from(
        &self,
        source: &dyn PageSource,
        mut seen: PublicationSet,
        start_page: usize,
    ) -> Result<Vec<Publication>> {
        let page_size = self.settings.page_size.max(1);
        let mut first_error: Option<ScrapeError> = None;

        for page_idx in start_page..self.settings.max_pages {
            self.wait_before(page_idx, start_page).await;
            let offset = page_idx * page_size;
            let (rows, page_error) = self.fetch_page(source, offset, page_size).await;
            if rows.is_empty() {
                if let Some(err) = page_error {
                    warn!("{} page {} failed: {err}", source.label(), page_idx + 1);
                    first_error.get_or_insert(err);
                } else {
                    info!("{} page {}: no rows, done", source.label(), page_idx + 1);
                }
                break;
            }

            let fetched = rows.len();
            let added = seen.extend(rows);
            info!(
                "{} page {}: +{added} new rows ({fetched} fetched)",
                source.label(),
                page_idx + 1
            );
            if added == 0 {
                break;
            }
            if fetched < page_size {
                break;
            }
        }

        match first_error {
            Some(err) if seen.is_empty() => Err(err),
            _ => Ok(seen.into_vec()),
        }
    }

    /// Sleeps before every page except the first one of this walk.
    async fn wait_before(&self, page_idx: usize, start_page: usize) {
        if page_idx <= start_page {
            return;
        }
        let pause = self.settings.pause();
        debug!("Waiting {:.1}s before page {}", pause.as_secs_f64(), page_idx + 1);
        sleep(pause).await;
    }

    async fn fetch_page(
        &self,
        source: &dyn PageSource,
        offset: usize,
        page_size: usize,
    ) -> (Vec<Publication>, Option<ScrapeError>) {
        let mut last_error = None;
        for url in source.page_urls(offset, page_size) {
            let rows = match self
                .client
                .fetch_with(&url, &self.settings.retry, source.request_kind())
                .await
            {
                Ok(body) => source.parse_page(&body),
                Err(err) => Err(err),
            };
            match rows {
                Ok(rows) if !rows.is_empty() => return (rows, None),
                Ok(_) => debug!("No publication rows at {url}"),
                Err(err) => last_error = Some(err),
            }
        }
        (Vec::new(), last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileUrl;
    use mockito::{Matcher, Server};

    fn row(title: &str, citations: &str) -> String {
        format!(
            r#"<tr class="gsc_a_tr"><td class="gsc_a_t"><a href="/p">{title}</a>
                <div class="gs_gray">X Author</div><div class="gs_gray">Venue</div></td>
                <td class="gsc_a_c"><a class="gsc_a_ac">{citations}</a></td>
                <td class="gsc_a_y"><span>2020</span></td></tr>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            r#"<html><body><table><tbody id="gsc_a_b">{}</tbody></table></body></html>"#,
            rows.concat()
        )
    }

    fn settings(page_size: usize, max_pages: usize) -> PageSettings {
        PageSettings {
            page_size,
            max_pages,
            retry: RetryPolicy::immediate(1),
            delay: Duration::ZERO,
            delay_jitter: Duration::ZERO,
        }
    }

    fn client() -> BrowserClient {
        BrowserClient::new(Duration::from_secs(5), RetryPolicy::immediate(1)).unwrap()
    }

    fn listing_query(cstart: usize, page_size: usize) -> Matcher {
        Matcher::Exact(format!("user=abc&hl=en&cstart={cstart}&pagesize={page_size}"))
    }

    #[tokio::test]
    async fn merges_pages_and_drops_repeated_titles() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/citations")
            .match_query(listing_query(0, 2))
            .with_body(page(&[row("A", "5"), row("B", "4")]))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/citations")
            .match_query(listing_query(2, 2))
            .with_body(page(&[row("B", "99"), row("C", "1")]))
            .create_async()
            .await;
        let third = server
            .mock("GET", "/citations")
            .match_query(listing_query(4, 2))
            .with_body(page(&[row("D", "0")]))
            .create_async()
            .await;

        let profile = ProfileUrl::parse(&format!("{}/citations?user=abc&hl=en", server.url())).unwrap();
        let client = client();
        let pubs = Paginator::new(&client, settings(2, 10))
            .fetch_all(&profile)
            .await
            .unwrap();

        let titles: Vec<_> = pubs.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C", "D"]);
        assert_eq!(pubs[1].citations, "4");
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn short_page_stops_without_further_requests() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/citations")
            .match_query(listing_query(0, 3))
            .with_body(page(&[row("A", "1"), row("B", "2")]))
            .expect(1)
            .create_async()
            .await;
        let never = server
            .mock("GET", "/citations")
            .match_query(Matcher::UrlEncoded("cstart".into(), "3".into()))
            .expect(0)
            .create_async()
            .await;

        let profile = ProfileUrl::parse(&format!("{}/citations?user=abc", server.url())).unwrap();
        let client = client();
        let pubs = Paginator::new(&client, settings(3, 10))
            .fetch_all(&profile)
            .await
            .unwrap();

        assert_eq!(pubs.len(), 2);
        first.assert_async().await;
        never.assert_async().await;
    }

    #[tokio::test]
    async fn falls_through_to_list_view_shape() {
        let mut server = Server::new_async().await;
        let default_view = server
            .mock("GET", "/citations")
            .match_query(listing_query(0, 5))
            .with_body("<html><body>no rows in this view</body></html>")
            .create_async()
            .await;
        let list_view = server
            .mock("GET", "/citations")
            .match_query(Matcher::Exact(
                "user=abc&hl=en&cstart=0&pagesize=5&view_op=list_works".into(),
            ))
            .with_body(page(&[row("Only in list view", "2")]))
            .create_async()
            .await;

        let profile = ProfileUrl::parse(&format!("{}/citations?user=abc&hl=en", server.url())).unwrap();
        let client = client();
        let pubs = Paginator::new(&client, settings(5, 10))
            .fetch_all(&profile)
            .await
            .unwrap();

        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].title, "Only in list view");
        default_view.assert_async().await;
        list_view.assert_async().await;
    }

    #[tokio::test]
    async fn stops_at_max_pages() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/citations")
            .match_query(listing_query(0, 1))
            .with_body(page(&[row("A", "1")]))
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/citations")
            .match_query(listing_query(1, 1))
            .with_body(page(&[row("B", "1")]))
            .create_async()
            .await;
        let beyond = server
            .mock("GET", "/citations")
            .match_query(Matcher::UrlEncoded("cstart".into(), "2".into()))
            .expect(0)
            .create_async()
            .await;

        let profile = ProfileUrl::parse(&format!("{}/citations?user=abc&hl=en", server.url())).unwrap();
        let client = client();
        let pubs = Paginator::new(&client, settings(1, 2))
            .fetch_all(&profile)
            .await
            .unwrap();

        assert_eq!(pubs.len(), 2);
        beyond.assert_async().await;
    }

    #[tokio::test]
    async fn failure_with_nothing_collected_is_an_error() {
        let mut server = Server::new_async().await;
        let _blocked = server
            .mock("GET", "/citations")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let profile = ProfileUrl::parse(&format!("{}/citations?user=abc&hl=en", server.url())).unwrap();
        let client = client();
        let err = Paginator::new(&client, settings(2, 3))
            .fetch_all(&profile)
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Fetch { .. }));
    }

    #[tokio::test]
    async fn later_failure_keeps_collected_rows() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/citations")
            .match_query(listing_query(0, 1))
            .with_body(page(&[row("A", "1")]))
            .create_async()
            .await;
        let _rest = server
            .mock("GET", "/citations")
            .match_query(Matcher::UrlEncoded("cstart".into(), "1".into()))
            .with_status(503)
            .create_async()
            .await;

        let profile = ProfileUrl::parse(&format!("{}/citations?user=abc&hl=en", server.url())).unwrap();
        let client = client();
        let pubs = Paginator::new(&client, settings(1, 5))
            .fetch_all(&profile)
            .await
            .unwrap();
        assert_eq!(pubs.len(), 1);
    }

    #[test]
    fn pause_stays_within_delay_and_jitter() {
        let mut s = settings(10, 3);
        s.delay = Duration::from_millis(1500);
        s.delay_jitter = Duration::from_millis(700);

        assert_eq!(s.pause_for(0.0), Duration::from_millis(1500));
        assert_eq!(s.pause_for(1.0), Duration::from_millis(2200));
        assert_eq!(s.pause_for(4.0), Duration::from_millis(2200));
        for _ in 0..100 {
            let pause = s.pause();
            assert!(pause >= s.delay && pause <= s.delay + s.delay_jitter);
        }
    }

    #[test]
    fn from_config_carries_delays() {
        let config = PaginationConfig {
            delay_secs: 2.0,
            delay_jitter_secs: 0.5,
            page_retries: 4,
            ..PaginationConfig::default()
        };
        let s = PageSettings::from_config(&config);
        assert_eq!(s.delay, Duration::from_secs(2));
        assert_eq!(s.delay_jitter, Duration::from_millis(500));
        assert_eq!(s.retry.max_attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn only_later_pages_wait() {
        let mut s = settings(10, 3);
        s.delay = Duration::from_secs(2);
        s.delay_jitter = Duration::from_secs(1);
        let client = client();
        let paginator = Paginator::new(&client, s);

        let start = tokio::time::Instant::now();
        paginator.wait_before(0, 0).await;
        paginator.wait_before(1, 1).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        paginator.wait_before(1, 0).await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(3), "waited {waited:?}");
    }

    #[tokio::test]
    async fn walk_pauses_between_pages() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/citations")
            .match_query(listing_query(0, 1))
            .with_body(page(&[row("A", "1")]))
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/citations")
            .match_query(listing_query(1, 1))
            .with_body(page(&[row("B", "2")]))
            .create_async()
            .await;
        let _end = server
            .mock("GET", "/citations")
            .match_query(Matcher::UrlEncoded("cstart".into(), "2".into()))
            .with_body(page(&[]))
            .create_async()
            .await;

        let mut s = settings(1, 5);
        s.delay = Duration::from_millis(40);
        let profile = ProfileUrl::parse(&format!("{}/citations?user=abc&hl=en", server.url())).unwrap();
        let client = client();

        let start = std::time::Instant::now();
        let pubs = Paginator::new(&client, s).fetch_all(&profile).await.unwrap();
        assert_eq!(pubs.len(), 2);
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
