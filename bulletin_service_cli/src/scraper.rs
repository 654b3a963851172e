use crate::config::FeedConfig;
use crate::error::ServiceError;
use crate::feeds::{parse_rss, select_date_window, to_bulletins, FeedItem};
use crate::{Bulletin, Gazette};
use backoff::{future::retry, ExponentialBackoff};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Emitted whole, as one paragraph each.
const BLOCK_TAGS: [&str; 13] = [
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "pre", "dt", "dd",
];
/// Break the surrounding text but are walked into.
const SECTION_TAGS: [&str; 16] = [
    "div", "section", "article", "header", "footer", "main", "aside", "nav", "ul", "ol", "dl",
    "table", "thead", "tbody", "tr", "blockquote",
];
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];
const BOC_CONTAINERS: [&str; 5] = ["texto", "contenido", "cuerpo", "main", "articulo"];

static BOE_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#textoxslt").expect("static selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("static selector"));

/// HTTP side of the service: feed downloads and full-text extraction.
pub struct Scraper {
    client: Client,
    concurrent_requests: usize,
    retry_window: Duration,
}

impl Scraper {
    pub fn new(config: &FeedConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: Client::builder()
                .timeout(config.fetch_timeout)
                .build()?,
            concurrent_requests: config.concurrency.max(1),
            retry_window: config.retry_window,
        })
    }

    /// BOE entries for the first date in the window around `today` that has any.
    pub async fn boe_recent(&self, feed_url: &str, today: NaiveDate) -> Vec<Bulletin> {
        match self.feed_items(feed_url).await {
            Ok(items) => {
                let found = select_date_window(&to_bulletins(Gazette::Boe, &items), today);
                info!(count = found.len(), "BOE entries loaded");
                found
            }
            Err(e) => {
                warn!(url = feed_url, error = %e, "BOE feed unavailable");
                Vec::new()
            }
        }
    }

    /// Downloads every BOC sub-feed through a bounded pool and merges them.
    /// A failing sub-feed only loses its own entries.
    pub async fn boc_recent(&self, feed_urls: &[String], today: NaiveDate) -> Vec<Bulletin> {
        let per_feed = stream::iter(feed_urls)
            .map(|url| async move {
                match self.feed_items(url).await {
                    Ok(items) => to_bulletins(Gazette::Boc, &items),
                    Err(e) => {
                        warn!(%url, error = %e, "BOC feed skipped");
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(self.concurrent_requests)
            .collect::<Vec<_>>()
            .await;

        let all: Vec<Bulletin> = per_feed.into_iter().flatten().collect();
        let found = select_date_window(&all, today);
        info!(feeds = feed_urls.len(), count = found.len(), "BOC entries loaded");
        found
    }

    async fn feed_items(&self, url: &str) -> Result<Vec<FeedItem>, ServiceError> {
        let body = self.fetch_with_retry(url).await?;
        parse_rss(url, &body)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, ServiceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_window),
            ..Default::default()
        };

        retry(backoff, || async {
            match self.fetch(url).await {
                Ok(body) => Ok(body),
                Err(e) if e.is_transient() => {
                    warn!(%url, error = %e, "fetch failed, retrying");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    async fn fetch(&self, url: &str) -> Result<String, ServiceError> {
        debug!(%url, "fetching");
        let res = self.client.get(url).send().await?;

        if !res.status().is_success() {
            return Err(ServiceError::Status {
                url: url.to_string(),
                status: res.status().as_u16(),
            });
        }

        Ok(res.text().await?)
    }

    /// Plain text of a BOE/BOC page, with paragraphs separated by blank lines.
    /// The publisher is told apart by host; other hosts are refused unfetched.
    pub async fn extract_full_text(&self, url: &str) -> Result<String, ServiceError> {
        let parsed = Url::parse(url)?;
        let gazette = publisher(&parsed).ok_or_else(|| ServiceError::NoContent(url.to_string()))?;
        self.extract_gazette_text(url, gazette).await
    }

    /// Same as [`Scraper::extract_full_text`] for a page whose publisher is
    /// already known, as with catalog entries.
    pub async fn extract_gazette_text(
        &self,
        url: &str,
        gazette: Gazette,
    ) -> Result<String, ServiceError> {
        let body = self.fetch(url).await?;
        extract_text(gazette, &body).ok_or_else(|| ServiceError::NoContent(url.to_string()))
    }
}

pub fn publisher(url: &Url) -> Option<Gazette> {
    let host = url.host_str()?;
    if host == "boe.es" || host.ends_with(".boe.es") {
        Some(Gazette::Boe)
    } else if host.ends_with("gobiernodecanarias.org") {
        Some(Gazette::Boc)
    } else {
        None
    }
}

/// Picks the publisher's content container and flattens it to text.
pub fn extract_text(gazette: Gazette, body: &str) -> Option<String> {
    let doc = Html::parse_document(body);

    let container = match gazette {
        Gazette::Boe => doc.select(&BOE_CONTAINER).next(),
        Gazette::Boc => BOC_CONTAINERS
            .iter()
            .filter_map(|class| Selector::parse(&format!("div.{class}")).ok())
            .find_map(|sel| doc.select(&sel).next())
            .or_else(|| doc.select(&BODY).next()),
    }?;

    let text = container_text(container);
    (!text.is_empty()).then_some(text)
}

fn container_text(container: ElementRef<'_>) -> String {
    let mut text = Paragraphs::default();
    text.walk(container);
    text.flush();
    text.done.join("\n\n")
}

/// Flattens a subtree in document order. Block elements become paragraphs
/// of their own; loose text between them is gathered until the next break.
#[derive(Default)]
struct Paragraphs {
    done: Vec<String>,
    pending: String,
}

impl Paragraphs {
    fn walk(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.pending.push_str(text),
                Node::Element(element) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = element.name();
                    if SKIPPED_TAGS.contains(&name) {
                        continue;
                    }
                    if name == "br" {
                        self.flush();
                    } else if BLOCK_TAGS.contains(&name) {
                        self.flush();
                        self.push(&child.text().collect::<String>());
                    } else if SECTION_TAGS.contains(&name) {
                        self.flush();
                        self.walk(child);
                        self.flush();
                    } else {
                        self.walk(child);
                    }
                }
                _ => {}
            }
        }
    }

    fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        self.push(&pending);
    }

    fn push(&mut self, raw: &str) {
        let text = normalize_whitespace(raw);
        if !text.is_empty() {
            self.done.push(text);
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BOE_PAGE: &str = r#"<html><body>
        <div id="menu"><p>Menú</p></div>
        <div id="textoxslt">
          <h4>Artículo 1</h4>
          <p class="parrafo">Se aprueba   el
             reglamento.</p>
          <ul><li><p>Primero</p></li></ul>
        </div>
    </body></html>"#;

    fn scraper() -> Scraper {
        Scraper::new(&FeedConfig {
            concurrency: 4,
            fetch_timeout: Duration::from_secs(5),
            retry_window: Duration::from_millis(200),
        })
        .unwrap()
    }

    #[test]
    fn boe_text_comes_from_textoxslt() {
        let text = extract_text(Gazette::Boe, BOE_PAGE).unwrap();
        assert_eq!(text, "Artículo 1\n\nSe aprueba el reglamento.\n\nPrimero");
    }

    #[test]
    fn boc_tries_known_containers_then_body() {
        let page = r#"<html><body><div class="cuerpo"><p>Uno</p><p>Dos</p></div></body></html>"#;
        assert_eq!(extract_text(Gazette::Boc, page).unwrap(), "Uno\n\nDos");

        let bare = r#"<html><body><span>Solo</span> <span>texto</span></body></html>"#;
        assert_eq!(extract_text(Gazette::Boc, bare).unwrap(), "Solo texto");
    }

    #[test]
    fn text_outside_paragraphs_is_kept_in_order() {
        let page = r#"<div id="textoxslt"><p>Preámbulo</p><div>Artículo 2. Texto en un div.</div>Texto suelto final</div>"#;
        assert_eq!(
            extract_text(Gazette::Boe, page).unwrap(),
            "Preámbulo\n\nArtículo 2. Texto en un div.\n\nTexto suelto final"
        );
    }

    #[test]
    fn line_breaks_split_loose_text_and_scripts_are_dropped() {
        let page = r#"<html><body><div class="texto">
            Disposición <b>primera</b>.<br>Disposición segunda.
            <script>var x = 1;</script>
            <table><tr><td>Celda</td><td>Otra</td></tr></table>
        </div></body></html>"#;
        assert_eq!(
            extract_text(Gazette::Boc, page).unwrap(),
            "Disposición primera.\n\nDisposición segunda.\n\nCelda\n\nOtra"
        );
    }

    #[test]
    fn missing_container_yields_nothing() {
        assert!(extract_text(Gazette::Boe, "<html><body><p>x</p></body></html>").is_none());
    }

    #[test]
    fn publisher_from_host() {
        let boe = Url::parse("https://www.boe.es/diario_boe/txt.php?id=1").unwrap();
        let boc = Url::parse("https://www.gobiernodecanarias.org/boc/2025/005/1.html").unwrap();
        let other = Url::parse("https://example.org/").unwrap();
        assert_eq!(publisher(&boe), Some(Gazette::Boe));
        assert_eq!(publisher(&boc), Some(Gazette::Boc));
        assert_eq!(publisher(&other), None);
    }

    #[tokio::test]
    async fn unknown_publisher_is_rejected_without_fetching() {
        let err = scraper()
            .extract_full_text("https://example.org/doc")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoContent(_)));
    }

    #[tokio::test]
    async fn known_gazette_page_is_fetched_and_flattened() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/diario_boe/txt.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BOE_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/diario_boe/txt.php", server.uri());
        let text = scraper()
            .extract_gazette_text(&url, Gazette::Boe)
            .await
            .unwrap();
        assert_eq!(text, "Artículo 1\n\nSe aprueba el reglamento.\n\nPrimero");
    }

    #[tokio::test]
    async fn page_without_container_or_missing_page_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacia"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/falta"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let empty = scraper()
            .extract_gazette_text(&format!("{}/vacia", server.uri()), Gazette::Boe)
            .await
            .unwrap_err();
        assert!(matches!(empty, ServiceError::NoContent(_)));

        let missing = scraper()
            .extract_gazette_text(&format!("{}/falta", server.uri()), Gazette::Boe)
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn boc_feeds_are_merged_and_failures_skipped() {
        let server = MockServer::start().await;
        let feed = |title: &str| {
            format!(
                r#"<rss><channel><item><title>{title}</title>
                <link>https://www.gobiernodecanarias.org/boc/2025/005/index.html</link>
                <description>x</description>
                <pubDate>Wed, 08 Jan 2025 08:00:00 +0000</pubDate></item></channel></rss>"#
            )
        };
        Mock::given(method("GET"))
            .and(path("/a.rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed("A")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed("B")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.rss"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let urls: Vec<String> = ["a", "b", "missing"]
            .iter()
            .map(|n| format!("{}/{n}.rss", server.uri()))
            .collect();
        let today = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();

        let mut titles: Vec<String> = scraper()
            .boc_recent(&urls, today)
            .await
            .into_iter()
            .map(|b| b.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["A", "B"]);
    }
}
