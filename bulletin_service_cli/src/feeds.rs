//! RSS parsing for BOE and BOC feeds.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ServiceError;
use crate::{Bulletin, Gazette};

pub const BOE_FEED: &str = "https://www.boe.es/rss/boe.php";
pub const BOC_BASE: &str = "https://www.gobiernodecanarias.org/boc/";

pub const BOE_TZ: Tz = chrono_tz::Europe::Madrid;
pub const BOC_TZ: Tz = chrono_tz::Atlantic::Canary;

/// Today first, then forward, then backward.
pub const DAY_OFFSETS: [i64; 7] = [0, 1, 2, 3, -1, -2, -3];

const BOC_FEED_PATHS: [&str; 27] = [
    "capitulo/disposiciones_generales.rss",
    "capitulo/autoridades_personal_nombramientos.rss",
    "capitulo/autoridades_personal_oposiciones.rss",
    "capitulo/otras_resoluciones.rss",
    "capitulo/administracion_justicia.rss",
    "capitulo/anuncios.rss",
    "capitulo/otros_anuncios.rss",
    "consejeria/presidencia_del_gobierno.rss",
    "consejeria/presidencia_justicia_igualdad.rss",
    "consejeria/agricultura.rss",
    "consejeria/empleo.rss",
    "consejeria/Industria.rss",
    "consejeria/educacion.rss",
    "consejeria/hacienda.rss",
    "consejeria/obras_publicas.rss",
    "consejeria/sanidad.rss",
    "consejeria/Politica_territorial.rss",
    "consejeria/deportes.rss",
    "cabildo/fuerteventura.rss",
    "cabildo/la_gomera.rss",
    "cabildo/gran_canaria.rss",
    "cabildo/el_hierro.rss",
    "cabildo/lanzarote.rss",
    "cabildo/la_palma.rss",
    "cabildo/tenerife.rss",
    "universidad/la_laguna.rss",
    "universidad/las_palmas.rss",
];

pub fn boc_feed_urls() -> Vec<String> {
    BOC_FEED_PATHS
        .iter()
        .map(|p| format!("{BOC_BASE}feeds/{p}"))
        .collect()
}

static BOC_ISSUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/boc/(\d{4})/(\d{1,3})/").expect("static regex"));
static H3: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").expect("static selector"));
static BOLD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b").expect("static selector"));

#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: DateTime<FixedOffset>,
}

/// Parses an RSS document. Items without a usable date or link are skipped.
pub fn parse_rss(url: &str, xml: &str) -> Result<Vec<FeedItem>, ServiceError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| ServiceError::Feed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let items = doc
        .descendants()
        .filter(|n| n.has_tag_name("item"))
        .filter_map(|item| {
            // first element with this local name that has text; namespaced
            // siblings such as <atom:link href=".."/> are empty and skipped
            let text_of = |tag: &str| {
                item.descendants()
                    .filter(|n| n.is_element() && n.tag_name().name() == tag)
                    .find_map(|n| {
                        n.text()
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_string)
                    })
            };
            let (Some(published), Some(link)) = (
                text_of("pubDate").as_deref().and_then(parse_date),
                text_of("link"),
            ) else {
                debug!(%url, title = ?text_of("title"), "feed item without date or link skipped");
                return None;
            };
            Some(FeedItem {
                // BOE carries the full title in <titulo>
                title: text_of("titulo").or_else(|| text_of("title")).unwrap_or_default(),
                link,
                description: text_of("description").unwrap_or_default(),
                published,
            })
        })
        .collect();
    Ok(items)
}

fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

pub fn to_bulletins(gazette: Gazette, items: &[FeedItem]) -> Vec<Bulletin> {
    items
        .iter()
        .map(|item| match gazette {
            Gazette::Boe => Bulletin::new(
                gazette,
                item.title.clone(),
                item.link.clone(),
                item.published.with_timezone(&BOE_TZ).date_naive(),
                item.title.clone(),
            ),
            Gazette::Boc => Bulletin::new(
                gazette,
                item.title.clone(),
                boc_canonical_url(&item.link, &item.description),
                item.published.with_timezone(&BOC_TZ).date_naive(),
                item.description.clone(),
            ),
        })
        .collect()
}

/// Entries for the first date in the window around `today` that has any.
pub fn select_date_window(bulletins: &[Bulletin], today: NaiveDate) -> Vec<Bulletin> {
    for offset in DAY_OFFSETS {
        let target = today + Duration::days(offset);
        let hits: Vec<Bulletin> = bulletins
            .iter()
            .filter(|b| b.date == target)
            .cloned()
            .collect();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

/// Direct announcement page, when both the issue and the number are known.
pub fn boc_canonical_url(link: &str, description: &str) -> String {
    let issue = BOC_ISSUE.captures(link);
    match (issue, announcement_number(description)) {
        (Some(caps), Some(number)) => format!("{BOC_BASE}{}/{}/{number}.html", &caps[1], &caps[2]),
        _ => link.to_string(),
    }
}

/// The numeric `<b>` inside the first `<h3>` of a BOC description.
/// Descriptions may arrive HTML-escaped twice.
pub fn announcement_number(description: &str) -> Option<String> {
    let fragment = Html::parse_fragment(description);
    find_number(&fragment).or_else(|| {
        let unescaped: String = fragment.root_element().text().collect();
        find_number(&Html::parse_fragment(&unescaped))
    })
}

fn find_number(html: &Html) -> Option<String> {
    let h3 = html.select(&H3).next()?;
    let bold = h3.select(&BOLD).next()?;
    let text: String = bold.text().collect();
    let text = text.trim();
    (!text.is_empty() && text.chars().all(|c| c.is_ascii_digit())).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>BOE</title>
    <item>
      <title>Corto</title>
      <titulo>Real Decreto 1/2025, de 7 de enero, completo</titulo>
      <link>https://www.boe.es/diario_boe/txt.php?id=BOE-A-2025-1</link>
      <pubDate>Tue, 07 Jan 2025 23:30:00 +0000</pubDate>
    </item>
    <item>
      <title>Sin fecha</title>
      <link>https://www.boe.es/x</link>
    </item>
    <item>
      <title>Orden de ayer</title>
      <link>https://www.boe.es/diario_boe/txt.php?id=BOE-A-2025-2</link>
      <pubDate>Mon, 06 Jan 2025 10:00:00 +0100</pubDate>
    </item>
  </channel>
</rss>"#;

    const BOC_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <item>
      <title>Anuncio de licitación</title>
      <link>https://www.gobiernodecanarias.org/boc/2025/005/index.html</link>
      <description>&lt;h3&gt;Anuncio &lt;b&gt;123&lt;/b&gt;&lt;/h3&gt;&lt;p&gt;Texto&lt;/p&gt;</description>
      <pubDate>Wed, 08 Jan 2025 08:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_boe_items_preferring_titulo() {
        let items = parse_rss(BOE_FEED, BOE_XML).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Real Decreto 1/2025, de 7 de enero, completo");
        assert_eq!(items[1].title, "Orden de ayer");
    }

    #[test]
    fn boe_dates_use_madrid_time() {
        let items = parse_rss(BOE_FEED, BOE_XML).unwrap();
        let bulletins = to_bulletins(Gazette::Boe, &items);
        // 23:30 UTC is already the next day in Madrid
        assert_eq!(bulletins[0].date, date(2025, 1, 8));
        assert_eq!(bulletins[0].content, bulletins[0].title);
    }

    #[test]
    fn namespaced_link_does_not_hide_the_rss_link() {
        let xml = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <item>
      <title>Corto</title>
      <titulo>Resolución completa</titulo>
      <atom:link href="https://x/self" rel="self"/>
      <link>https://www.boe.es/a</link>
      <pubDate>Tue, 07 Jan 2025 10:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;
        let items = parse_rss(BOE_FEED, xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://www.boe.es/a");
        assert_eq!(items[0].title, "Resolución completa");
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(matches!(
            parse_rss("u", "<rss><channel>"),
            Err(ServiceError::Feed { .. })
        ));
    }

    #[test]
    fn boc_url_is_rebuilt_from_description() {
        let items = parse_rss("boc", BOC_XML).unwrap();
        let bulletins = to_bulletins(Gazette::Boc, &items);
        assert_eq!(
            bulletins[0].url,
            "https://www.gobiernodecanarias.org/boc/2025/005/123.html"
        );
        assert_eq!(bulletins[0].date, date(2025, 1, 8));
    }

    #[test]
    fn announcement_number_handles_double_escaping() {
        assert_eq!(announcement_number("<h3><b>77</b></h3>").as_deref(), Some("77"));
        assert_eq!(
            announcement_number("&lt;h3&gt;&lt;b&gt;78&lt;/b&gt;&lt;/h3&gt;").as_deref(),
            Some("78")
        );
        assert_eq!(announcement_number("<h3><b>II</b></h3>"), None);
        assert_eq!(announcement_number("<p>nada</p>"), None);
    }

    #[test]
    fn keeps_raw_link_without_issue() {
        assert_eq!(
            boc_canonical_url("https://example.org/a", "<h3><b>1</b></h3>"),
            "https://example.org/a"
        );
    }

    #[test]
    fn date_window_prefers_today_then_future_then_past() {
        let items = parse_rss(BOE_FEED, BOE_XML).unwrap();
        let bulletins = to_bulletins(Gazette::Boe, &items);

        let today = select_date_window(&bulletins, date(2025, 1, 8));
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].date, date(2025, 1, 8));

        // nothing on the 5th, the 6th is found going forward first
        let forward = select_date_window(&bulletins, date(2025, 1, 5));
        assert_eq!(forward[0].title, "Orden de ayer");

        assert!(select_date_window(&bulletins, date(2025, 2, 1)).is_empty());
    }

    #[test]
    fn there_are_27_boc_feeds() {
        let urls = boc_feed_urls();
        assert_eq!(urls.len(), 27);
        assert!(urls
            .iter()
            .all(|u| u.starts_with("https://www.gobiernodecanarias.org/boc/feeds/")));
    }
}
