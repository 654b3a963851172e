use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::feeds::{boc_feed_urls, BOC_TZ, BOE_FEED, BOE_TZ};
use crate::scraper::Scraper;
use crate::{Bulletin, Gazette};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GazetteFilter {
    #[default]
    All,
    Boe,
    Boc,
}

impl GazetteFilter {
    fn accepts(&self, gazette: Gazette) -> bool {
        match self {
            GazetteFilter::All => true,
            GazetteFilter::Boe => gazette == Gazette::Boe,
            GazetteFilter::Boc => gazette == Gazette::Boc,
        }
    }
}

/// The day's entries of both gazettes, numbered once and kept for the
/// lifetime of the process.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub loaded_at: DateTime<Utc>,
    bulletins: Vec<Bulletin>,
}

impl Catalog {
    /// BOE entries first, then BOC; numbers start at 1.
    pub fn new(boe: Vec<Bulletin>, boc: Vec<Bulletin>) -> Self {
        let bulletins = boe
            .into_iter()
            .chain(boc)
            .enumerate()
            .map(|(i, mut b)| {
                b.number = i + 1;
                b
            })
            .collect();
        Self {
            loaded_at: Utc::now(),
            bulletins,
        }
    }

    /// Fetches both gazettes around their local "today".
    pub async fn load(scraper: &Scraper) -> Self {
        let now = Utc::now();
        let today_madrid = now.with_timezone(&BOE_TZ).date_naive();
        let today_canary = now.with_timezone(&BOC_TZ).date_naive();
        Self::load_for(scraper, today_madrid, today_canary).await
    }

    pub async fn load_for(scraper: &Scraper, boe_today: NaiveDate, boc_today: NaiveDate) -> Self {
        let boe = scraper.boe_recent(BOE_FEED, boe_today).await;
        let boc = scraper.boc_recent(&boc_feed_urls(), boc_today).await;
        Self::new(boe, boc)
    }

    pub fn all(&self) -> &[Bulletin] {
        &self.bulletins
    }

    pub fn len(&self) -> usize {
        self.bulletins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bulletins.is_empty()
    }

    pub fn count(&self, gazette: Gazette) -> usize {
        self.bulletins.iter().filter(|b| b.gazette == gazette).count()
    }

    pub fn get(&self, number: usize) -> Result<&Bulletin, ServiceError> {
        number
            .checked_sub(1)
            .and_then(|i| self.bulletins.get(i))
            .ok_or(ServiceError::NotFound(number))
    }

    pub fn filter(&self, filter: GazetteFilter) -> Vec<&Bulletin> {
        self.bulletins
            .iter()
            .filter(|b| filter.accepts(b.gazette))
            .collect()
    }

    /// Case-insensitive substring search over title and content.
    pub fn search(&self, query: &str) -> Result<Vec<&Bulletin>, ServiceError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(ServiceError::QueryTooShort {
                min: MIN_QUERY_CHARS,
            });
        }
        let needle = query.to_lowercase();
        Ok(self
            .bulletins
            .iter()
            .filter(|b| b.searchable_text().contains(&needle))
            .collect())
    }
}

#[derive(Debug, Serialize)]
pub struct PageView<'a> {
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    /// 1-based position of the first item shown (0 when empty).
    pub first: usize,
    pub last: usize,
    pub items: Vec<&'a Bulletin>,
}

/// Slices `items` into pages; out-of-range pages are clamped.
pub fn paginate<'a>(items: &[&'a Bulletin], page: usize, per_page: usize) -> PageView<'a> {
    let per_page = per_page.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total);
    PageView {
        page,
        total_pages,
        total,
        first: if total == 0 { 0 } else { start + 1 },
        last: end,
        items: items[start..end].to_vec(),
    }
}
