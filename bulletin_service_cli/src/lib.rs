pub mod ai;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feeds;
pub mod retry;
pub mod scraper;
pub mod segment;
pub mod summarize;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod utils;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use error::ServiceError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gazette {
    /// Boletín Oficial del Estado.
    Boe,
    /// Boletín Oficial de Canarias.
    Boc,
}

impl Gazette {
    pub fn marker(&self) -> &'static str {
        match self {
            Gazette::Boe => "🟥",
            Gazette::Boc => "⬜",
        }
    }
}

impl fmt::Display for Gazette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gazette::Boe => "BOE",
            Gazette::Boc => "BOC",
        })
    }
}

/// One gazette entry as listed to the user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Bulletin {
    /// Global 1-based number, assigned by the catalog.
    pub number: usize,
    pub gazette: Gazette,
    pub title: String,
    pub url: String,
    pub date: NaiveDate,
    /// Searchable text: the title for BOE, the feed description for BOC.
    pub content: String,
}

impl Bulletin {
    pub fn new(gazette: Gazette, title: String, url: String, date: NaiveDate, content: String) -> Self {
        Self {
            number: 0,
            gazette,
            title,
            url,
            date,
            content,
        }
    }

    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.content).to_lowercase()
    }
}
