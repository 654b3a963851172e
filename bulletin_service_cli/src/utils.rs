use std::fs::File;
use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::error::ServiceError;
use crate::Bulletin;

pub fn save_json<T: Serialize + ?Sized>(data: &T, filename: &str) -> Result<(), ServiceError> {
    let mut file = File::create(filename)?;
    file.write_all(serde_json::to_string_pretty(data)?.as_bytes())?;
    info!(file = filename, "JSON written");
    Ok(())
}

pub fn save_text(content: &str, filename: &str) -> Result<(), ServiceError> {
    let mut file = File::create(filename)?;
    file.write_all(content.as_bytes())?;
    info!(file = filename, "text written");
    Ok(())
}

/// Three-line listing entry: number and gazette, title, link.
pub fn render_bulletin(b: &Bulletin) -> String {
    format!(
        "[{}] {} {} - {}\n📰 {}\n🔗 {}",
        b.number,
        b.gazette.marker(),
        b.gazette,
        b.date.format("%Y-%m-%d"),
        b.title,
        b.url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gazette;
    use chrono::NaiveDate;

    #[test]
    fn renders_listing_entry() {
        let mut b = Bulletin::new(
            Gazette::Boe,
            "Orden de pesca".into(),
            "https://www.boe.es/a".into(),
            NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
            String::new(),
        );
        b.number = 82;
        assert_eq!(
            render_bulletin(&b),
            "[82] 🟥 BOE - 2025-01-08\n📰 Orden de pesca\n🔗 https://www.boe.es/a"
        );
    }

    #[test]
    fn writes_text_file() {
        let path = std::env::temp_dir().join(format!("bulletin-summary-{}.txt", std::process::id()));
        let name = path.to_str().unwrap();
        save_text("resumen", name).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "resumen");
        std::fs::remove_file(&path).unwrap();
    }
}
