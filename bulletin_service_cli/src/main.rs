use anyhow::Context;
use bulletin_service_cli::{
    catalog::{paginate, Catalog, GazetteFilter, DEFAULT_PAGE_SIZE},
    config::{load_dotenv, FeedConfig, SummaryConfig},
    scraper::Scraper,
    summarize::{Document, Summarizer},
    utils, Gazette,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily BOE/BOC bulletins with AI legal summaries", long_about = None)]
struct Args {
    /// Number of feeds downloaded concurrently
    #[arg(short, long, global = true)]
    concurrent: Option<usize>,

    /// Maximum characters per summarized chunk
    #[arg(long, global = true)]
    chunk_chars: Option<usize>,

    /// Primary summarization model
    #[arg(long, global = true)]
    primary_model: Option<String>,

    /// Fallback summarization model
    #[arg(long, global = true)]
    fallback_model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List today's bulletins
    List {
        #[arg(short, long, value_enum, default_value_t = GazetteFilter::All)]
        gazette: GazetteFilter,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        per_page: usize,
    },
    /// Search titles and descriptions
    Search { query: String },
    /// Summarize one bulletin by its number, or any BOE/BOC page by URL
    Summarize {
        #[arg(required_unless_present = "url")]
        number: Option<usize>,

        #[arg(long, conflicts_with = "number")]
        url: Option<String>,

        /// Also write the summary to this file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Write the catalog as JSON
    Export {
        #[arg(short, long, default_value = "bulletins.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut feed_config = FeedConfig::from_env();
    if let Some(n) = args.concurrent {
        feed_config.concurrency = n.max(1);
    }
    let mut summary_config = SummaryConfig::from_env();
    if let Some(n) = args.chunk_chars {
        summary_config.chunk_char_budget = n;
    }
    if let Some(m) = args.primary_model {
        summary_config.primary_model_id = m;
    }
    if let Some(m) = args.fallback_model {
        summary_config.fallback_model_id = m;
    }

    let scraper = Scraper::new(&feed_config)?;

    // a direct URL needs no catalog
    if let Command::Summarize {
        url: Some(url),
        output,
        ..
    } = &args.command
    {
        return summarize(&scraper, &summary_config, url, None, output.as_deref()).await;
    }

    let catalog = Catalog::load(&scraper).await;
    println!(
        "📋 {} boletines cargados ({} BOE, {} BOC)",
        catalog.len(),
        catalog.count(Gazette::Boe),
        catalog.count(Gazette::Boc)
    );

    match args.command {
        Command::List {
            gazette,
            page,
            per_page,
        } => {
            let filtered = catalog.filter(gazette);
            let view = paginate(&filtered, page, per_page);
            println!(
                "📋 Mostrando resultados {} a {} de {} (página {}/{})",
                view.first, view.last, view.total, view.page, view.total_pages
            );
            for b in view.items {
                println!("{}\n", utils::render_bulletin(b));
            }
        }
        Command::Search { query } => {
            let found = catalog.search(&query)?;
            println!("🔍 Coincidencias encontradas: {}", found.len());
            for b in found {
                println!("{}\n", utils::render_bulletin(b));
            }
        }
        Command::Summarize { number, output, .. } => {
            let number = number.context("indica un número de boletín o --url")?;
            let bulletin = catalog.get(number)?;
            println!("### 📰 {}\n🔗 {}", bulletin.title.trim(), bulletin.url);
            summarize(
                &scraper,
                &summary_config,
                &bulletin.url,
                Some(bulletin.gazette),
                output.as_deref(),
            )
            .await?;
        }
        Command::Export { output } => {
            utils::save_json(&catalog, &output)?;
            println!("✅ {output} creado.");
        }
    }

    Ok(())
}

async fn summarize(
    scraper: &Scraper,
    config: &SummaryConfig,
    url: &str,
    gazette: Option<Gazette>,
    output: Option<&str>,
) -> anyhow::Result<()> {
    let summarizer = Summarizer::gemini(config)?;

    eprintln!("📡 Obteniendo texto completo del enlace...");
    let text = match gazette {
        Some(gazette) => scraper.extract_gazette_text(url, gazette).await,
        None => scraper.extract_full_text(url).await,
    }
    .with_context(|| format!("no se pudo extraer el texto de {url}"))?;

    eprintln!("⏳ Resumiendo con {}...", config.primary_model_id);
    let summary = summarizer
        .summarize_document(&Document::new(text, url))
        .await;

    println!("#### 📃 RESUMEN GENERADO\n{summary}");
    if let Some(file) = output {
        utils::save_text(&summary, file)?;
    }
    Ok(())
}
