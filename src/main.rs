use anyhow::{bail, Context, Result};
use page_translator::config::Config;
use page_translator::document::Document;
use page_translator::i18n::{Language, LanguageRegistry, TranslationMetrics};
use page_translator::overlay::Overlay;
use page_translator::translation::MyMemoryClient;
use std::sync::Arc;
use tracing::info;

const USAGE: &str = "usage: page-translator <document.json> <lang> [--restore]";

struct Args {
    document: String,
    language: String,
    restore: bool,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut restore = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--restore" => restore = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                println!("languages:");
                for language in LanguageRegistry::get().list_enabled() {
                    println!("  {}  {} ({})", language.code, language.name, language.native_name);
                }
                std::process::exit(0);
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    match (positional.next(), positional.next(), positional.next()) {
        (Some(document), Some(language), None) => Ok(Args {
            document,
            language,
            restore,
        }),
        _ => bail!(USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("page_translator=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let config = Config::from_env()?;

    let json = std::fs::read_to_string(&args.document)
        .with_context(|| format!("Failed to read {}", args.document))?;
    let document = Arc::new(
        Document::from_json(&json)
            .with_context(|| format!("Failed to parse document {}", args.document))?,
    );

    let client = MyMemoryClient::from_config(&config).context("Failed to build HTTP client")?;
    info!("Translating {} via {}", args.document, client.api_url());

    // No watcher: the document only changes through this overlay
    let overlay = Overlay::for_document(document.clone(), Arc::new(client))
        .rate_limiter(Arc::new(config.rate_limiter()))
        .settings(config.overlay_settings())
        .mount()?;

    if let Some(pass) = overlay.change_language(&args.language)? {
        let report = pass.await?;
        info!(
            "Pass finished: {} units, {} fetched, {} failed",
            report.units, report.fetched, report.failed
        );
    } else {
        info!("Document is already in {}", args.language);
    }
    println!("{}", document.to_json_pretty()?);

    if args.restore {
        if let Some(pass) = overlay.change_language(Language::base().code())? {
            let report = pass.await?;
            info!("Restored {} text units", report.restored);
        }
        println!("{}", document.to_json_pretty()?);
    }

    let metrics = TranslationMetrics::global().report();
    info!(
        "Cache hit rate {:.1}%, {} API calls ({:.1}% succeeded)",
        metrics.cache_hit_rate, metrics.api_calls, metrics.api_success_rate
    );
    Ok(())
}
