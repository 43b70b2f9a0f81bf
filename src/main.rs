use anyhow::{bail, Context};
use clap::Parser;
use rfdeck::{Document, ExportConfig, SlideDescriptor};
use std::path::PathBuf;

/// Capture the slides of a rendered report page and export them as a hosted presentation
#[derive(Parser, Debug)]
#[command(name = "rfdeck", version)]
struct Args {
    /// Rendered report HTML
    #[arg(long)]
    html: PathBuf,

    /// JSON array of `{ "id": ..., "title": ... }` slide descriptors
    #[arg(long)]
    slides: PathBuf,

    /// Presentation title
    #[arg(long)]
    title: String,

    /// Assembly endpoint (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// URL the report was served from; decides which images are same-origin
    #[arg(long)]
    base_url: Option<String>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Relay URL template (repeatable, replaces the configured list)
    #[arg(long = "relay")]
    relays: Vec<String>,

    /// Skip inlining cross-origin images before capture
    #[arg(long)]
    no_inline_images: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.assembly_endpoint = endpoint;
    }
    if !args.relays.is_empty() {
        config.relays = args.relays;
    }
    if args.no_inline_images {
        config.inline_images = false;
    }
    if config.assembly_endpoint.is_empty() {
        bail!("no assembly endpoint: pass --endpoint or set assembly_endpoint in --config");
    }

    let html = std::fs::read_to_string(&args.html)
        .with_context(|| format!("reading {}", args.html.display()))?;
    let mut doc = match &args.base_url {
        Some(base) => Document::parse_with_base(&html, base)?,
        None => Document::parse(&html),
    };

    let raw = std::fs::read_to_string(&args.slides)
        .with_context(|| format!("reading {}", args.slides.display()))?;
    let descriptors = SlideDescriptor::list_from_json(&raw)?;

    let exporter = rfdeck::new_exporter(config)?;
    let result = exporter
        .export_all(&mut doc, &descriptors, &args.title)
        .await
        .context("export failed")?;

    println!("{}", result.presentation_url);
    Ok(())
}
