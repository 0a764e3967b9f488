//! Command line entry point for the statute ingestion pipeline.

use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hanlaw_ai::{EmbedConfig, Embedder, HttpEmbedder, MockEmbedder};
use hanlaw_store::PgStore;
use hanlaw_sync::{
    ApiConfig, ExistencePolicy, IngestError, IngestOptions, IngestReport, Ingestor, SingleOutcome,
    SourceClient, UpdateStrategy,
};

#[derive(Parser)]
#[command(name = "hanlaw", version, about = "Korean statute ingestion pipeline")]
struct Cli {
    #[command(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Common {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// law.go.kr caller credential (the OC parameter).
    #[arg(long, env = "LAW_API_OC")]
    oc: String,

    /// Embedding server base URL.
    #[arg(long, env = "EMBED_URL", default_value = "http://localhost:11434")]
    embed_url: String,

    #[arg(long, env = "EMBED_MODEL", default_value = "jhgan/ko-sroberta-multitask")]
    embed_model: String,

    #[arg(long, env = "EMBED_DIM", default_value_t = 768)]
    embed_dim: usize,

    /// Use a deterministic in-process embedder instead of a server.
    #[arg(long)]
    mock_embedder: bool,

    /// Pause between statutes, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Count an item as failed when its existence check errors,
    /// instead of treating it as new.
    #[arg(long)]
    fail_closed: bool,

    /// Keep the original created_at when re-ingesting a statute.
    #[arg(long)]
    preserve_created_at: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest statutes matching a keyword.
    Search {
        keyword: String,
        #[arg(long, default_value_t = 20)]
        max: usize,
        /// Re-ingest statutes that are already stored.
        #[arg(long)]
        update: bool,
    },
    /// Ingest a single statute by its exact Korean title.
    Fetch {
        name: String,
        #[arg(long)]
        update: bool,
    },
    /// Walk the whole statute catalogue.
    Bulk {
        #[arg(long, default_value_t = 100)]
        max: usize,
        #[arg(long)]
        update: bool,
    },
    /// Re-ingest already stored statutes, optionally narrowed by keyword.
    Update {
        keyword: Option<String>,
        #[arg(long, default_value_t = 20)]
        max: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("hanlaw v{}", env!("CARGO_PKG_VERSION"));

    let store = PgStore::connect(&cli.common.database_url)
        .await
        .context("connecting to postgres")?;
    let client = SourceClient::new(ApiConfig {
        oc: cli.common.oc.clone(),
        ..ApiConfig::default()
    })?;
    let embedder = build_embedder(&cli.common)?;

    match cli.command {
        Command::Search {
            keyword,
            max,
            update,
        } => {
            let options = ingest_options(&cli.common, Some(keyword), max, update);
            let report = Ingestor::new(client, store, embedder, options).run().await?;
            print_report(&report);
        }
        Command::Bulk { max, update } => {
            let options = ingest_options(&cli.common, None, max, update);
            let report = Ingestor::new(client, store, embedder, options).run().await?;
            print_report(&report);
        }
        Command::Update { keyword, max } => {
            let options = ingest_options(&cli.common, keyword, max, true);
            let report = Ingestor::new(client, store, embedder, options).run().await?;
            print_report(&report);
        }
        Command::Fetch { name, update } => {
            let options = ingest_options(&cli.common, None, 1, update);
            let ingestor = Ingestor::new(client, store, embedder, options);
            match ingestor.fetch_one(&name).await {
                Ok(SingleOutcome::Inserted(id)) => println!("stored '{name}' (id {id})"),
                Ok(SingleOutcome::Updated(id)) => println!("updated '{name}' (id {id})"),
                Ok(SingleOutcome::AlreadyStored { created_at }) => {
                    println!("'{name}' already stored since {created_at}; pass --update to refresh")
                }
                Err(IngestError::NoExactMatch { candidates, .. }) => {
                    println!("no statute titled '{name}'");
                    if !candidates.is_empty() {
                        println!("did you mean:");
                        for candidate in candidates {
                            println!("  {candidate}");
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}

fn build_embedder(common: &Common) -> anyhow::Result<Box<dyn Embedder>> {
    if common.mock_embedder {
        return Ok(Box::new(MockEmbedder::new(common.embed_dim)));
    }
    let embedder = HttpEmbedder::new(EmbedConfig {
        base_url: common.embed_url.clone(),
        model: common.embed_model.clone(),
        dim: common.embed_dim,
        ..EmbedConfig::default()
    })?;
    Ok(Box::new(embedder))
}

fn ingest_options(
    common: &Common,
    keyword: Option<String>,
    max: usize,
    update: bool,
) -> IngestOptions {
    IngestOptions {
        keyword,
        max_statutes: max,
        update_existing: update,
        existence_policy: if common.fail_closed {
            ExistencePolicy::FailClosed
        } else {
            ExistencePolicy::FailOpen
        },
        update_strategy: if common.preserve_created_at {
            UpdateStrategy::PreserveCreatedAt
        } else {
            UpdateStrategy::ResetCreatedAt
        },
        request_interval: Duration::from_millis(common.interval_ms),
        ..IngestOptions::default()
    }
}

fn print_report(report: &IngestReport) {
    println!(
        "inserted {}, updated {}, skipped {}, failed {}",
        report.inserted, report.updated, report.skipped, report.failed
    );
}
