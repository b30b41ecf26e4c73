//! radmem-ingest: load verified reference cases into the knowledge base.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use radmem_api::ingest::{KnowledgeIngestor, DEFAULT_BATCH_SIZE};
use radmem_api::{AppConfig, StoreBackend};
use radmem_db::Database;
use radmem_inference::{ClipEmbeddingBackend, Embedder};

#[derive(Parser)]
#[command(name = "radmem-ingest")]
#[command(author, version, about = "Reference-case loader for radmem")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed and upsert cases from a JSON file
    Load {
        /// JSON array of cases
        #[arg(short, long)]
        input: PathBuf,

        /// Directory `image_path` values are relative to
        #[arg(long, default_value = ".")]
        images_dir: PathBuf,

        /// Cases embedded per batch
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Remove reference cases whose report is a placeholder
    PurgePlaceholders {
        /// Scroll page size
        #[arg(long, default_value_t = 100)]
        page: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "radmem_api=info,radmem_db=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    if config.store_backend == StoreBackend::Memory {
        anyhow::bail!("STORE_BACKEND=memory would discard everything this tool loads");
    }

    let db =
        Database::connect(&config.database_url, config.embed_dim, &config.pool_config())
            .await?;
    db.migrate().await?;
    db.ensure_collections().await?;

    match cli.command {
        Commands::Load {
            input,
            images_dir,
            batch_size,
        } => {
            let embedding = ClipEmbeddingBackend::with_config(
                config.embed_url.clone(),
                config.embed_model.clone(),
                config.embed_dim,
                config.embed_timeout_secs,
            )?;
            let embedder = Embedder::new(Arc::new(embedding), config.embed_concurrency);
            let cases = KnowledgeIngestor::read_cases(&input).await?;
            info!(input = %input.display(), total = cases.len(), "Loading reference cases");

            let report = KnowledgeIngestor::new(db, embedder, images_dir)
                .with_batch_size(batch_size)
                .ingest(cases)
                .await?;
            println!(
                "Indexed {} cases ({} skipped for missing images, {} failed)",
                report.indexed, report.skipped_missing, report.failed
            );
        }
        Commands::PurgePlaceholders { page } => {
            let removed = db.knowledge.purge_placeholders(page).await?;
            println!("Removed {} placeholder cases", removed);
        }
    }

    Ok(())
}
