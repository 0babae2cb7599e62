//! Ingest command implementation

use crate::config::Config;
use crate::error::Result;
use crate::knowledge::{IngestStats, KnowledgeBase};
use crate::manifest::read_sources;
use tracing::info;

/// Ingest options
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Overrides `ingest.concurrency`
    pub concurrency: Option<usize>,
}

/// Build pages from the graph's manifest and add them to the knowledge base
pub async fn cmd_ingest(
    config: &Config,
    knowledge: &KnowledgeBase,
    options: IngestOptions,
) -> Result<IngestStats> {
    let sources = read_sources(config)?;
    info!(
        "Ingesting {} operations (router at {})",
        sources.manifest.operations.len(),
        sources.router_listen_host
    );

    let concurrency = options.concurrency.unwrap_or(config.ingest.concurrency);
    Ok(knowledge
        .ingest_manifest(&sources, &config.graph.name, concurrency)
        .await)
}

/// Print ingestion statistics
pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\n✓ Ingestion complete\n");
    println!("  Operations: {}", stats.pages_total);
    println!("  Resources created: {}", stats.resources_created);
    println!("  Chunks created: {}", stats.chunks_created);

    if stats.duplicates > 0 {
        println!("  Already present: {}", stats.duplicates);
    }

    if !stats.skipped.is_empty() {
        println!("\n⚠ Skipped {} operations:", stats.skipped.len());
        for skipped in &stats.skipped {
            println!("  - {}: {}", skipped.name, skipped.error);
        }
    }

    if !stats.failures.is_empty() {
        println!("\n✗ {} failures:", stats.failures.len());
        for failure in stats.failures.iter().take(10) {
            println!("  - {}: {}", failure.url, failure.error);
        }
        if stats.failures.len() > 10 {
            println!("  ... and {} more", stats.failures.len() - 10);
        }
    }
}
