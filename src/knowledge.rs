//! Knowledge base: ingestion and retrieval
//!
//! Ingestion turns a page into a resource plus embedded chunks. Retrieval
//! embeds a free-text query and returns the closest chunks above a floor.

use crate::chunk::split_chunks;
use crate::config::Config;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::manifest::{self, ManifestSources, Page, SkippedOperation};
use crate::store::{content_hash, EmbeddedChunk, KnowledgeStore, Resource, Retrieved};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Separator placed between retrieved chunks in a rendered prompt
pub const CHUNK_SEPARATOR: &str = "~~~~~~";

pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.5;

/// A page that made it into the store
#[derive(Debug, Clone, Serialize)]
pub struct IngestedPage {
    pub resource: Resource,
    pub chunk_count: usize,
    /// Identical content had already been ingested
    pub duplicate: bool,
}

/// A page that failed to ingest
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub url: String,
    pub error: String,
}

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub pages_total: usize,
    pub resources_created: usize,
    pub chunks_created: usize,
    pub duplicates: usize,
    /// Operations left out because their body did not parse
    pub skipped: Vec<SkippedOperation>,
    pub failures: Vec<IngestFailure>,
}

impl IngestStats {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failures.is_empty()
    }
}

/// A rendered retrieval prompt for a conversational model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPrompt {
    pub role: String,
    pub content: String,
}

/// Render retrieved chunks and the user's question into a prompt
pub fn render_prompt(question: &str, retrieved: &[Retrieved]) -> QueryPrompt {
    let information = retrieved
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", CHUNK_SEPARATOR));

    let content = format!(
        "Using the following information, respond to the implied intent of the user's request.\n\
         Different pieces of information are separated by \"{}\".\n\
         \n\
         Information:\n\
         {}\n\
         \n\
         User query: {}",
        CHUNK_SEPARATOR, information, question
    );

    QueryPrompt {
        role: "user".to_string(),
        content,
    }
}

/// Retrieval queries arrive with escaped newlines from tool calls
fn normalize_query(query: &str) -> String {
    query.replace("\\n", " ")
}

/// Handle over an embedder and a store
#[derive(Clone)]
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    delimiter: String,
    batch_size: usize,
}

impl KnowledgeBase {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            embedder,
            store,
            delimiter: crate::config::default_chunk_delimiter(),
            batch_size: crate::config::default_embedding_batch_size(),
        }
    }

    /// Knowledge base using the chunking and batching settings of `config`
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self::new(embedder, store)
            .with_delimiter(&config.chunk.delimiter)
            .with_batch_size(config.embedding.batch_size)
    }

    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = delimiter.to_string();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Fail when stored embeddings came from a different model.
    /// With `record`, an empty store adopts the embedder's profile.
    async fn check_profile(&self, record: bool) -> Result<()> {
        let current = self.embedder.profile();
        match self.store.embedding_profile().await? {
            Some(stored) => match stored.mismatch(&current) {
                Some(message) => Err(Error::Embedding(message)),
                None => Ok(()),
            },
            None if record => self.store.record_embedding_profile(&current).await,
            None => Ok(()),
        }
    }

    /// Ingest one page: embed its chunks, then write the resource and chunks
    pub async fn ingest(&self, page: &Page) -> Result<IngestedPage> {
        let content = page.to_content()?;
        let chunks = split_chunks(&content, &self.delimiter);
        debug!("Page {} split into {} chunks", page.url, chunks.len());

        let embeddings =
            embed_in_batches(self.embedder.as_ref(), chunks.clone(), self.batch_size).await?;
        self.check_profile(true).await?;

        let duplicate = self
            .store
            .resource_exists_with_hash(&content_hash(&content))
            .await?;
        if duplicate {
            warn!("Page {} was already ingested; storing a duplicate", page.url);
        }

        let resource = self.store.insert_resource(&content).await?;
        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| EmbeddedChunk { content, embedding })
            .collect();
        let chunk_count = self.store.insert_chunks(&resource.id, &embedded).await?;

        Ok(IngestedPage {
            resource,
            chunk_count,
            duplicate,
        })
    }

    /// Ingest pages concurrently, collecting per-page failures
    pub async fn ingest_pages(&self, pages: Vec<Page>, concurrency: usize) -> IngestStats {
        let mut stats = IngestStats {
            pages_total: pages.len(),
            ..IngestStats::default()
        };

        let results: Vec<(String, Result<IngestedPage>)> = stream::iter(pages)
            .map(|page| async move {
                let result = self.ingest(&page).await;
                (page.url, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (url, result) in results {
            match result {
                Ok(ingested) => {
                    stats.resources_created += 1;
                    stats.chunks_created += ingested.chunk_count;
                    if ingested.duplicate {
                        stats.duplicates += 1;
                    }
                }
                Err(e) => {
                    warn!("Failed to ingest {}: {}", url, e);
                    stats.failures.push(IngestFailure {
                        url,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Ingested {}/{} pages ({} chunks, {} duplicates, {} failures)",
            stats.resources_created,
            stats.pages_total,
            stats.chunks_created,
            stats.duplicates,
            stats.failures.len()
        );
        stats
    }

    /// Build pages from a loaded manifest and ingest them
    pub async fn ingest_manifest(
        &self,
        sources: &ManifestSources,
        graph_name: &str,
        concurrency: usize,
    ) -> IngestStats {
        let build = manifest::build(
            &sources.manifest.operations,
            &sources.router_listen_host,
            graph_name,
        );
        let mut stats = self.ingest_pages(build.pages, concurrency).await;
        stats.pages_total += build.skipped.len();
        stats.skipped = build.skipped;
        stats
    }

    /// Chunks most similar to `query`, best first
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<Retrieved>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        self.check_profile(false).await?;
        let embedding = self.embedder.embed_one(&normalize_query(query)).await?;
        let results = self
            .store
            .select_by_similarity(&embedding, min_similarity, top_k)
            .await?;

        debug!(
            "Retrieved {} chunks above {} for query",
            results.len(),
            min_similarity
        );
        Ok(results)
    }

    /// Retrieve context for `question` and render it into a prompt
    pub async fn query_prompt(
        &self,
        question: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<QueryPrompt> {
        let retrieved = self.retrieve(question, top_k, min_similarity).await?;
        Ok(render_prompt(question, &retrieved))
    }
}
