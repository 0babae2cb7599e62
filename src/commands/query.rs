//! Query and prompt command implementation

use crate::config::Config;
use crate::error::Result;
use crate::knowledge::{KnowledgeBase, QueryPrompt};
use crate::store::Retrieved;
use serde::Serialize;
use tracing::info;

/// Query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Number of results to return
    pub top_k: Option<usize>,
    /// Similarity floor (exclusive)
    pub min_similarity: Option<f32>,
}

impl QueryOptions {
    fn resolve(&self, config: &Config) -> (usize, f32) {
        (
            self.top_k.unwrap_or(config.query.top_k),
            self.min_similarity.unwrap_or(config.query.min_similarity),
        )
    }
}

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<Retrieved>,
}

/// Retrieve the chunks most similar to `query`
pub async fn cmd_query(
    config: &Config,
    knowledge: &KnowledgeBase,
    query: &str,
    options: QueryOptions,
) -> Result<QueryResult> {
    info!("Querying: {}", query);
    let (top_k, min_similarity) = options.resolve(config);
    let results = knowledge.retrieve(query, top_k, min_similarity).await?;
    info!("Returning {} results", results.len());

    Ok(QueryResult {
        query: query.to_string(),
        results,
    })
}

/// Render the retrieval prompt for `question`
pub async fn cmd_prompt(
    config: &Config,
    knowledge: &KnowledgeBase,
    question: &str,
    options: QueryOptions,
) -> Result<QueryPrompt> {
    let (top_k, min_similarity) = options.resolve(config);
    knowledge.query_prompt(question, top_k, min_similarity).await
}

/// Print query results to console
pub fn print_query_results(result: &QueryResult) {
    println!("\n🔍 Query: {}\n", result.query);
    println!("Found {} results:\n", result.results.len());

    for (i, r) in result.results.iter().enumerate() {
        println!("{}. [similarity: {:.3}]", i + 1, r.similarity);

        let preview: String = r.content.chars().take(300).collect();
        let ellipsis = if preview.len() < r.content.len() { "..." } else { "" };
        println!("   {}{}\n", preview.trim().replace('\n', " "), ellipsis);
    }
}
