//! Context retrieval for stages.
//!
//! A [`Retriever`] never fails: adapter errors and empty searches both come back as an empty
//! list, so a missing source only makes a prompt thinner.

mod embedding;
mod web;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::StageKind;

pub use embedding::Embedder;
pub use web::WebRetriever;

/// One supporting document returned by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub content: String,
    pub source: String,
    pub topic: String,
    pub query: String,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` snippets relevant to `query`, gathered to check `content` from the
    /// perspective of `role`
    async fn search(&self, content: &str, role: StageKind, query: &str, k: usize)
    -> Vec<Snippet>;
}

/// Render snippets as a numbered context block, or an empty string when there are none
pub fn format_context(snippets: &[Snippet]) -> String {
    if snippets.is_empty() {
        return String::new();
    }

    let mut block = String::from("Reference material gathered for verification:\n\n");
    for (i, snippet) in snippets.iter().enumerate() {
        block.push_str(&format!(
            "[Reference {}]\nSource: {}\nTopic: {}\nContent: {}\n\n",
            i + 1,
            snippet.source,
            snippet.topic,
            snippet.content
        ));
    }
    block
}
