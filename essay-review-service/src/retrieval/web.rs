use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{Embedder, Retriever, Snippet};
use crate::{
    error::RetrievalError,
    llm::{ChatMessage, ChatModel},
    stages::display_label,
    state::StageKind,
};

const INSTANT_ANSWER_URL: &str = "https://api.duckduckgo.com/";
const MAX_KEYWORDS: usize = 3;
const MAX_RESULTS_PER_KEYWORD: usize = 5;

const KEYWORD_SYSTEM_PROMPT: &str = "You are an essay verification specialist. \
Extract the key facts and topics in the given content that need to be verified.";

/// Retrieval over public web search results, ranked by embedding similarity.
///
/// The chat model first turns the essay text into a few search keywords; every hit for
/// those keywords becomes a candidate document, and the `k` candidates closest to the query
/// are returned.
pub struct WebRetriever {
    http: reqwest::Client,
    model: Arc<dyn ChatModel>,
    embedder: Embedder,
    endpoint: String,
}

impl WebRetriever {
    pub fn new(model: Arc<dyn ChatModel>, embedder: Embedder) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("essay-review-service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            model,
            embedder,
            endpoint: INSTANT_ANSWER_URL.to_string(),
        })
    }

    async fn try_search(
        &self,
        content: &str,
        role: StageKind,
        query: &str,
        k: usize,
    ) -> Result<Vec<Snippet>, RetrievalError> {
        let keywords = match self.extract_keywords(content, role).await {
            Ok(keywords) if !keywords.is_empty() => keywords,
            Ok(_) => vec![query.to_string()],
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, searching with the query");
                vec![query.to_string()]
            }
        };
        info!(role = %role, keywords = ?keywords, "Searching the web");

        let mut documents = Vec::new();
        for keyword in &keywords {
            match self.search_keyword(keyword).await {
                Ok(hits) => documents.extend(hits),
                Err(e) => warn!(keyword = %keyword, error = %e, "Web search failed"),
            }
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = documents
            .into_iter()
            .map(|snippet| (snippet.content.clone(), snippet))
            .collect();
        self.embedder.rank(query, candidates, k).await
    }

    async fn extract_keywords(
        &self,
        content: &str,
        role: StageKind,
    ) -> Result<Vec<String>, RetrievalError> {
        let prompt = format!(
            "Extract {MAX_KEYWORDS} key keywords or topics needed to analyse the following \
essay from the perspective of a {perspective}.\n\nContent:\n{content}\n\n\
List the keywords separated by commas.",
            perspective = display_label(role).to_lowercase(),
        );

        let response = self
            .model
            .invoke(&[
                ChatMessage::system(KEYWORD_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ])
            .await
            .map_err(RetrievalError::Keywords)?;

        Ok(parse_keywords(&response))
    }

    async fn search_keyword(&self, keyword: &str) -> Result<Vec<Snippet>, RetrievalError> {
        let body = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", keyword),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        // The endpoint answers with a javascript content type, so decode by hand.
        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Unreadable search response");
                return Ok(Vec::new());
            }
        };
        Ok(parse_instant_answer(&value, keyword, MAX_RESULTS_PER_KEYWORD))
    }
}

#[async_trait]
impl Retriever for WebRetriever {
    async fn search(&self, content: &str, role: StageKind, query: &str, k: usize) -> Vec<Snippet> {
        match self.try_search(content, role, query, k).await {
            Ok(snippets) => {
                info!(role = %role, results = snippets.len(), "Retrieval completed");
                snippets
            }
            Err(e) => {
                warn!(role = %role, error = %e, "Retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }
}

pub(crate) fn parse_keywords(response: &str) -> Vec<String> {
    response
        .split([',', '\n'])
        .map(|k| k.trim().trim_matches(|c: char| c == '-' || c == '*' || c == '"').trim())
        .filter(|k| !k.is_empty())
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Turn an Instant Answer payload into snippets: the abstract first, then related topics
pub(crate) fn parse_instant_answer(value: &Value, query: &str, max_results: usize) -> Vec<Snippet> {
    let mut snippets = Vec::new();
    let heading = value["Heading"].as_str().unwrap_or_default();

    if let Some(text) = value["AbstractText"].as_str().filter(|t| !t.is_empty()) {
        snippets.push(Snippet {
            content: text.to_string(),
            source: value["AbstractURL"]
                .as_str()
                .unwrap_or("Unknown")
                .to_string(),
            topic: heading.to_string(),
            query: query.to_string(),
        });
    }

    let mut pending: Vec<&Value> = value["RelatedTopics"]
        .as_array()
        .map(|topics| topics.iter().collect())
        .unwrap_or_default();
    pending.reverse();

    while let Some(topic) = pending.pop() {
        if snippets.len() >= max_results {
            break;
        }
        // Grouped topics nest their entries one level down
        if let Some(children) = topic["Topics"].as_array() {
            pending.extend(children.iter().rev());
            continue;
        }
        let Some(text) = topic["Text"].as_str().filter(|t| !t.is_empty()) else {
            continue;
        };
        snippets.push(Snippet {
            content: text.to_string(),
            source: topic["FirstURL"].as_str().unwrap_or("Unknown").to_string(),
            topic: if heading.is_empty() {
                query.to_string()
            } else {
                heading.to_string()
            },
            query: query.to_string(),
        });
    }

    snippets.truncate(max_results);
    snippets
}
