//! Question-to-context retrieval

use std::sync::Arc;

use docchat_core::Result;
use docchat_vector::{EmbeddingClient, QueryMatch, VectorStore};

/// Separator placed between retrieved passages
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Embeds a question and fetches the nearest passages from one collection
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    collection: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Nearest passages for `question`, nearest first
    pub async fn retrieve_matches(&self, question: &str) -> Result<Vec<QueryMatch>> {
        let vector = self.embedder.embed(question).await?;
        let matches = self
            .store
            .query(&self.collection, &vector, self.top_k)
            .await?;

        tracing::debug!(
            "Retrieved {} passages from '{}' (top_k={})",
            matches.len(),
            self.collection,
            self.top_k
        );
        for m in &matches {
            tracing::trace!("  {} distance={:.4}", m.id, m.distance);
        }

        Ok(matches)
    }

    /// Context string for `question`; empty when the collection has no records
    pub async fn retrieve(&self, question: &str) -> Result<String> {
        let matches = self.retrieve_matches(question).await?;
        Ok(join_context(&matches))
    }
}

/// Join passage texts in rank order
pub fn join_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, text: &str, distance: f32) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            text: text.to_string(),
            distance,
        }
    }

    #[test]
    fn test_join_context() {
        let matches = vec![hit("doc-3", "alpha", 0.1), hit("doc-0", "beta", 0.4)];
        assert_eq!(join_context(&matches), "alpha\n\n---\n\nbeta");
    }

    #[test]
    fn test_join_single_and_empty() {
        assert_eq!(join_context(&[hit("doc-0", "only", 0.0)]), "only");
        assert_eq!(join_context(&[]), "");
    }
}
