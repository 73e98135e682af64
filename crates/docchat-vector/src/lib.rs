//! docchat Vector - Embeddings and vector storage
//!
//! Provides the embedding client abstraction (OpenAI) and a vector store
//! abstraction with a file-backed implementation for storing and
//! searching document chunk embeddings.

use async_trait::async_trait;
use docchat_core::Result;
use serde::{Deserialize, Serialize};

pub use docchat_core::DistanceMetric;

pub mod embedding;
pub mod local_store;

pub use embedding::{EmbeddingClient, OpenAiEmbedding};
pub use local_store::LocalVectorStore;

/// A query hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record identifier
    pub id: String,

    /// Stored chunk text
    pub text: String,

    /// Distance to the query vector (smaller is closer)
    pub distance: f32,
}

/// Trait for vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open a collection, creating it if it does not exist
    async fn get_or_create_collection(&self, name: &str) -> Result<()>;

    /// Whether a collection exists; never creates one
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Number of records in a collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Add records; `ids`, `vectors` and `texts` must have equal lengths and
    /// no id may already exist in the collection
    async fn add(
        &self,
        collection: &str,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
    ) -> Result<()>;

    /// Up to `k` records nearest to `vector`, nearest first
    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>>;

    /// Remove a collection and all its records
    async fn delete_collection(&self, collection: &str) -> Result<()>;
}

/// Distance between two vectors under `metric`
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        DistanceMetric::InnerProduct => 1.0 - dot(a, b),
        DistanceMetric::Cosine => {
            let norm_a = dot(a, a).sqrt();
            let norm_b = dot(b, b).sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return 1.0;
            }
            1.0 - dot(a, b) / (norm_a * norm_b)
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
