//! File-backed vector store
//!
//! Collections live in memory behind a `tokio::sync::RwLock` and are written
//! to `<directory>/<collection>.json` after every change. Files are replaced
//! through a rename, so a failed write leaves the previous file intact.
//!
//! Author: hephaex@gmail.com

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docchat_core::{DistanceMetric, DocChatError, Result, StoreConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{distance, QueryMatch, VectorStore};

/// A persisted (id, vector, text) triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
}

/// On-disk collection layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Collection {
    name: String,
    metric: DistanceMetric,
    dimension: Option<usize>,
    created_at: DateTime<Utc>,
    records: Vec<VectorRecord>,
}

impl Collection {
    fn new(name: &str, metric: DistanceMetric) -> Self {
        Self {
            name: name.to_string(),
            metric,
            dimension: None,
            created_at: Utc::now(),
            records: Vec::new(),
        }
    }
}

/// Vector store persisting each collection as a JSON file
pub struct LocalVectorStore {
    directory: Option<PathBuf>,
    metric: DistanceMetric,
    collections: RwLock<HashMap<String, Collection>>,
}

impl LocalVectorStore {
    /// Open a store rooted at `directory`, creating the directory if missing
    pub async fn open(directory: impl Into<PathBuf>, metric: DistanceMetric) -> Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            DocChatError::StoreError(format!(
                "Failed to create store directory {}: {e}",
                directory.display()
            ))
        })?;

        Ok(Self {
            directory: Some(directory),
            metric,
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Create from config
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::open(&config.directory, config.distance).await
    }

    /// A store that keeps collections in memory only
    pub fn ephemeral(metric: DistanceMetric) -> Self {
        Self {
            directory: None,
            metric,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Store directory, if persistent
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn collection_path(&self, name: &str) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join(format!("{name}.json")))
    }

    async fn load(&self, name: &str) -> Result<Option<Collection>> {
        let Some(path) = self.collection_path(name) else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DocChatError::StoreError(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let collection: Collection = serde_json::from_slice(&bytes).map_err(|e| {
            DocChatError::StoreError(format!("Corrupt collection file {}: {e}", path.display()))
        })?;
        Ok(Some(collection))
    }

    async fn persist(&self, collection: &Collection) -> Result<()> {
        let Some(path) = self.collection_path(&collection.name) else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec(collection)
            .map_err(|e| DocChatError::StoreError(format!("Failed to encode collection: {e}")))?;

        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            DocChatError::StoreError(format!("Failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            DocChatError::StoreError(format!("Failed to replace {}: {e}", path.display()))
        })?;

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(DocChatError::ValidationError(format!(
            "invalid collection name '{name}': use letters, digits, '_' or '-'"
        )))
    }
}

fn missing(name: &str) -> DocChatError {
    DocChatError::StoreError(format!("collection '{name}' does not exist"))
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<()> {
        validate_name(name)?;

        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(());
        }

        let collection = match self.load(name).await? {
            Some(existing) => {
                tracing::debug!(
                    "Loaded collection '{name}' with {} records",
                    existing.records.len()
                );
                existing
            }
            None => {
                let created = Collection::new(name, self.metric);
                self.persist(&created).await?;
                tracing::info!("Created collection '{name}' ({:?})", self.metric);
                created
            }
        };

        collections.insert(name.to_string(), collection);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;

        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(true);
        }

        match self.load(name).await? {
            Some(existing) => {
                collections.insert(name.to_string(), existing);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.records.len())
            .ok_or_else(|| missing(collection))
    }

    async fn add(
        &self,
        collection: &str,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
    ) -> Result<()> {
        if ids.len() != vectors.len() || ids.len() != texts.len() {
            return Err(DocChatError::ValidationError(format!(
                "add requires equal lengths: {} ids, {} vectors, {} texts",
                ids.len(),
                vectors.len(),
                texts.len()
            )));
        }
        if ids.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        let dimension = store.dimension.unwrap_or(vectors[0].len());
        if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            return Err(DocChatError::ValidationError(format!(
                "all vectors in collection '{collection}' must have dimension {dimension}"
            )));
        }

        let mut seen: HashSet<&str> = store.records.iter().map(|r| r.id.as_str()).collect();
        let conflicts: Vec<String> = ids
            .iter()
            .filter(|id| !seen.insert(id.as_str()))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(DocChatError::WriteConflict {
                collection: collection.to_string(),
                ids: conflicts,
            });
        }

        let previous_len = store.records.len();
        let previous_dimension = store.dimension;
        store.dimension = Some(dimension);
        store.records.extend(
            ids.iter()
                .zip(vectors)
                .zip(texts)
                .map(|((id, vector), text)| VectorRecord {
                    id: id.clone(),
                    vector: vector.clone(),
                    text: text.clone(),
                }),
        );

        if let Err(e) = self.persist(store).await {
            store.records.truncate(previous_len);
            store.dimension = previous_dimension;
            return Err(e);
        }

        tracing::debug!(
            "Added {} records to '{collection}' ({} total)",
            ids.len(),
            store.records.len()
        );
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;

        if let Some(dimension) = store.dimension {
            if vector.len() != dimension {
                return Err(DocChatError::ValidationError(format!(
                    "query vector has dimension {}, collection '{collection}' expects {dimension}",
                    vector.len()
                )));
            }
        }

        let mut matches: Vec<QueryMatch> = store
            .records
            .iter()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                text: record.text.clone(),
                distance: distance(store.metric, &record.vector, vector),
            })
            .collect();

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(k);
        Ok(matches)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        validate_name(collection)?;
        self.collections.write().await.remove(collection);

        if let Some(path) = self.collection_path(collection) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(DocChatError::StoreError(format!(
                        "Failed to remove {}: {e}",
                        path.display()
                    )))
                }
            }
        }

        tracing::info!("Deleted collection '{collection}'");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn seeded(store: &LocalVectorStore) {
        store.get_or_create_collection("docs").await.unwrap();
        store
            .add(
                "docs",
                &strings(&["doc-0", "doc-1", "doc-2"]),
                &[vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]],
                &strings(&["origin", "near", "far"]),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exists_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path(), DistanceMetric::L2)
            .await
            .unwrap();

        assert!(!store.collection_exists("docs").await.unwrap());
        assert!(!dir.path().join("docs.json").exists());
        assert!(store.count("docs").await.is_err());

        seeded(&store).await;
        assert!(store.collection_exists("docs").await.unwrap());

        let reopened = LocalVectorStore::open(dir.path(), DistanceMetric::L2)
            .await
            .unwrap();
        assert!(reopened.collection_exists("docs").await.unwrap());
        assert_eq!(reopened.count("docs").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        store.get_or_create_collection("docs").await.unwrap();
        store.get_or_create_collection("docs").await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_ranked_nearest_first() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        seeded(&store).await;

        let matches = store.query("docs", &[0.9, 0.1], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].text, "near");
        assert_eq!(matches[1].text, "origin");
        assert!(matches[0].distance <= matches[1].distance);
    }

    #[tokio::test]
    async fn test_query_returns_all_when_fewer_than_k() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        seeded(&store).await;

        let matches = store.query("docs", &[5.0, 5.0], 10).await.unwrap();
        let texts: Vec<_> = matches.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["far", "near", "origin"]);
    }

    #[tokio::test]
    async fn test_query_empty_collection() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        store.get_or_create_collection("docs").await.unwrap();
        assert!(store.query("docs", &[1.0, 2.0], 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ids_conflict() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        seeded(&store).await;

        let err = store
            .add(
                "docs",
                &strings(&["doc-3", "doc-1"]),
                &[vec![2.0, 2.0], vec![3.0, 3.0]],
                &strings(&["new", "dup"]),
            )
            .await
            .unwrap_err();

        match err {
            DocChatError::WriteConflict { ids, .. } => assert_eq!(ids, vec!["doc-1"]),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.count("docs").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_ids_within_batch() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        store.get_or_create_collection("docs").await.unwrap();

        let err = store
            .add(
                "docs",
                &strings(&["doc-0", "doc-0"]),
                &[vec![1.0], vec![2.0]],
                &strings(&["a", "b"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocChatError::WriteConflict { .. }));
        assert_eq!(store.count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_lengths_rejected() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        store.get_or_create_collection("docs").await.unwrap();

        let err = store
            .add("docs", &strings(&["doc-0"]), &[], &strings(&["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DocChatError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        seeded(&store).await;

        let err = store
            .add("docs", &strings(&["doc-9"]), &[vec![1.0, 2.0, 3.0]], &strings(&["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DocChatError::ValidationError(_)));

        let err = store.query("docs", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, DocChatError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        assert!(matches!(
            store.count("nope").await,
            Err(DocChatError::StoreError(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_collection_name() {
        let store = LocalVectorStore::ephemeral(DistanceMetric::L2);
        assert!(matches!(
            store.get_or_create_collection("../escape").await,
            Err(DocChatError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");

        {
            let store = LocalVectorStore::open(&root, DistanceMetric::L2).await.unwrap();
            seeded(&store).await;
        }

        assert!(root.join("docs.json").is_file());
        assert!(!root.join("docs.json.tmp").exists());

        let reopened = LocalVectorStore::open(&root, DistanceMetric::Cosine).await.unwrap();
        reopened.get_or_create_collection("docs").await.unwrap();
        assert_eq!(reopened.count("docs").await.unwrap(), 3);

        // The metric recorded at creation time wins over the store default
        let matches = reopened.query("docs", &[0.9, 0.1], 1).await.unwrap();
        assert_eq!(matches[0].text, "near");
        assert!((matches[0].distance - 0.02).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_collection_persisted_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path(), DistanceMetric::L2).await.unwrap();
        store.get_or_create_collection("docs").await.unwrap();
        assert!(dir.path().join("docs.json").is_file());
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path(), DistanceMetric::L2).await.unwrap();
        seeded(&store).await;

        store.delete_collection("docs").await.unwrap();
        assert!(!dir.path().join("docs.json").exists());
        assert!(store.count("docs").await.is_err());

        store.get_or_create_collection("docs").await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 0);
    }
}
