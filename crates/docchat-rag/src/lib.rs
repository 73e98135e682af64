//! docchat RAG - Retrieval-Augmented Generation over one document
//!
//! This crate wires the pipeline together:
//! - Build-or-load of the document's vector collection
//! - Retrieval of the nearest passages for a question
//! - Answer generation with a hosted chat completion model
//!
//! Author: hephaex@gmail.com

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use docchat_core::{AppConfig, ChunkingConfig, DocChatError, LlmClient, Result};
use docchat_parser::{chunk_ids, chunk_text, DocumentParser, ParserRegistry};
use docchat_vector::{EmbeddingClient, LocalVectorStore, OpenAiEmbedding, QueryMatch, VectorStore};
use serde::Serialize;
use tokio::sync::Mutex;

pub mod generator;
pub mod llm;
pub mod retriever;

pub use generator::{AnswerGenerator, PromptBuilder, DEFAULT_SYSTEM_PROMPT};
pub use llm::{create_llm_client, AzureOpenAiClient, OpenAiChatClient};
pub use retriever::{join_context, Retriever, CONTEXT_SEPARATOR};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Lifecycle of the document collection within this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Not yet checked, or the last build failed
    Empty,
    /// Parsing, embedding and writing records
    Populating,
    /// Collection holds the document's records
    Ready,
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Populating => write!(f, "populating"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Result of a build-or-load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Records in the collection afterwards
    pub records: usize,

    /// Whether the document was parsed and embedded by this call
    pub built: bool,
}

/// Collection status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStatus {
    pub collection: String,
    pub records: usize,
    pub state: BuildState,
}

/// An answer together with the passages it was generated from
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    /// Model answer, trimmed
    pub answer: String,

    /// Retrieved passages, nearest first
    pub passages: Vec<QueryMatch>,

    /// Wall time for retrieval and generation
    pub processing_time_ms: u64,
}

/// Embedded chunks ready to be written
struct PreparedRecords {
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    texts: Vec<String>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Question answering over the configured document
pub struct DocChat {
    document: PathBuf,
    collection: String,
    chunking: ChunkingConfig,
    parser: Arc<dyn DocumentParser>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    generator: AnswerGenerator,
    state: Mutex<BuildState>,
}

impl DocChat {
    /// Assemble a pipeline from explicit components.
    ///
    /// The configuration is validated before anything else, so a missing
    /// credential fails here without any component being used.
    pub fn new(
        config: &AppConfig,
        parser: Arc<dyn DocumentParser>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self> {
        config.validate()?;

        let collection = config.store.collection.clone();
        let retriever = Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            collection.clone(),
            config.retrieval.top_k,
        );

        let mut generator = AnswerGenerator::new(llm);
        if let Some(prompt) = &config.completion.system_prompt {
            generator = generator.with_system_prompt(prompt.as_str());
        }

        Ok(Self {
            document: config.document.path.clone(),
            collection,
            chunking: config.chunking,
            parser,
            embedder,
            store,
            retriever,
            generator,
            state: Mutex::new(BuildState::Empty),
        })
    }

    /// Build the provider clients and the file-backed store from config
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let embedder = OpenAiEmbedding::from_config(&config.embedding, &config.retry)?;
        let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(config)?);
        let store = LocalVectorStore::from_config(&config.store).await?;

        tracing::info!(
            "Pipeline configured: embeddings={}, completion={}, store={}",
            embedder.model(),
            llm.name(),
            config.store.directory.display()
        );

        Self::new(
            config,
            Arc::new(ParserRegistry::with_defaults()),
            Arc::new(embedder),
            Arc::new(store),
            llm,
        )
    }

    /// Collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Current build state
    pub async fn state(&self) -> BuildState {
        *self.state.lock().await
    }

    /// Make sure the collection holds the document, building it on first use.
    ///
    /// An existing non-empty collection is reused without reading the
    /// document. On failure the state returns to `Empty`.
    pub async fn ensure_ready(&self) -> Result<BuildReport> {
        let mut state = self.state.lock().await;

        if *state == BuildState::Ready {
            let records = self.store.count(&self.collection).await?;
            return Ok(BuildReport {
                records,
                built: false,
            });
        }

        self.store.get_or_create_collection(&self.collection).await?;
        let existing = self.store.count(&self.collection).await?;
        if existing > 0 {
            tracing::info!(
                "Loaded collection '{}' with {} records",
                self.collection,
                existing
            );
            *state = BuildState::Ready;
            return Ok(BuildReport {
                records: existing,
                built: false,
            });
        }

        *state = BuildState::Populating;
        let result: Result<usize> = async {
            let records = self.prepare().await?;
            self.write(&records).await
        }
        .await;

        match result {
            Ok(records) => {
                *state = BuildState::Ready;
                Ok(BuildReport {
                    records,
                    built: true,
                })
            }
            Err(e) => {
                *state = BuildState::Empty;
                Err(e)
            }
        }
    }

    /// Build the collection again from the document.
    ///
    /// The new records are prepared before the old collection is dropped, so
    /// a parse or embedding failure leaves the existing records in place.
    pub async fn rebuild(&self) -> Result<BuildReport> {
        let mut state = self.state.lock().await;
        let previous = *state;

        tracing::info!("Rebuilding collection '{}'", self.collection);
        *state = BuildState::Populating;

        let records = match self.prepare().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    "Rebuild of '{}' failed, keeping existing records: {e}",
                    self.collection
                );
                *state = previous;
                return Err(e);
            }
        };

        let result: Result<usize> = async {
            self.store.delete_collection(&self.collection).await?;
            self.store.get_or_create_collection(&self.collection).await?;
            self.write(&records).await
        }
        .await;

        match result {
            Ok(records) => {
                *state = BuildState::Ready;
                Ok(BuildReport {
                    records,
                    built: true,
                })
            }
            Err(e) => {
                *state = BuildState::Empty;
                Err(e)
            }
        }
    }

    /// Parse, chunk and embed the document without touching the store
    async fn prepare(&self) -> Result<PreparedRecords> {
        tracing::info!(
            "Preparing records for '{}' from {}",
            self.collection,
            self.document.display()
        );

        let parser = Arc::clone(&self.parser);
        let path = self.document.clone();
        let document = tokio::task::spawn_blocking(move || parser.parse(&path))
            .await
            .map_err(|e| DocChatError::Other(anyhow::anyhow!("Document parser task failed: {e}")))??;

        let chunks = chunk_text(&document.text(), &self.chunking)?;
        tracing::info!(
            "Parsed {} pages into {} chunks",
            document.page_count(),
            chunks.len()
        );

        if chunks.is_empty() {
            return Err(DocChatError::DocumentUnreadable {
                path: self.document.clone(),
                message: "no extractable text to index".to_string(),
            });
        }

        let ids = chunk_ids(&chunks);
        let texts: Vec<String> = chunks.into_iter().map(|c| c.content).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        if vectors.len() != texts.len() {
            return Err(DocChatError::EmbeddingError {
                status: None,
                message: format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                ),
            });
        }

        Ok(PreparedRecords {
            ids,
            vectors,
            texts,
        })
    }

    /// Write prepared records in a single `add`
    async fn write(&self, records: &PreparedRecords) -> Result<usize> {
        let start_time = Instant::now();
        self.store
            .add(
                &self.collection,
                &records.ids,
                &records.vectors,
                &records.texts,
            )
            .await?;

        tracing::info!(
            "Collection '{}' built with {} records in {}ms",
            self.collection,
            records.ids.len(),
            start_time.elapsed().as_millis()
        );
        Ok(records.ids.len())
    }

    /// Context for a question, passages joined by [`CONTEXT_SEPARATOR`]
    pub async fn retrieve(&self, question: &str) -> Result<String> {
        self.ensure_ready().await?;
        self.retriever.retrieve(question).await
    }

    /// Answer a question given an already retrieved context
    pub async fn answer(&self, question: &str, context: &str) -> Result<String> {
        self.generator.answer(question, context).await
    }

    /// Answer a question about the document
    pub async fn ask(&self, question: &str) -> Result<String> {
        Ok(self.ask_detailed(question).await?.answer)
    }

    /// Answer a question and return the passages used
    pub async fn ask_detailed(&self, question: &str) -> Result<AnswerResponse> {
        self.ensure_ready().await?;

        let start_time = Instant::now();
        tracing::info!("Question received: {} chars", question.len());

        let passages = self.retriever.retrieve_matches(question).await?;
        let context = join_context(&passages);
        let answer = self.generator.answer(question, &context).await?;

        Ok(AnswerResponse {
            answer,
            passages,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Collection name, record count and build state
    pub async fn status(&self) -> Result<CollectionStatus> {
        let state = *self.state.lock().await;
        let records = if self.store.collection_exists(&self.collection).await? {
            self.store.count(&self.collection).await?
        } else {
            0
        };

        Ok(CollectionStatus {
            collection: self.collection.clone(),
            records,
            state,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_display() {
        assert_eq!(BuildState::Empty.to_string(), "empty");
        assert_eq!(BuildState::Populating.to_string(), "populating");
        assert_eq!(BuildState::Ready.to_string(), "ready");
    }

    #[test]
    fn test_status_serialization() {
        let status = CollectionStatus {
            collection: "documents".to_string(),
            records: 12,
            state: BuildState::Ready,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["records"], 12);
    }
}
