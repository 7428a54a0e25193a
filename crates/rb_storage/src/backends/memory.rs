use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rb_core::config::VectorDbConfig;
use rb_core::{cosine_similarity, Document, Error, MetadataFilter, Result, ScoredDocument, VectorStore};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::StorageBackend;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    document: Document,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    saved_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

pub struct MemoryStore {
    collection: String,
    entries: Vec<StoredEntry>,
    positions: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new(collection: String) -> Self {
        Self::with_entries(collection, Vec::new())
    }

    fn with_entries(collection: String, entries: Vec<StoredEntry>) -> Self {
        let mut store = Self {
            collection,
            entries: Vec::with_capacity(entries.len()),
            positions: HashMap::with_capacity(entries.len()),
        };
        for entry in entries {
            store.upsert(entry);
        }
        store
    }

    fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }

    fn upsert(&mut self, entry: StoredEntry) {
        match self.positions.get(&entry.document.id) {
            Some(&index) => self.entries[index] = entry,
            None => {
                self.positions.insert(entry.document.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// All-or-nothing: the batch is checked in full before anything is
    /// written.
    pub fn add_documents(&mut self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<usize> {
        if documents.len() != embeddings.len() {
            return Err(Error::Storage(format!(
                "Got {} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }

        let expected = self.dimension().or_else(|| embeddings.first().map(Vec::len));
        if let Some(dimension) = expected {
            if let Some((document, embedding)) = documents
                .iter()
                .zip(embeddings)
                .find(|(_, embedding)| embedding.len() != dimension)
            {
                return Err(Error::Storage(format!(
                    "Embedding for '{}' has {} dimensions, collection '{}' uses {}",
                    document.id,
                    embedding.len(),
                    self.collection,
                    dimension
                )));
            }
        }

        for (document, embedding) in documents.iter().zip(embeddings) {
            self.upsert(StoredEntry {
                document: document.clone(),
                embedding: embedding.clone(),
            });
        }
        Ok(documents.len())
    }

    pub fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        if let Some(dimension) = self.dimension() {
            if embedding.len() != dimension {
                return Err(Error::Storage(format!(
                    "Query embedding has {} dimensions, collection '{}' uses {}",
                    embedding.len(),
                    self.collection,
                    dimension
                )));
            }
        }

        let mut scored: Vec<ScoredDocument> = self
            .entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.document.metadata)))
            .map(|e| ScoredDocument {
                document: e.document.clone(),
                score: Some(cosine_similarity(embedding, &e.embedding)),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Cosine-similarity store kept in memory, optionally mirrored to a JSON
/// snapshot so that separate runs can share an index.
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryStorage {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new(collection.into()))),
            snapshot_path: None,
        }
    }

    /// Opens `<persist_directory>/<collection>.json`, loading it when it
    /// exists. The file is only written by [`VectorStore::persist`].
    pub fn open(persist_directory: &Path, collection: &str) -> Result<Self> {
        let path = persist_directory.join(format!("{}.json", collection));
        let mut store = MemoryStore::new(collection.to_string());
        if path.is_file() {
            let raw = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&raw)
                .map_err(|e| Error::Storage(format!("Corrupt snapshot {}: {}", path.display(), e)))?;
            info!(
                "💾 Loaded {} documents from {} (saved {})",
                snapshot.entries.len(),
                path.display(),
                snapshot.saved_at.to_rfc3339()
            );
            store = MemoryStore::with_entries(collection.to_string(), snapshot.entries);
        }

        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(config: &VectorDbConfig) -> Result<Self> {
        Self::open(&config.persist_directory, &config.collection_name)
    }
}

#[async_trait]
impl VectorStore for InMemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn add_documents(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<usize> {
        let mut store = self.store.write().await;
        store.add_documents(documents, embeddings)
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        let store = self.store.read().await;
        store.similarity_search(embedding, limit, filter)
    }

    async fn count(&self) -> Result<usize> {
        let store = self.store.read().await;
        Ok(store.count())
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let store = self.store.read().await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = Snapshot {
            collection: store.collection.clone(),
            saved_at: Utc::now(),
            entries: store.entries.clone(),
        };
        fs::write(path, serde_json::to_string(&snapshot)?)?;
        debug!("Wrote {} documents to {}", snapshot.entries.len(), path.display());
        Ok(())
    }
}
