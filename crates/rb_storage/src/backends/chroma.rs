use async_trait::async_trait;
use chromadb::v1::{
    client::{ChromaClient, ChromaClientOptions},
    collection::{ChromaCollection, CollectionEntries, QueryOptions},
};
use rb_core::config::VectorDbConfig;
use rb_core::{Document, Error, MetadataFilter, Result, ScoredDocument, VectorStore};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::StorageBackend;

pub struct ChromaStore {
    client: Arc<ChromaClient>,
    collection_name: String,
}

impl ChromaStore {
    pub fn new(url: &str, collection_name: String) -> Self {
        let client = Arc::new(ChromaClient::new(ChromaClientOptions { url: url.to_string() }));
        Self {
            client,
            collection_name,
        }
    }

    fn collection(&self) -> Result<ChromaCollection> {
        self.client
            .get_or_create_collection(&self.collection_name, None)
            .map_err(Error::External)
    }

    pub fn add_documents(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<usize> {
        if documents.len() != embeddings.len() {
            return Err(Error::Storage(format!(
                "Got {} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let collection = self.collection()?;
        let mut metadatas = Vec::with_capacity(documents.len());
        for document in documents {
            let mut metadata = document.metadata.clone();
            metadata.insert("doc".to_string(), Value::String(serde_json::to_string(document)?));
            metadatas.push(metadata);
        }

        let entries = CollectionEntries {
            ids: documents.iter().map(|d| d.id.as_str()).collect(),
            embeddings: Some(embeddings.to_vec()),
            metadatas: Some(metadatas),
            documents: Some(documents.iter().map(|d| d.text.as_str()).collect()),
        };

        collection.upsert(entries, None).map_err(Error::External)?;
        Ok(documents.len())
    }

    pub fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        let collection = self.collection()?;

        let query_options = QueryOptions {
            query_embeddings: Some(vec![embedding.to_vec()]),
            query_texts: None,
            n_results: Some(limit),
            where_document: None,
            where_metadata: filter.and_then(where_clause),
            include: None,
        };

        let results = collection.query(query_options, None).map_err(Error::External)?;

        let mut documents = Vec::new();
        if let Some(metadatas) = results.metadatas {
            for metadata_vec in metadatas.into_iter().flatten() {
                for metadata in metadata_vec.into_iter().flatten() {
                    if let Some(doc_str) = metadata.get("doc").and_then(|v| v.as_str()) {
                        match serde_json::from_str::<Document>(doc_str) {
                            Ok(document) => documents.push(ScoredDocument { document, score: None }),
                            Err(e) => tracing::warn!("Skipping undecodable Chroma entry: {}", e),
                        }
                    }
                }
            }
        }

        Ok(documents)
    }

    pub fn count(&self) -> Result<usize> {
        self.collection()?.count().map_err(Error::External)
    }
}

/// Chroma accepts a bare `{key: value}` for a single condition and needs
/// `$and` to combine several.
fn where_clause(filter: &MetadataFilter) -> Option<Value> {
    let clauses: Vec<Value> = filter
        .conditions()
        .map(|(key, value)| {
            let mut clause = Map::new();
            clause.insert(key.clone(), value.clone());
            Value::Object(clause)
        })
        .collect();

    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => {
            let mut and = Map::new();
            and.insert("$and".to_string(), Value::Array(clauses));
            Some(Value::Object(and))
        }
    }
}

pub struct ChromaStorage {
    store: Arc<RwLock<ChromaStore>>,
}

impl ChromaStorage {
    pub fn new(config: &VectorDbConfig) -> Self {
        let store = ChromaStore::new(&config.url, config.collection_name.clone());
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }
}

#[async_trait]
impl StorageBackend for ChromaStorage {
    fn get_error_message() -> &'static str {
        "ChromaDB should be running on http://localhost:8000"
    }

    async fn connect(config: &VectorDbConfig) -> Result<Self> {
        let storage = Self::new(config);
        // Fail early when the server is unreachable.
        storage.store.read().await.collection()?;
        Ok(storage)
    }
}

#[async_trait]
impl VectorStore for ChromaStorage {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn add_documents(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<usize> {
        let store = self.store.read().await;
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
        store.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_clause() {
        assert_eq!(where_clause(&MetadataFilter::new()), None);
        assert_eq!(
            where_clause(&MetadataFilter::article("a")),
            Some(json!({"article_id": "a"}))
        );
        assert_eq!(
            where_clause(&MetadataFilter::article("a").with("page", 2)),
            Some(json!({"$and": [{"article_id": "a"}, {"page": 2}]}))
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Chroma server"]
    async fn test_chroma_storage() {
        let storage = ChromaStorage::connect(&VectorDbConfig::default()).await.unwrap();
        let document = Document::new("test:0", "A test paragraph about politics.")
            .with_metadata("article_id", "test");
        storage.add_documents(&[document], &[vec![0.5; 8]]).await.unwrap();
        let similar = storage.similarity_search(&[0.5; 8], 1, None).await.unwrap();
        assert!(!similar.is_empty());
    }
}
