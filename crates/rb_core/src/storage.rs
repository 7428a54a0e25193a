use async_trait::async_trait;
use crate::types::{Document, MetadataFilter, ScoredDocument};
use crate::Result;

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert documents with their embeddings, replacing any stored
    /// document that has the same id. Returns the number written.
    async fn add_documents(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Find the `limit` documents closest to `embedding`, best first
    async fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>>;

    /// Number of stored documents
    async fn count(&self) -> Result<usize>;

    /// Flush the store to durable storage, if it has any
    async fn persist(&self) -> Result<()> {
        Ok(())
    }
}
