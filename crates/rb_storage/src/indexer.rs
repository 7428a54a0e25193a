use rb_core::{Document, InferenceModel, Result, VectorStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingReport {
    pub documents_indexed: usize,
    pub batches: usize,
}

impl fmt::Display for IndexingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} documents in {} batches", self.documents_indexed, self.batches)
    }
}

/// Embeds documents in fixed-size batches and writes them to a store.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    model: Arc<dyn InferenceModel>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(store: Arc<dyn VectorStore>, model: Arc<dyn InferenceModel>) -> Self {
        Self {
            store,
            model,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Consumes `documents` lazily, so only one batch is held in memory.
    /// The store is persisted once everything has been written.
    pub async fn index<I>(&self, documents: I) -> Result<IndexingReport>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut report = IndexingReport::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        for document in documents {
            batch.push(document);
            if batch.len() == self.batch_size {
                self.flush(&mut batch, &mut report).await?;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, &mut report).await?;
        }

        self.store.persist().await?;
        info!("✅ Indexed {} into {}", report, self.store.name());
        Ok(report)
    }

    async fn flush(&self, batch: &mut Vec<Document>, report: &mut IndexingReport) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.model.generate_embeddings_batch(&texts).await?;
        let written = self.store.add_documents(batch.as_slice(), &embeddings).await?;

        report.documents_indexed += written;
        report.batches += 1;
        debug!("Batch {}: wrote {} documents", report.batches, written);
        batch.clear();
        Ok(())
    }
}
