use rb_core::{AppConfig, Document, Error, InferenceModel, MetadataFilter, Result, VectorStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers "which paragraphs are closest to this query" against a store.
#[derive(Clone)]
pub struct ArticleRetriever {
    store: Arc<dyn VectorStore>,
    model: Arc<dyn InferenceModel>,
    default_k: usize,
    max_k: usize,
}

impl fmt::Debug for ArticleRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArticleRetriever")
            .field("store", &self.store.name())
            .field("model", &self.model.name())
            .field("default_k", &self.default_k)
            .field("max_k", &self.max_k)
            .finish()
    }
}

impl ArticleRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        model: Arc<dyn InferenceModel>,
        default_k: usize,
        max_k: usize,
    ) -> Self {
        let max_k = max_k.max(1);
        Self {
            store,
            model,
            default_k: default_k.clamp(1, max_k),
            max_k,
        }
    }

    pub fn from_config(
        store: Arc<dyn VectorStore>,
        model: Arc<dyn InferenceModel>,
        config: &AppConfig,
    ) -> Self {
        Self::new(store, model, config.retriever.default_k, config.retriever.max_k)
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn model(&self) -> &Arc<dyn InferenceModel> {
        &self.model
    }

    /// Returns at most `k` documents, best match first. `k` above the
    /// configured maximum is clamped to it.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        if k == 0 {
            return Err(Error::Retrieval("k must be at least 1".to_string()));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Retrieval("Query is empty".to_string()));
        }
        let k = if k > self.max_k {
            warn!("Requested k={} exceeds the maximum, using {}", k, self.max_k);
            self.max_k
        } else {
            k
        };

        let count = self.store.count().await.map_err(Error::into_retrieval)?;
        if count == 0 {
            return Err(Error::Retrieval(format!(
                "The {} vector store is empty, index some articles first",
                self.store.name()
            )));
        }

        let embedding = self
            .model
            .generate_embeddings(query)
            .await
            .map_err(Error::into_retrieval)?;
        let filter = filter.filter(|f| !f.is_empty());
        let results = self
            .store
            .similarity_search(&embedding, k, filter)
            .await
            .map_err(Error::into_retrieval)?;

        debug!("Retrieved {} of {} documents for '{}'", results.len(), count, query);
        Ok(results.into_iter().map(|scored| scored.document).collect())
    }

    pub async fn get_relevant_documents(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        self.retrieve(query, self.default_k, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStorage;
    use async_trait::async_trait;
    use rb_core::{ChatMessage, ScoredDocument};

    const TOPICS: [&str; 4] = ["graph", "protein", "galaxy", "market"];

    /// Embeds text as keyword counts over a fixed vocabulary.
    struct KeywordModel;

    #[async_trait]
    impl InferenceModel for KeywordModel {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>> {
            let text = text.to_lowercase();
            let mut embedding: Vec<f32> = TOPICS.iter().map(|t| text.matches(t).count() as f32).collect();
            embedding.push(0.1);
            Ok(embedding)
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(String::new())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn add_documents(&self, _documents: &[Document], _embeddings: &[Vec<f32>]) -> Result<usize> {
            Err(Error::Storage("connection refused".to_string()))
        }

        async fn similarity_search(
            &self,
            _embedding: &[f32],
            _limit: usize,
            _filter: Option<&MetadataFilter>,
        ) -> Result<Vec<ScoredDocument>> {
            Err(Error::Storage("connection refused".to_string()))
        }

        async fn count(&self) -> Result<usize> {
            Err(Error::Storage("connection refused".to_string()))
        }
    }

    async fn populated_retriever(max_k: usize) -> ArticleRetriever {
        let store = Arc::new(InMemoryStorage::new("articles"));
        let model = Arc::new(KeywordModel);
        let paragraphs = [
            ("a", "Every planar graph is four colourable."),
            ("a", "A graph with no cycles is a forest."),
            ("b", "The protein folds in milliseconds."),
            ("b", "A galaxy cluster bends light."),
            ("c", "The market closed higher on Friday."),
        ];

        let mut documents = Vec::new();
        let mut embeddings = Vec::new();
        for (position, (article, text)) in paragraphs.iter().enumerate() {
            documents.push(
                Document::new(format!("{}:{}", article, position), *text).with_metadata("article_id", *article),
            );
            embeddings.push(model.generate_embeddings(text).await.unwrap());
        }
        store.add_documents(&documents, &embeddings).await.unwrap();

        ArticleRetriever::new(store, model, 2, max_k)
    }

    #[tokio::test]
    async fn test_retrieve_returns_at_most_k_stored_documents() {
        let retriever = populated_retriever(50).await;
        let results = retriever.retrieve("graph theory", 3, None).await.unwrap();

        assert!(!results.is_empty());
        assert!(results.len() <= 3);
        assert!(results[0].text.contains("graph"));
        let ids = ["a:0", "a:1", "b:2", "b:3", "c:4"];
        assert!(results.iter().all(|d| ids.contains(&d.id.as_str())));
    }

    #[tokio::test]
    async fn test_default_k_and_clamping() {
        let retriever = populated_retriever(3).await;
        assert_eq!(retriever.get_relevant_documents("galaxy", None).await.unwrap().len(), 2);
        assert_eq!(retriever.retrieve("galaxy", 40, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_article_filter() {
        let retriever = populated_retriever(50).await;
        let filter = MetadataFilter::article("b");
        let results = retriever.retrieve("graph", 5, Some(&filter)).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|d| d.article_id() == Some("b")));
    }

    #[tokio::test]
    async fn test_invalid_requests_are_retrieval_errors() {
        let retriever = populated_retriever(50).await;
        assert!(matches!(retriever.retrieve("graph", 0, None).await, Err(Error::Retrieval(_))));
        assert!(matches!(retriever.retrieve("   ", 3, None).await, Err(Error::Retrieval(_))));
    }

    #[tokio::test]
    async fn test_empty_store_is_a_retrieval_error() {
        let retriever = ArticleRetriever::new(Arc::new(InMemoryStorage::new("empty")), Arc::new(KeywordModel), 5, 50);
        let err = retriever.retrieve("graph", 3, None).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_store_failures_become_retrieval_errors() {
        let retriever = ArticleRetriever::new(Arc::new(BrokenStore), Arc::new(KeywordModel), 5, 50);
        let err = retriever.get_relevant_documents("graph", None).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
