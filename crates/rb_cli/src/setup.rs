//! One-call environment setup for interactive sessions and the `rb` binary.
//!
//! [`Toolkit::setup`] reads `.env` and the process environment, starts
//! logging, reports configuration problems without failing, and wires the
//! model, vector store and retriever together.

use rb_core::logging::init_logging;
use rb_core::{AppConfig, InferenceModel, Result, VectorStore};
use rb_inference::{create_model, QaChain};
use rb_loader::{ArticleLoader, DocBankLoader, LoaderOptions};
use rb_storage::{create_store, ArticleRetriever, Indexer};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Loads configuration and starts logging. Validation problems are logged
/// and the defaults already substituted for them stay in effect.
pub fn prepare_config() -> Result<AppConfig> {
    let config = AppConfig::load();
    init_logging(&config.logging)?;

    let issues = config.validate();
    if !issues.is_empty() {
        for issue in &issues {
            warn!("{}", issue);
        }
        warn!("Configuration validation failed, proceeding with default values");
    }
    Ok(config)
}

pub struct Toolkit {
    pub config: AppConfig,
    pub model: Arc<dyn InferenceModel>,
    pub store: Arc<dyn VectorStore>,
    pub retriever: ArticleRetriever,
}

impl Toolkit {
    /// `storage` overrides the configured backend when given.
    pub async fn setup(storage: Option<&str>, model: &str) -> Result<Self> {
        let config = prepare_config()?;
        let backend = storage.unwrap_or(&config.vectordb.backend).to_string();
        Self::from_config(config, &backend, model).await
    }

    pub async fn from_config(config: AppConfig, storage: &str, model: &str) -> Result<Self> {
        let model = create_model(model, &config).await?;
        let store = create_store(storage, &config.vectordb).await?;
        let retriever = ArticleRetriever::from_config(store.clone(), model.clone(), &config);
        Ok(Self {
            config,
            model,
            store,
            retriever,
        })
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions::from_config(&self.config)
    }

    /// Loader over `dir`, or over the configured data directory.
    pub fn article_loader(&self, dir: Option<&Path>, recursive: bool) -> ArticleLoader {
        let dir = dir.unwrap_or(&self.config.data.json_data_dir);
        ArticleLoader::new(dir, self.loader_options().with_recursive(recursive))
    }

    pub fn docbank_corpus(&self, dir: Option<&Path>) -> Result<Vec<DocBankLoader>> {
        let dir = dir.unwrap_or(&self.config.data.json_data_dir);
        DocBankLoader::corpus(dir, &self.loader_options())
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.store.clone(), self.model.clone())
    }

    pub fn qa_chain(&self) -> QaChain {
        QaChain::new(self.retriever.clone())
    }

    pub fn status_lines(&self) -> Vec<String> {
        vec![
            format!("OpenAI API Key Loaded: {}", self.config.has_api_key()),
            format!("Inference model: {}", self.model.name()),
            format!("LLM Model Name: {}", self.config.model.chat_model),
            format!("Embeddings Model Name: {}", self.config.retriever.embedding_model),
            format!("Vector store: {}", self.store.name()),
            format!("Using persist directory: {}", self.config.vectordb.persist_directory.display()),
            format!("Using JSON data directory: {}", self.config.data.json_data_dir.display()),
            format!("Default retrieval k: {}", self.retriever.default_k()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_core::{Error, MetadataFilter};
    use rb_loader::DocumentLoader;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.vectordb.persist_directory = dir.path().join("chroma");
        config.data.json_data_dir = dir.path().join("articles");
        config.parser.min_paragraph_length = 10;
        config.retriever.default_k = 2;
        config
    }

    fn write_articles(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        let euler = json!({
            "id": "euler",
            "title": "Leonhard Euler",
            "paragraphs": [
                {"text": "Euler was born in Basel in 1707.", "section": "Life"},
                {"text": "Short.", "section": "Life"},
                {"text": "Euler introduced the notation f(x) for functions.", "section": "Work"}
            ]
        });
        let noether = json!({
            "id": "noether",
            "title": "Emmy Noether",
            "paragraphs": [
                {"text": "Noether linked symmetries and conservation laws.", "section": "Physics"}
            ]
        });
        fs::write(dir.join("euler.json"), euler.to_string()).unwrap();
        fs::write(dir.join("noether.json"), noether.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_status_lines() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = Toolkit::from_config(config_in(&dir), "memory", "dummy").await.unwrap();
        let lines = toolkit.status_lines();

        assert!(lines.contains(&"OpenAI API Key Loaded: false".to_string()));
        assert!(lines.contains(&"LLM Model Name: gpt-4o-mini".to_string()));
        assert!(lines.contains(&"Embeddings Model Name: text-embedding-3-small".to_string()));
        assert!(lines.contains(&"Default retrieval k: 2".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Using JSON data directory:") && l.ends_with("articles")));
    }

    #[tokio::test]
    async fn test_index_and_ask() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        write_articles(&config.data.json_data_dir);
        let toolkit = Toolkit::from_config(config, "memory", "dummy").await.unwrap();

        let err = toolkit.retriever.get_relevant_documents("Euler", None).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));

        let loader = toolkit.article_loader(None, false);
        let report = toolkit.indexer().index(loader.lazy_load().unwrap()).await.unwrap();
        assert_eq!(report.documents_indexed, 3);
        assert!(toolkit.config.vectordb.persist_directory.join("docbank_articles.json").is_file());

        let answer = toolkit.qa_chain().answer("Where was Euler born?", None).await.unwrap();
        assert_eq!(answer.sources[0].id, "euler:0");
        assert!(answer.text.contains("Basel"));

        let filter = MetadataFilter::article("noether");
        let documents = toolkit.retriever.retrieve("Euler", 5, Some(&filter)).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "noether:0");
    }

    #[tokio::test]
    async fn test_docbank_corpus_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let article = config.data.json_data_dir.join("paper");
        fs::create_dir_all(&article).unwrap();
        fs::write(
            article.join("paper_0.json"),
            json!([{"label": "paragraph", "text": "A paragraph long enough to keep."}]).to_string(),
        )
        .unwrap();

        let toolkit = Toolkit::from_config(config, "memory", "dummy").await.unwrap();
        let corpus = toolkit.docbank_corpus(None).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_openai_requires_key() {
        let dir = tempfile::tempdir().unwrap();
        let result = Toolkit::from_config(config_in(&dir), "memory", "openai").await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }
}
