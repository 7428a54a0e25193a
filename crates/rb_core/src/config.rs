//! Process-wide settings, built once from defaults plus environment
//! overrides and then passed to each component by reference.
//!
//! Bad values never abort start-up: unparsable overrides keep the default,
//! and [`AppConfig::sanitize`] swaps out-of-range values for defaults. Every
//! such fallback is logged and later reported by [`AppConfig::validate`].

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;
use url::Url;

use crate::Error;

pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "LOG_FILE";
pub const ENV_MIN_PARAGRAPH_LENGTH: &str = "MIN_PARAGRAPH_LENGTH";
pub const ENV_DEFAULT_K: &str = "DEFAULT_K";
pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_CHROMA_PERSIST_DIR: &str = "CHROMA_PERSIST_DIR";
pub const ENV_VECTOR_BACKEND: &str = "VECTOR_BACKEND";
pub const ENV_CHROMA_URL: &str = "CHROMA_URL";
pub const ENV_JSON_DATA_DIR: &str = "JSON_DATA_DIR";
pub const ENV_MAX_ARTICLES: &str = "MAX_ARTICLES";

const LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "CRITICAL"];
const BACKENDS: &[&str] = &["memory", "chroma"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParserConfig {
    pub min_paragraph_length: usize,
    pub ignored_labels: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_paragraph_length: 20,
            ignored_labels: vec!["equation".to_string(), "figure".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrieverConfig {
    pub default_k: usize,
    pub max_k: usize,
    pub embedding_model: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 50,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    pub chat_model: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("chat_model", &self.chat_model)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorDbConfig {
    pub backend: String,
    pub persist_directory: PathBuf,
    pub collection_name: String,
    pub url: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            persist_directory: PathBuf::from("docs/chroma/"),
            collection_name: "docbank_articles".to_string(),
            url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataConfig {
    pub json_data_dir: PathBuf,
    pub max_articles: Option<usize>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            json_data_dir: PathBuf::from("../dataset_doc/train"),
            max_articles: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub parser: ParserConfig,
    pub retriever: RetrieverConfig,
    pub model: ModelConfig,
    pub vectordb: VectorDbConfig,
    pub data: DataConfig,
    #[serde(skip)]
    load_issues: Vec<String>,
}

impl AppConfig {
    /// Reads a `.env` file if one is found, then the process environment,
    /// and replaces invalid values with defaults.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env().sanitize()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key/value source. Empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
        if let Some(file) = get(ENV_LOG_FILE) {
            config.logging.file_path = Some(PathBuf::from(file));
        }
        if let Some(raw) = get(ENV_MIN_PARAGRAPH_LENGTH) {
            if let Some(value) = config.parse_number(ENV_MIN_PARAGRAPH_LENGTH, &raw) {
                config.parser.min_paragraph_length = value;
            }
        }
        if let Some(raw) = get(ENV_DEFAULT_K) {
            if let Some(value) = config.parse_number(ENV_DEFAULT_K, &raw) {
                config.retriever.default_k = value;
            }
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            config.retriever.embedding_model = model;
        }
        if let Some(model) = get(ENV_LLM_MODEL) {
            config.model.chat_model = model;
        }
        config.model.api_key = get(ENV_OPENAI_API_KEY);
        if let Some(url) = get(ENV_OPENAI_BASE_URL) {
            config.model.base_url = url;
        }
        if let Some(dir) = get(ENV_CHROMA_PERSIST_DIR) {
            config.vectordb.persist_directory = PathBuf::from(dir);
        }
        if let Some(backend) = get(ENV_VECTOR_BACKEND) {
            config.vectordb.backend = backend.to_lowercase();
        }
        if let Some(url) = get(ENV_CHROMA_URL) {
            config.vectordb.url = url;
        }
        if let Some(dir) = get(ENV_JSON_DATA_DIR) {
            config.data.json_data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get(ENV_MAX_ARTICLES) {
            config.data.max_articles = config.parse_number(ENV_MAX_ARTICLES, &raw);
        }

        config
    }

    fn parse_number<T: FromStr>(&mut self, key: &str, raw: &str) -> Option<T> {
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                let issue = format!("Invalid {} value: {}", key, raw);
                warn!("{}", issue);
                self.load_issues.push(issue);
                None
            }
        }
    }

    fn replace_with_default(&mut self, issue: String) {
        warn!("{}, using default", issue);
        self.load_issues.push(issue);
    }

    /// Replaces every out-of-range value with its default. The data
    /// directory is left alone even when missing; `validate` reports it.
    pub fn sanitize(mut self) -> Self {
        let defaults = Self::default();

        if !LOG_LEVELS.contains(&self.logging.level.to_uppercase().as_str()) {
            self.replace_with_default(format!("Unknown log level: {}", self.logging.level));
            self.logging.level = defaults.logging.level.clone();
        }
        if self.retriever.max_k == 0 {
            self.replace_with_default("max_k must be positive".to_string());
            self.retriever.max_k = defaults.retriever.max_k;
        }
        if self.retriever.default_k == 0 {
            self.replace_with_default("default_k must be positive".to_string());
            self.retriever.default_k = defaults.retriever.default_k.min(self.retriever.max_k);
        }
        if self.retriever.default_k > self.retriever.max_k {
            self.replace_with_default(format!(
                "default_k ({}) cannot be greater than max_k ({})",
                self.retriever.default_k, self.retriever.max_k
            ));
            self.retriever.default_k = defaults.retriever.default_k.min(self.retriever.max_k);
        }
        if self.retriever.embedding_model.trim().is_empty() {
            self.replace_with_default("embedding model name is empty".to_string());
            self.retriever.embedding_model = defaults.retriever.embedding_model.clone();
        }
        if self.model.chat_model.trim().is_empty() {
            self.replace_with_default("chat model name is empty".to_string());
            self.model.chat_model = defaults.model.chat_model.clone();
        }
        if Url::parse(&self.model.base_url).is_err() {
            self.replace_with_default(format!("Invalid OpenAI base URL: {}", self.model.base_url));
            self.model.base_url = defaults.model.base_url.clone();
        }
        if !BACKENDS.contains(&self.vectordb.backend.as_str()) {
            self.replace_with_default(format!("Unknown vector backend: {}", self.vectordb.backend));
            self.vectordb.backend = defaults.vectordb.backend.clone();
        }
        if Url::parse(&self.vectordb.url).is_err() {
            self.replace_with_default(format!("Invalid Chroma URL: {}", self.vectordb.url));
            self.vectordb.url = defaults.vectordb.url.clone();
        }
        if is_empty_path(&self.vectordb.persist_directory) {
            self.replace_with_default("persist directory is empty".to_string());
            self.vectordb.persist_directory = defaults.vectordb.persist_directory.clone();
        }
        if is_empty_path(&self.data.json_data_dir) {
            self.replace_with_default("JSON data directory is empty".to_string());
            self.data.json_data_dir = defaults.data.json_data_dir.clone();
        }
        if self.data.max_articles == Some(0) {
            self.replace_with_default("max_articles must be positive".to_string());
            self.data.max_articles = None;
        }

        self
    }

    /// Lists every problem found while loading plus any that remain in the
    /// current values. An empty list means the configuration is valid.
    pub fn validate(&self) -> Vec<Error> {
        let mut errors: Vec<Error> = self
            .load_issues
            .iter()
            .map(|issue| Error::Configuration(issue.clone()))
            .collect();

        if self.retriever.default_k == 0 {
            errors.push(Error::Configuration("default_k must be positive".to_string()));
        }
        if self.retriever.max_k == 0 {
            errors.push(Error::Configuration("max_k must be positive".to_string()));
        }
        if self.retriever.default_k > self.retriever.max_k {
            errors.push(Error::Configuration("default_k cannot be greater than max_k".to_string()));
        }
        if !self.data.json_data_dir.exists() {
            errors.push(Error::Configuration(format!(
                "JSON data directory does not exist: {}",
                self.data.json_data_dir.display()
            )));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }
}

fn is_empty_path(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_unset_variables_use_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.logging.level, "INFO");
        assert_eq!(config.logging.file_path, None);
        assert_eq!(config.parser.min_paragraph_length, 20);
        assert_eq!(config.parser.ignored_labels, vec!["equation", "figure"]);
        assert_eq!(config.retriever.default_k, 5);
        assert_eq!(config.retriever.max_k, 50);
        assert_eq!(config.retriever.embedding_model, "text-embedding-3-small");
        assert_eq!(config.model.chat_model, "gpt-4o-mini");
        assert_eq!(config.model.api_key, None);
        assert_eq!(config.vectordb.persist_directory, PathBuf::from("docs/chroma/"));
        assert_eq!(config.vectordb.collection_name, "docbank_articles");
        assert_eq!(config.vectordb.backend, "memory");
        assert_eq!(config.data.json_data_dir, PathBuf::from("../dataset_doc/train"));
        assert_eq!(config.data.max_articles, None);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = config_from(&[
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FILE, "logs/app.log"),
            (ENV_MIN_PARAGRAPH_LENGTH, "42"),
            (ENV_DEFAULT_K, "3"),
            (ENV_CHROMA_PERSIST_DIR, "/tmp/chroma"),
            (ENV_JSON_DATA_DIR, "/data/train"),
            (ENV_MAX_ARTICLES, "10"),
            (ENV_OPENAI_API_KEY, "sk-test"),
            (ENV_VECTOR_BACKEND, "Chroma"),
        ]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file_path, Some(PathBuf::from("logs/app.log")));
        assert_eq!(config.parser.min_paragraph_length, 42);
        assert_eq!(config.retriever.default_k, 3);
        assert_eq!(config.vectordb.persist_directory, PathBuf::from("/tmp/chroma"));
        assert_eq!(config.vectordb.backend, "chroma");
        assert_eq!(config.data.json_data_dir, PathBuf::from("/data/train"));
        assert_eq!(config.data.max_articles, Some(10));
        assert!(config.has_api_key());
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let config = config_from(&[
            (ENV_MIN_PARAGRAPH_LENGTH, "-5"),
            (ENV_DEFAULT_K, "many"),
            (ENV_MAX_ARTICLES, "1.5"),
        ]);
        assert_eq!(config.parser.min_paragraph_length, 20);
        assert_eq!(config.retriever.default_k, 5);
        assert_eq!(config.data.max_articles, None);

        let issues = config.validate();
        assert!(issues.iter().any(|e| e.to_string().contains("Invalid DEFAULT_K value: many")));
        assert!(issues.iter().all(|e| matches!(e, Error::Configuration(_))));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = config_from(&[(ENV_JSON_DATA_DIR, ""), (ENV_OPENAI_API_KEY, "  ")]);
        assert_eq!(config.data.json_data_dir, PathBuf::from("../dataset_doc/train"));
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_sanitize_replaces_out_of_range_values() {
        let config = config_from(&[
            (ENV_DEFAULT_K, "0"),
            (ENV_LOG_LEVEL, "loud"),
            (ENV_VECTOR_BACKEND, "pinecone"),
            (ENV_OPENAI_BASE_URL, "not a url"),
            (ENV_MAX_ARTICLES, "0"),
        ])
        .sanitize();
        assert_eq!(config.retriever.default_k, 5);
        assert_eq!(config.logging.level, "INFO");
        assert_eq!(config.vectordb.backend, "memory");
        assert_eq!(config.model.base_url, "https://api.openai.com/v1");
        assert_eq!(config.data.max_articles, None);
    }

    #[test]
    fn test_sanitize_clamps_default_k_to_max_k() {
        let mut config = config_from(&[(ENV_DEFAULT_K, "80")]);
        config.retriever.max_k = 3;
        let config = config.sanitize();
        assert_eq!(config.retriever.default_k, 3);
    }

    #[test]
    fn test_validate_reports_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.data.json_data_dir = dir.path().to_path_buf();
        assert!(config.is_valid());

        config.data.json_data_dir = dir.path().join("missing");
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].to_string().contains("does not exist"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = config_from(&[(ENV_OPENAI_API_KEY, "sk-secret")]);
        let debug = format!("{:?}", config.model);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
