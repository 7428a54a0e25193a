use rb_core::{AppConfig, Document, Result};

pub mod article;
pub mod docbank;
pub mod parser;

pub use article::{Article, ArticleLoader, Documents, Paragraph};
pub use docbank::DocBankLoader;
pub use parser::{Label, PageBlock, PageParser, Segment};

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Paragraphs shorter than this many characters are dropped
    pub min_paragraph_length: usize,
    /// Walk sub-directories instead of only the top level
    pub recursive: bool,
    /// Stop after this many articles
    pub max_articles: Option<usize>,
    /// DocBank labels whose blocks are discarded by the page parser
    pub ignored_labels: Vec<Label>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl LoaderOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_paragraph_length: config.parser.min_paragraph_length,
            recursive: false,
            max_articles: config.data.max_articles,
            ignored_labels: config
                .parser
                .ignored_labels
                .iter()
                .map(|l| Label::from(l.as_str()))
                .collect(),
        }
    }

    pub fn with_min_paragraph_length(mut self, min: usize) -> Self {
        self.min_paragraph_length = min;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_max_articles(mut self, max: Option<usize>) -> Self {
        self.max_articles = max;
        self
    }

    /// Whether a paragraph is long enough to keep. Blank paragraphs never are.
    pub fn keeps(&self, text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= self.min_paragraph_length
    }
}

/// A source of documents that can be walked any number of times.
pub trait DocumentLoader {
    /// Starts a fresh pass over the source.
    fn lazy_load(&self) -> Result<Box<dyn Iterator<Item = Document> + '_>>;

    fn load(&self) -> Result<Vec<Document>> {
        Ok(self.lazy_load()?.collect())
    }
}

pub mod prelude {
    pub use super::{ArticleLoader, DocBankLoader, DocumentLoader, LoaderOptions};
    pub use rb_core::{Document, Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_respects_minimum_length() {
        let options = LoaderOptions::default().with_min_paragraph_length(5);
        assert!(options.keeps("hello"));
        assert!(options.keeps("  hello  "));
        assert!(!options.keeps("hell"));
        assert!(!options.keeps("   "));

        let options = options.with_min_paragraph_length(0);
        assert!(options.keeps("a"));
        assert!(!options.keeps(""));
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = AppConfig::default();
        config.parser.min_paragraph_length = 7;
        config.data.max_articles = Some(2);
        let options = LoaderOptions::from_config(&config);
        assert_eq!(options.min_paragraph_length, 7);
        assert_eq!(options.max_articles, Some(2));
        assert_eq!(options.ignored_labels, vec![Label::Equation, Label::Figure]);
        assert!(!options.recursive);
    }
}
