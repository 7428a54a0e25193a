use rb_core::{Document, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{DocumentLoader, LoaderOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    #[serde(default)]
    pub section: String,
}

impl Paragraph {
    pub fn new(section: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            section: section.into(),
        }
    }
}

/// One article as stored on disk: a title and its paragraphs in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

impl Article {
    /// Reads an article file. A missing `id` falls back to the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::DataAccess(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut article: Article = serde_json::from_str(&raw).map_err(|e| {
            Error::DataAccess(format!("Invalid article JSON in {}: {}", path.display(), e))
        })?;

        if article.id.trim().is_empty() {
            article.id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if article.id.trim().is_empty() {
            return Err(Error::DataAccess(format!(
                "Article in {} has no identifier",
                path.display()
            )));
        }
        Ok(article)
    }

    /// One document per paragraph that passes the length filter.
    /// `position` is the paragraph's index in the article, so it stays
    /// stable whatever the filter drops.
    pub fn to_documents(&self, source: &str, options: &LoaderOptions) -> Vec<Document> {
        self.paragraphs
            .iter()
            .enumerate()
            .filter(|(_, p)| options.keeps(&p.text))
            .map(|(position, p)| {
                Document::new(format!("{}:{}", self.id, position), p.text.clone())
                    .with_metadata("article_id", self.id.clone())
                    .with_metadata("title", self.title.clone())
                    .with_metadata("section", p.section.clone())
                    .with_metadata("position", position)
                    .with_metadata("source", source)
            })
            .collect()
    }
}

/// Loads a directory of per-article JSON files.
#[derive(Debug, Clone)]
pub struct ArticleLoader {
    dir: PathBuf,
    options: LoaderOptions,
}

impl ArticleLoader {
    pub fn new(dir: impl Into<PathBuf>, options: LoaderOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Starts a lazy pass over the directory. Unreadable or malformed files
    /// are logged and skipped; only a missing directory is an error.
    pub fn documents(&self) -> Result<Documents> {
        if !self.dir.is_dir() {
            return Err(Error::DataAccess(format!(
                "Data directory does not exist: {}",
                self.dir.display()
            )));
        }

        let max_depth = if self.options.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter();

        Ok(Documents {
            walker,
            pending: VecDeque::new(),
            options: self.options.clone(),
            articles_loaded: 0,
            seen_ids: HashSet::new(),
        })
    }

    /// Loads a single file, surfacing every failure.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let article = Article::from_file(path)?;
        Ok(article.to_documents(&path.display().to_string(), &self.options))
    }
}

impl DocumentLoader for ArticleLoader {
    fn lazy_load(&self) -> Result<Box<dyn Iterator<Item = Document> + '_>> {
        Ok(Box::new(self.documents()?))
    }
}

/// Lazy stream of documents: one file is read only when the paragraphs of
/// the previous one have been handed out. Article ids are unique within a
/// pass; a later file that resolves to an id already seen is skipped.
pub struct Documents {
    walker: walkdir::IntoIter,
    pending: VecDeque<Document>,
    options: LoaderOptions,
    articles_loaded: usize,
    seen_ids: HashSet<String>,
}

impl Documents {
    fn limit_reached(&self) -> bool {
        self.options
            .max_articles
            .is_some_and(|max| self.articles_loaded >= max)
    }
}

impl Iterator for Documents {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        loop {
            if let Some(document) = self.pending.pop_front() {
                return Some(document);
            }
            if self.limit_reached() {
                return None;
            }

            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_json(entry.path()) {
                continue;
            }

            let path = entry.path();
            match Article::from_file(path) {
                Ok(article) if !self.seen_ids.insert(article.id.clone()) => {
                    warn!(
                        "Skipping {}: article id '{}' was already loaded from another file",
                        path.display(),
                        article.id
                    );
                }
                Ok(article) => {
                    let documents = article.to_documents(&path.display().to_string(), &self.options);
                    debug!(
                        "Loaded article '{}' with {} of {} paragraphs",
                        article.id,
                        documents.len(),
                        article.paragraphs.len()
                    );
                    self.articles_loaded += 1;
                    self.pending.extend(documents);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
