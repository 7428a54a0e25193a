use rb_core::{Document, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::article::is_json;
use crate::parser::{Label, PageBlock, PageParser, Segment};
use crate::{DocumentLoader, LoaderOptions};

/// Loads one DocBank article: a directory of page files named
/// `<anything>_<page>.json`, each holding a list of labelled text blocks.
#[derive(Debug, Clone)]
pub struct DocBankLoader {
    article_dir: PathBuf,
    options: LoaderOptions,
    parser: PageParser,
}

#[derive(Debug, Default)]
struct CommonMetadata {
    title: Vec<String>,
    author: Vec<String>,
    abstract_: Vec<String>,
}

impl DocBankLoader {
    pub fn new(article_dir: impl Into<PathBuf>, options: LoaderOptions) -> Self {
        let parser = PageParser::new(options.ignored_labels.iter().cloned());
        Self {
            article_dir: article_dir.into(),
            options,
            parser,
        }
    }

    /// One loader per article directory under `root`, in name order, capped
    /// at `max_articles`.
    pub fn corpus(root: &Path, options: &LoaderOptions) -> Result<Vec<DocBankLoader>> {
        if !root.is_dir() {
            return Err(Error::DataAccess(format!(
                "Data directory does not exist: {}",
                root.display()
            )));
        }

        let loaders = WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .take(options.max_articles.unwrap_or(usize::MAX))
            .map(|entry| DocBankLoader::new(entry.into_path(), options.clone()))
            .collect();

        Ok(loaders)
    }

    pub fn article_id(&self) -> String {
        self.article_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Page files ordered by page number. Files without a numeric suffix
    /// are skipped.
    fn page_paths(&self) -> Result<Vec<(u32, PathBuf)>> {
        if !self.article_dir.is_dir() {
            return Err(Error::DataAccess(format!(
                "Article directory does not exist: {}",
                self.article_dir.display()
            )));
        }

        let mut pages = Vec::new();
        for entry in WalkDir::new(&self.article_dir).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_json(entry.path()) {
                continue;
            }
            match page_number(entry.path()) {
                Some(number) => pages.push((number, entry.into_path())),
                None => warn!("Skipping {}: no page number in file name", entry.path().display()),
            }
        }
        pages.sort();
        Ok(pages)
    }

    fn read_page(path: &Path) -> Result<Vec<PageBlock>> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::DataAccess(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::DataAccess(format!("Invalid page JSON in {}: {}", path.display(), e)))
    }

    /// Parses every page and returns the paragraphs that pass the length
    /// filter, with the article's title, authors and abstract attached.
    pub fn process(&self) -> Result<Vec<Document>> {
        let article_id = self.article_id();
        if article_id.trim().is_empty() {
            return Err(Error::DataAccess(format!(
                "Article directory {} has no usable name",
                self.article_dir.display()
            )));
        }

        let mut pages: Vec<(u32, PathBuf, Vec<Segment>)> = Vec::new();
        for (number, path) in self.page_paths()? {
            match Self::read_page(&path) {
                Ok(blocks) => {
                    let segments = self.parser.parse(&blocks);
                    pages.push((number, path, segments));
                }
                Err(e) => warn!("Skipping {}", e),
            }
        }

        let mut common = CommonMetadata::default();
        for (_, _, segments) in &pages {
            for segment in segments {
                match segment.label {
                    Label::Title => common.title.push(segment.text.clone()),
                    Label::Author => common.author.push(segment.text.clone()),
                    Label::Abstract => common.abstract_.push(segment.text.clone()),
                    _ => {}
                }
            }
        }
        let title = common.title.join("\n");
        let author = common.author.join("\n");
        let abstract_ = common.abstract_.join("\n");

        let mut documents = Vec::new();
        let mut section = String::new();
        let mut position = 0usize;
        for (number, path, segments) in &pages {
            for segment in segments {
                match segment.label {
                    Label::Section => section = segment.text.clone(),
                    Label::Paragraph => {
                        if self.options.keeps(&segment.text) {
                            documents.push(
                                Document::new(format!("{}:{}", article_id, position), segment.text.clone())
                                    .with_metadata("article_id", article_id.clone())
                                    .with_metadata("title", title.clone())
                                    .with_metadata("author", author.clone())
                                    .with_metadata("abstract", abstract_.clone())
                                    .with_metadata("page", u64::from(*number) + 1)
                                    .with_metadata("section", section.clone())
                                    .with_metadata("position", position)
                                    .with_metadata("source", path.display().to_string()),
                            );
                        }
                        position += 1;
                    }
                    _ => {}
                }
            }
        }

        debug!(
            "Processed article '{}': {} pages, {} paragraphs kept",
            article_id,
            pages.len(),
            documents.len()
        );
        Ok(documents)
    }
}

impl DocumentLoader for DocBankLoader {
    fn lazy_load(&self) -> Result<Box<dyn Iterator<Item = Document> + '_>> {
        Ok(Box::new(self.process()?.into_iter()))
    }
}

fn page_number(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .rsplit('_')
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_page(dir: &Path, name: &str, blocks: serde_json::Value) {
        fs::write(dir.join(name), blocks.to_string()).unwrap();
    }

    fn sample_article(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        // Written out of order on purpose; page 10 must come after page 2.
        write_page(
            &dir,
            "paper_10.json",
            json!([
                {"label": "section", "text": "Conclusion"},
                {"label": "paragraph", "text": "We conclude that the method works well."},
            ]),
        );
        write_page(
            &dir,
            "paper_2.json",
            json!([
                {"label": "title", "text": "Sparse Graphs"},
                {"label": "author", "text": "A. Author"},
                {"label": "abstract", "text": "We study sparse graphs."},
                {"label": "section", "text": "Introduction"},
                {"label": "paragraph", "text": "Graphs are everywhere in computing."},
                {"label": "equation", "text": "n = |V|"},
                {"label": "paragraph", "text": "Tiny."},
            ]),
        );
        dir
    }

    fn options(min: usize) -> LoaderOptions {
        LoaderOptions::default().with_min_paragraph_length(min)
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(Path::new("x/2103.01234_3.json")), Some(3));
        assert_eq!(page_number(Path::new("x/page_12.json")), Some(12));
        assert_eq!(page_number(Path::new("x/cover.json")), None);
    }

    #[test]
    fn test_process_orders_pages_and_attaches_metadata() {
        let root = tempdir().unwrap();
        let dir = sample_article(root.path(), "paper");

        let documents = DocBankLoader::new(&dir, options(10)).process().unwrap();
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Graphs are everywhere in computing.", "We conclude that the method works well."]
        );

        let first = &documents[0];
        assert_eq!(first.id, "paper:0");
        assert_eq!(first.article_id(), Some("paper"));
        assert_eq!(first.metadata["title"], "Sparse Graphs");
        assert_eq!(first.metadata["author"], "A. Author");
        assert_eq!(first.metadata["abstract"], "We study sparse graphs.");
        assert_eq!(first.metadata["page"], 3);
        assert_eq!(first.metadata["section"], "Introduction");

        let last = &documents[1];
        assert_eq!(last.id, "paper:2");
        assert_eq!(last.metadata["page"], 11);
        assert_eq!(last.metadata["section"], "Conclusion");
        assert_eq!(last.metadata["title"], "Sparse Graphs");
    }

    #[test]
    fn test_largest_page_number() {
        let root = tempdir().unwrap();
        let dir = root.path().join("paper");
        fs::create_dir_all(&dir).unwrap();
        write_page(
            &dir,
            "paper_4294967295.json",
            json!([{"label": "paragraph", "text": "The last possible page of a paper."}]),
        );

        let documents = DocBankLoader::new(&dir, options(10)).process().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].metadata["page"], 4_294_967_296u64);
    }

    #[test]
    fn test_short_paragraphs_are_dropped() {
        let root = tempdir().unwrap();
        let dir = sample_article(root.path(), "paper");

        let documents = DocBankLoader::new(&dir, options(0)).load().unwrap();
        assert!(documents.iter().any(|d| d.text == "Tiny."));

        let documents = DocBankLoader::new(&dir, options(10)).load().unwrap();
        assert!(!documents.iter().any(|d| d.text == "Tiny."));
    }

    #[test]
    fn test_broken_pages_are_skipped() {
        let root = tempdir().unwrap();
        let dir = sample_article(root.path(), "paper");
        fs::write(dir.join("paper_5.json"), "[{").unwrap();

        let documents = DocBankLoader::new(&dir, options(10)).process().unwrap();
        assert_eq!(documents.len(), 2);
    }

    #[test]
    fn test_missing_article_directory() {
        let root = tempdir().unwrap();
        let loader = DocBankLoader::new(root.path().join("missing"), options(0));
        assert!(matches!(loader.process(), Err(Error::DataAccess(_))));
    }

    #[test]
    fn test_corpus_respects_max_articles() {
        let root = tempdir().unwrap();
        sample_article(root.path(), "a");
        sample_article(root.path(), "b");
        sample_article(root.path(), "c");

        let all = DocBankLoader::corpus(root.path(), &options(10)).unwrap();
        assert_eq!(all.iter().map(|l| l.article_id()).collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let capped = DocBankLoader::corpus(root.path(), &options(10).with_max_articles(Some(2))).unwrap();
        assert_eq!(capped.len(), 2);

        let missing = DocBankLoader::corpus(&root.path().join("nope"), &options(10));
        assert!(matches!(missing, Err(Error::DataAccess(_))));
    }
}
