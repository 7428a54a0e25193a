use rb_core::{ChatMessage, Document, MetadataFilter, Result};
use rb_storage::ArticleRetriever;
use std::fmt::Write;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You answer questions about scientific articles. \
Use only the numbered context passages below. If they do not contain the answer, say that you do not know.";

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Document>,
}

/// Retrieve-then-generate over an [`ArticleRetriever`].
#[derive(Debug)]
pub struct QaChain {
    retriever: ArticleRetriever,
}

impl QaChain {
    pub fn new(retriever: ArticleRetriever) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &ArticleRetriever {
        &self.retriever
    }

    pub async fn answer(&self, question: &str, filter: Option<&MetadataFilter>) -> Result<Answer> {
        let sources = self.retriever.get_relevant_documents(question, filter).await?;
        let messages = vec![
            ChatMessage::system(build_context(&sources)),
            ChatMessage::user(question.trim()),
        ];
        debug!("Asking {} with {} passages", self.retriever.model().name(), sources.len());

        let text = self.retriever.model().complete(&messages).await?;
        Ok(Answer {
            text: text.trim().to_string(),
            sources,
        })
    }
}

fn build_context(sources: &[Document]) -> String {
    let mut prompt = format!("{}\n\nContext:", SYSTEM_PROMPT);
    for (i, doc) in sources.iter().enumerate() {
        let _ = write!(prompt, "\n[{}] {}", i + 1, doc.text.replace('\n', " "));
    }
    prompt
}
