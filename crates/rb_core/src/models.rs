use async_trait::async_trait;
use crate::types::ChatMessage;
use crate::Result;

#[async_trait]
pub trait InferenceModel: Send + Sync {
    fn name(&self) -> &str;

    /// Generate embeddings for a piece of text
    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for several texts, preserving order
    async fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.generate_embeddings(text).await?);
        }
        Ok(embeddings)
    }

    /// Produce the assistant reply for a conversation
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}
