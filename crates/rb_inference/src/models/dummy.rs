use async_trait::async_trait;
use rb_core::{ChatMessage, InferenceModel, Result};
use std::fmt;

pub const DUMMY_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Offline stand-in for a real model. Embeddings are hashed bags of words,
/// so texts that share words land close together; replies are extractive.
pub struct DummyModel {
    dimensions: usize,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new(DUMMY_DIMENSIONS)
    }
}

impl DummyModel {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, word: &str) -> usize {
        let mut hash = FNV_OFFSET;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        (hash % self.dimensions as u64) as usize
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

#[async_trait]
impl InferenceModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for word in words(text) {
            embedding[self.bucket(&word)] += 1.0;
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    /// Returns the first 20 words of the first numbered context passage, or
    /// of the last message when there is no context.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let passage = messages
            .iter()
            .flat_map(|m| m.content.lines())
            .find_map(|line| line.trim().strip_prefix("[1]"));

        let source = match passage {
            Some(passage) => passage,
            None => messages.last().map(|m| m.content.as_str()).unwrap_or_default(),
        };
        let reply: Vec<&str> = source.split_whitespace().take(20).collect();
        Ok(reply.join(" "))
    }
}
