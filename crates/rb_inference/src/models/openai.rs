use async_trait::async_trait;
use rb_core::config::AppConfig;
use rb_core::{ChatMessage, Error, InferenceModel, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible API: embeddings plus chat completions.
pub struct OpenAIModel {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl fmt::Debug for OpenAIModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl OpenAIModel {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Inference("OpenAI API key is required".to_string()))?;
        Url::parse(base_url)
            .map_err(|e| Error::Configuration(format!("Invalid OpenAI base URL {}: {}", base_url, e)))?;

        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.model.api_key.clone(),
            &config.model.base_url,
            config.model.chat_model.clone(),
            config.retriever.embedding_model.clone(),
        )
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!("{} returned {}: {}", path, status, body.trim())));
        }
        Ok(response.json::<Resp>().await?)
    }
}

#[async_trait]
impl InferenceModel for OpenAIModel {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_embeddings_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Inference("Embedding response contained no data".to_string()))
    }

    async fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            input: texts,
            model: &self.embedding_model,
        };
        let mut response: EmbeddingResponse = self.post("embeddings", &request).await?;

        if response.data.len() != texts.len() {
            return Err(Error::Inference(format!(
                "Requested {} embeddings but received {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);
        debug!("Embedded {} texts with {}", texts.len(), self.embedding_model);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
        };
        let response: ChatResponse = self.post("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Inference("Chat response contained no choices".to_string()))
    }
}
