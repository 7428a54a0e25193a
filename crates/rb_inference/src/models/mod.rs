use rb_core::config::AppConfig;
use rb_core::{Error, InferenceModel, Result};
use std::sync::Arc;
use tracing::info;

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAIModel;

pub async fn create_model(name: &str, config: &AppConfig) -> Result<Arc<dyn InferenceModel>> {
    let model: Arc<dyn InferenceModel> = match name.to_lowercase().as_str() {
        "openai" => Arc::new(OpenAIModel::from_config(config)?),
        "dummy" => Arc::new(DummyModel::default()),
        other => {
            return Err(Error::Configuration(format!(
                "Unknown model: {} (available: openai, dummy)",
                other
            )))
        }
    };
    info!("🧠 Inference model initialized (using {})", model.name());
    Ok(model)
}
