pub mod models;
pub mod qa;

pub use models::{create_model, DummyModel, OpenAIModel};
pub use qa::{Answer, QaChain};

pub mod prelude {
    pub use super::models::create_model;
    pub use super::qa::{Answer, QaChain};
    pub use rb_core::{ChatMessage, Error, InferenceModel, Result};
}
