pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use models::InferenceModel;
pub use storage::VectorStore;
pub use types::{
    cosine_similarity, ChatMessage, Document, Metadata, MetadataFilter, Role, ScoredDocument,
};
