use async_trait::async_trait;
use rb_core::config::VectorDbConfig;
use rb_core::{Error, Result, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod backends;
pub mod indexer;
pub mod retriever;

pub use backends::*;
pub use indexer::{Indexer, IndexingReport};
pub use retriever::ArticleRetriever;

const CONNECT_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn connect(config: &VectorDbConfig) -> Result<Self>
    where
        Self: Sized;
}

/// Opens the named backend. `backend` overrides `config.backend` so the
/// command line can pick a store without touching the environment.
pub async fn create_store(backend: &str, config: &VectorDbConfig) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match backend.to_lowercase().as_str() {
        "memory" => Arc::new(connect_backend::<InMemoryStorage>(config).await?),
        #[cfg(feature = "chroma")]
        "chroma" => Arc::new(connect_backend::<ChromaStorage>(config).await?),
        #[cfg(not(feature = "chroma"))]
        "chroma" => {
            return Err(Error::Configuration(
                "Chroma support is not compiled in, rebuild with --features chroma".to_string(),
            ))
        }
        other => {
            return Err(Error::Configuration(format!("Unknown storage backend: {}", other)));
        }
    };
    info!("📦 Using {} vector store ({})", store.name(), config.collection_name);
    Ok(store)
}

async fn connect_backend<B: StorageBackend>(config: &VectorDbConfig) -> Result<B> {
    let mut retries = CONNECT_RETRIES;
    loop {
        match B::connect(config).await {
            Ok(storage) => return Ok(storage),
            Err(e) => {
                retries -= 1;
                if retries == 0 {
                    return Err(Error::Storage(format!("{} ({})", e, B::get_error_message())));
                }
                warn!(
                    "Storage initialization failed, retrying {}/{}: {}",
                    CONNECT_RETRIES - retries,
                    CONNECT_RETRIES - 1,
                    e
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_store, ArticleRetriever, Indexer, IndexingReport, StorageBackend};
}
