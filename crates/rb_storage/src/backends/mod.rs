pub mod memory;

#[cfg(feature = "chroma")]
pub mod chroma;

pub use memory::InMemoryStorage;

#[cfg(feature = "chroma")]
pub use chroma::ChromaStorage;
