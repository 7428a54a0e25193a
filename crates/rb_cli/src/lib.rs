pub mod setup;

pub use setup::{prepare_config, Toolkit};
