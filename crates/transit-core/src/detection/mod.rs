pub mod catalog;
pub mod config;
pub mod finder;
pub mod kernel;

pub use catalog::{SourceCatalog, SourcePosition};
pub use config::DetectionConfig;
pub use finder::detect_sources;
