//! Conf module — parser configuration model, presets, and loading.

pub mod model;
pub mod load;

pub use model::{ConfigError, LogFormatPreset, ParserConfig};
