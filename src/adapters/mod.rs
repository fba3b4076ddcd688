// Adapters - External system implementations

pub mod libav;
pub mod local_source;
pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
pub use libav::LibavTranscoder;
pub use local_source::LocalFileSource;
pub use toml_config::{Settings, TomlConfigAdapter};
pub use tracing_log::{LogFormat, TracingLogAdapter};
