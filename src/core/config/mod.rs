pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::{parse_config, redact_sensitive_values, ConfigService};
pub use settings::{
    AnswerConfig, AppConfig, BatchConfig, EmbeddingConfig, PipelineConfig, RetrievalConfig,
    ServerConfig, VectorIndexConfig,
};
