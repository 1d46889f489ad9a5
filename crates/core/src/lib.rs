pub mod config;
pub mod metrics;
pub mod testing;
pub mod tryon;

pub use config::{
    load_config, load_config_from_str, validate_config, ApiConfig, Config, ConfigError,
    PollerConfig, SanitizedConfig, ServerConfig,
};
pub use tryon::{
    ApiError, Category, HttpTryOnApi, ImagePayload, ProgressEvent, ProgressReporter, TryOnApi,
    TryOnError, TryOnOrchestrator, TryOnOutcome, TryOnRequest,
};
