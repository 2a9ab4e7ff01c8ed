//! Configuration loading, parsing, and validation.

mod loader;
mod types;
mod validation;

pub use loader::{
    apply_env_overrides, load_config, load_from_env, ConfigError, ENV_APP_ENVIRONMENT,
    ENV_APP_VERSION, ENV_BACKEND_PROVIDER, ENV_BACKEND_URL, ENV_BACKEND_VERSION,
    ENV_FRONTEND_URL,
};
pub use types::*;
pub use validation::validate_config;
