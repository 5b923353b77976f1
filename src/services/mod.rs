pub mod config;
pub mod sync;

pub use config::{
    ConfigError, ServerConfig, SyncConfig, SyncSettings, TOKEN_ENV_VAR, default_config_path,
};
pub use sync::*;
