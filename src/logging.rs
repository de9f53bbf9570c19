use crate::config;
use lazy_static::lazy_static;
pub use log::{debug, error, info, trace, warn};
use std::sync::Once;

lazy_static! {
    pub static ref FREQUENT_ERROR_ONCE: Once = Once::new();
}

/// Initializes the `env_logger` backend. The filter defaults to the
/// configured log level and may be overridden through `RUST_LOG`.
pub fn logger_init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config::log_level()),
    )
    .try_init();
}
