//! Initialization of the engine runtime:
//! 1. resolve the global config, from a hand-crafted entity, a YAML file or
//!    the environment;
//! 2. initialize the logger;
//! 3. start the background tasks (system probe collectors, the optional
//!    cached-time ticker).

use crate::core::config::{self, ConfigEntity};
use crate::{logging, system_metric, utils, Result};

/// `init_default` initializes the engine using the configuration from the
/// system environment, falling back to default values.
#[inline]
pub fn init_default() -> Result<()> {
    init_guard(&mut String::new())
}

/// `init_with_config` initializes the engine using the given config entity.
#[inline]
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_items_from_system_env()?;
    init_core_components()
}

/// `init_with_config_file` loads the general configuration from the given
/// YAML file and initializes the engine.
#[inline]
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    init_guard(config_path)
}

#[inline]
fn init_guard(config_path: &mut String) -> Result<()> {
    config::init_config_with_yaml(config_path)?;
    init_core_components()
}

// `init_core_components` starts the background tasks with the global config
#[inline]
fn init_core_components() -> Result<()> {
    logging::logger_init();

    let system_interval = config::system_stat_collect_interval_ms();
    if system_interval > 0 {
        system_metric::init_load_collector(system_interval);
        system_metric::init_cpu_collector(system_interval);
    }

    if config::use_cache_time() {
        utils::start_time_ticker();
    }
    Ok(())
}
