pub mod constant;
pub mod entity;

pub use constant::*;
pub use entity::*;

use crate::{logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

pub fn reset_global_config(entity: ConfigEntity) {
    *GLOBAL_CONFIG.write().unwrap() = entity;
}

/// init_config_with_yaml loads the general configuration from the YAML file
/// under the provided path; the system environment overrides single items.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    apply_yaml_config_file(config_path)?;
    override_items_from_system_env()?;
    Ok(())
}

// apply_yaml_config_file loads general configuration from the given YAML file.
fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    // Priority: system environment > YAML file > default config
    if utils::is_blank(config_path) {
        // resolve the file path from the system env when absent
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    load_global_config_from_yaml_file(config_path)
}

fn load_global_config_from_yaml_file(path_str: &String) -> Result<()> {
    let path = Path::new(path_str);
    if path_str == CONFIG_FILENAME && !path.exists() {
        // no file supplied, keep the default config
        return Ok(());
    }
    if !path.exists() {
        return Err(Error::msg("configuration file does not exist"));
    }
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!("[Config] Resolving config from file, file {}", path_str);
    reset_global_config(entity);
    Ok(())
}

pub fn override_items_from_system_env() -> Result<()> {
    let app_name = env::var(APP_NAME_ENV_KEY).unwrap_or_default();
    let mut cfg = GLOBAL_CONFIG.write().unwrap();
    if !utils::is_blank(&app_name) {
        cfg.app_name = app_name;
    }
    cfg.check()?;
    Ok(())
}

pub fn app_name() -> String {
    GLOBAL_CONFIG.read().unwrap().app_name.clone()
}

pub fn log_level() -> String {
    GLOBAL_CONFIG.read().unwrap().log_level.clone()
}

pub fn global_stat_interval_ms_total() -> u32 {
    GLOBAL_CONFIG.read().unwrap().global_stat_interval_ms_total
}

pub fn global_stat_sample_count_total() -> u32 {
    GLOBAL_CONFIG.read().unwrap().global_stat_sample_count_total
}

pub fn metric_stat_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().metric_stat_interval_ms
}

pub fn metric_stat_sample_count() -> u32 {
    GLOBAL_CONFIG.read().unwrap().metric_stat_sample_count
}

pub fn max_resource_amount() -> usize {
    GLOBAL_CONFIG.read().unwrap().max_resource_amount
}

pub fn max_context_name_amount() -> usize {
    GLOBAL_CONFIG.read().unwrap().max_context_name_amount
}

pub fn warm_up_cold_factor() -> u32 {
    GLOBAL_CONFIG.read().unwrap().warm_up_cold_factor
}

pub fn system_stat_collect_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().system_stat_collect_interval_ms
}

pub fn use_cache_time() -> bool {
    GLOBAL_CONFIG.read().unwrap().use_cache_time
}
