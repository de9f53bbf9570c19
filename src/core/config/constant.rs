// default app settings
pub const DEFAULT_APP_NAME: &str = "unknown_service";
pub const APP_NAME_ENV_KEY: &str = "FLOWGUARD_APP_NAME";
pub const CONF_FILE_PATH_ENV_KEY: &str = "FLOWGUARD_CONFIG_FILE_PATH";
pub const CONFIG_FILENAME: &str = "flowguard.yml";

pub const DEFAULT_LOG_LEVEL: &str = "info";

// default sampling interval of the system probe
pub const SYSTEM_INTERVAL_MS: u32 = 1000;
