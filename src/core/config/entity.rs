use super::constant::*;
use crate::base::constant::*;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// ConfigEntity carries every tunable of the engine. Values not present in
/// the YAML source keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigEntity {
    pub app_name: String,
    pub log_level: String,
    /// total length (ms) of the minute-level statistic window
    pub global_stat_interval_ms_total: u32,
    /// bucket count of the minute-level statistic window
    pub global_stat_sample_count_total: u32,
    /// total length (ms) of the realtime statistic window
    pub metric_stat_interval_ms: u32,
    /// bucket count of the realtime statistic window
    pub metric_stat_sample_count: u32,
    /// resources beyond this amount are admitted but not tracked
    pub max_resource_amount: usize,
    /// distinct context names beyond this amount fail to enter
    pub max_context_name_amount: usize,
    pub warm_up_cold_factor: u32,
    /// sampling interval of the CPU/load collectors
    pub system_stat_collect_interval_ms: u32,
    /// cache the wall clock with a 1 ms ticker thread
    pub use_cache_time: bool,
}

impl Default for ConfigEntity {
    fn default() -> Self {
        ConfigEntity {
            app_name: DEFAULT_APP_NAME.into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            global_stat_interval_ms_total: DEFAULT_INTERVAL_MS_TOTAL,
            global_stat_sample_count_total: DEFAULT_SAMPLE_COUNT_TOTAL,
            metric_stat_interval_ms: DEFAULT_INTERVAL_MS,
            metric_stat_sample_count: DEFAULT_SAMPLE_COUNT,
            max_resource_amount: DEFAULT_MAX_RESOURCE_AMOUNT,
            max_context_name_amount: DEFAULT_MAX_CONTEXT_NAME_AMOUNT,
            warm_up_cold_factor: DEFAULT_WARM_UP_COLD_FACTOR,
            system_stat_collect_interval_ms: SYSTEM_INTERVAL_MS,
            use_cache_time: false,
        }
    }
}

impl ConfigEntity {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn check(&self) -> Result<()> {
        if self.app_name.is_empty() {
            return Err(Error::msg("app name cannot be empty"));
        }
        if self.global_stat_sample_count_total == 0
            || self.global_stat_interval_ms_total % self.global_stat_sample_count_total != 0
        {
            return Err(Error::msg(
                "the minute-level statistic interval must be evenly divided by its sample count",
            ));
        }
        if self.metric_stat_sample_count == 0
            || self.metric_stat_interval_ms % self.metric_stat_sample_count != 0
        {
            return Err(Error::msg(
                "the realtime statistic interval must be evenly divided by its sample count",
            ));
        }
        if self.warm_up_cold_factor <= 1 {
            return Err(Error::msg("warm_up_cold_factor must be greater than 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let entity = ConfigEntity::new();
        entity.check().unwrap();
        assert_eq!(entity.metric_stat_sample_count, 2);
        assert_eq!(entity.metric_stat_interval_ms, 1000);
        assert_eq!(entity.global_stat_sample_count_total, 60);
        assert_eq!(entity.global_stat_interval_ms_total, 60000);
        assert_eq!(entity.max_resource_amount, 6000);
        assert_eq!(entity.max_context_name_amount, 2000);
    }

    #[test]
    fn uneven_window_rejected() {
        let entity = ConfigEntity {
            metric_stat_sample_count: 3,
            ..Default::default()
        };
        assert!(entity.check().is_err());
    }

    #[test]
    fn yaml_roundtrip() {
        let entity = ConfigEntity {
            app_name: "payments".into(),
            warm_up_cold_factor: 5,
            ..Default::default()
        };
        let text = serde_yaml::to_string(&entity).unwrap();
        let parsed: ConfigEntity = serde_yaml::from_str(&text).unwrap();
        assert_eq!(entity, parsed);
    }
}
