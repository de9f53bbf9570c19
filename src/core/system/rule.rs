use crate::base::GuardRule;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The metric a system rule samples.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum MetricType {
    /// the 1-minute load average of the machine
    Load,
    /// average response time over all inbound traffic, in ms
    AvgRt,
    /// amount of in-flight inbound requests
    Concurrency,
    /// QPS of all inbound requests
    InboundQps,
    /// CPU usage of the process, in [0.0, 1.0]
    CpuUsage,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::Load
    }
}

/// `Rule` describes one threshold of the global system protection gate.
/// Every loaded rule is evaluated on each inbound entry, so a gate with
/// several thresholds is expressed as several rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: String,
    pub metric_type: MetricType,
    pub threshold: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            metric_type: MetricType::default(),
            threshold: 0.0,
        }
    }
}

impl GuardRule for Rule {
    fn resource_name(&self) -> String {
        format!("{:?}", self.metric_type)
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.metric_type == MetricType::CpuUsage && self.threshold > 1.0 {
            return Err(Error::msg("invalid CPU usage, valid range is [0.0, 1.0]"));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.metric_type == other.metric_type && self.threshold == other.threshold
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.metric_type.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
