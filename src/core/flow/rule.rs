use crate::{
    base::{GuardRule, DEFAULT_MAX_QUEUEING_TIME_MS, DEFAULT_WARM_UP_PERIOD_SEC,
           LIMIT_APP_DEFAULT},
    Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type Id = String;

/// The measurement a flow rule compares against its threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum FlowGrade {
    /// current amount of in-flight calls
    Thread,
    /// passed calls per second over the realtime window
    Qps,
}

impl Default for FlowGrade {
    fn default() -> FlowGrade {
        FlowGrade::Qps
    }
}

/// RelationStrategy picks which node's statistic is compared against the
/// threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum RelationStrategy {
    /// the statistic of the current resource
    Direct,
    /// the statistic of `ref_resource`
    Related,
    /// the per-context statistic of this resource, applied only when the
    /// current context name equals `ref_resource`
    Chain,
}

impl Default for RelationStrategy {
    fn default() -> RelationStrategy {
        RelationStrategy::Direct
    }
}

/// The action taken on a request exceeding the threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum ControlBehavior {
    Reject,
    /// token bucket whose filling rate grows from `threshold / cold_factor`
    /// to `threshold` over the warm-up period
    WarmUp,
    /// leaky bucket: pending requests wait in queue until free capacity is
    /// available, bounded by `max_queueing_time_ms`
    Throttling,
    /// throttling paced by the warm-up allowed rate
    WarmUpThrottling,
}

impl Default for ControlBehavior {
    fn default() -> ControlBehavior {
        ControlBehavior::Reject
    }
}

/// Rule describes one flow control policy of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: Id,
    /// the resource being guarded
    pub resource: String,
    /// origin selector: a specific origin, `default` (all callers) or
    /// `other` (all callers without a dedicated rule)
    pub limit_app: String,
    pub grade: FlowGrade,
    /// the threshold; QPS for `FlowGrade::Qps`, in-flight calls for
    /// `FlowGrade::Thread`
    pub threshold: f64,
    pub relation_strategy: RelationStrategy,
    /// referenced resource (Related) or entrance context name (Chain)
    pub ref_resource: String,
    pub control_behavior: ControlBehavior,
    pub warm_up_period_sec: u32,
    /// 0 falls back to the configured default factor
    pub warm_up_cold_factor: u32,
    /// When 0, throttling only controls the interval of requests and
    /// requests exceeding the threshold are rejected directly.
    pub max_queueing_time_ms: u32,
    /// reserved for cluster token servers; local evaluation ignores it
    pub cluster_mode: bool,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            limit_app: LIMIT_APP_DEFAULT.into(),
            grade: FlowGrade::default(),
            threshold: 0.0,
            relation_strategy: RelationStrategy::default(),
            ref_resource: String::default(),
            control_behavior: ControlBehavior::default(),
            warm_up_period_sec: DEFAULT_WARM_UP_PERIOD_SEC,
            warm_up_cold_factor: 0,
            max_queueing_time_ms: DEFAULT_MAX_QUEUEING_TIME_MS,
            cluster_mode: false,
        }
    }
}

impl Rule {
    pub fn uses_warm_up(&self) -> bool {
        matches!(
            self.control_behavior,
            ControlBehavior::WarmUp | ControlBehavior::WarmUpThrottling
        )
    }

    pub fn uses_throttling(&self) -> bool {
        matches!(
            self.control_behavior,
            ControlBehavior::Throttling | ControlBehavior::WarmUpThrottling
        )
    }
}

impl GuardRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.relation_strategy != RelationStrategy::Direct && self.ref_resource.is_empty() {
            return Err(Error::msg(
                "ref_resource must be non empty when relation_strategy is Related or Chain",
            ));
        }
        if self.uses_warm_up() {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be greater than 0"));
            }
            if self.warm_up_cold_factor == 1 {
                return Err(Error::msg("warm_up_cold_factor must be greater than 1"));
            }
        }
        Ok(())
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
        self.ref_resource.hash(state);
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.limit_app == other.limit_app
            && self.grade == other.grade
            && self.threshold == other.threshold
            && self.relation_strategy == other.relation_strategy
            && self.ref_resource == other.ref_resource
            && self.control_behavior == other.control_behavior
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
            && self.cluster_mode == other.cluster_mode
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let rule = Rule::default();
        assert_eq!(rule.limit_app, LIMIT_APP_DEFAULT);
        assert_eq!(rule.warm_up_period_sec, 10);
        assert_eq!(rule.max_queueing_time_ms, 500);
        assert_eq!(rule.grade, FlowGrade::Qps);
        assert_eq!(rule.control_behavior, ControlBehavior::Reject);
    }

    #[test]
    fn validity() {
        let bad_empty = Rule {
            threshold: 1.0,
            resource: "".into(),
            ..Default::default()
        };
        let bad_negative = Rule {
            threshold: -1.9,
            resource: "test".into(),
            ..Default::default()
        };
        let bad_chain = Rule {
            threshold: 5.0,
            resource: "test".into(),
            relation_strategy: RelationStrategy::Chain,
            ..Default::default()
        };
        let bad_warm_up = Rule {
            threshold: 5.0,
            resource: "test".into(),
            control_behavior: ControlBehavior::WarmUp,
            warm_up_period_sec: 0,
            ..Default::default()
        };
        let good_warm_up = Rule {
            threshold: 10.0,
            resource: "test".into(),
            control_behavior: ControlBehavior::WarmUpThrottling,
            warm_up_period_sec: 10,
            ..Default::default()
        };

        assert!(bad_empty.is_valid().is_err());
        assert!(bad_negative.is_valid().is_err());
        assert!(bad_chain.is_valid().is_err());
        assert!(bad_warm_up.is_valid().is_err());
        assert!(good_warm_up.is_valid().is_ok());
    }

    #[test]
    fn json_roundtrip() {
        let rule = Rule {
            resource: "abc".into(),
            threshold: 100.0,
            control_behavior: ControlBehavior::Throttling,
            max_queueing_time_ms: 2000,
            ..Default::default()
        };
        let text = serde_json::to_string(&rule).unwrap();
        let parsed: Rule = serde_json::from_str(&text).unwrap();
        assert_eq!(rule, parsed);
    }
}
