use super::breaker::BreakerStrategy;
use crate::{base::GuardRule, logging, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub const DEFAULT_MIN_REQUEST_AMOUNT: u64 = 5;
pub const DEFAULT_STAT_INTERVAL_MS: u32 = 1000;

/// Rule encompasses the fields of a circuit breaking rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique id
    pub id: String,
    /// resource name
    pub resource: String,
    pub strategy: BreakerStrategy,
    /// `retry_timeout_ms` represents the recovery timeout (in milliseconds)
    /// before the circuit breaker opens. During the open period no requests
    /// are permitted until the timeout has elapsed, after which the breaker
    /// transforms to half-open and admits one probe request.
    pub retry_timeout_ms: u32,
    /// minimum number of requests (in an active statistic window) that can
    /// trigger circuit breaking
    pub min_request_amount: u64,
    /// statistic window length of the breaker (in ms)
    pub stat_interval_ms: u32,
    /// bucket count of the statistic sliding window; it must evenly divide
    /// `stat_interval_ms`, otherwise it is replaced by 1
    pub stat_sliding_window_bucket_count: u32,
    /// an invocation whose response time exceeds this value (in ms) counts
    /// as a slow request; only meaningful for `SlowRequestRatio`
    pub max_allowed_rt_ms: u64,
    /// the trigger threshold: the max slow request ratio for
    /// `SlowRequestRatio`, the max error ratio for `ErrorRatio`, the max
    /// error count for `ErrorCount`
    pub threshold: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            strategy: BreakerStrategy::default(),
            retry_timeout_ms: 0,
            min_request_amount: DEFAULT_MIN_REQUEST_AMOUNT,
            stat_interval_ms: DEFAULT_STAT_INTERVAL_MS,
            stat_sliding_window_bucket_count: 0,
            max_allowed_rt_ms: 0,
            threshold: 1.0,
        }
    }
}

impl Rule {
    pub fn get_rule_stat_sliding_window_bucket_count(&self) -> u32 {
        let mut bucket_count = self.stat_sliding_window_bucket_count;
        if bucket_count == 0 || self.stat_interval_ms % bucket_count != 0 {
            bucket_count = 1
        }
        bucket_count
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
        if self.stat_interval_ms == 0 {
            return Err(Error::msg("invalid stat_interval_ms"));
        }
        if self.retry_timeout_ms == 0 {
            return Err(Error::msg("invalid retry_timeout_ms"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("invalid threshold"));
        }
        if self.strategy != BreakerStrategy::ErrorCount && self.threshold > 1.0 {
            return Err(Error::msg(format!(
                "invalid {:?} ratio threshold (valid range: [0.0, 1.0])",
                self.strategy
            )));
        }
        if self.stat_sliding_window_bucket_count != 0
            && self.stat_interval_ms % self.stat_sliding_window_bucket_count != 0
        {
            logging::warn!("[CircuitBreaker is_valid] The following must be true: stat_interval_ms % stat_sliding_window_bucket_count == 0. stat_sliding_window_bucket_count will be replaced by 1, rule {:?}", self);
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.strategy == other.strategy
            && self.retry_timeout_ms == other.retry_timeout_ms
            && self.min_request_amount == other.min_request_amount
            && self.stat_interval_ms == other.stat_interval_ms
            && self.stat_sliding_window_bucket_count == other.stat_sliding_window_bucket_count
            && match self.strategy {
                BreakerStrategy::SlowRequestRatio => {
                    self.max_allowed_rt_ms == other.max_allowed_rt_ms
                        && self.threshold == other.threshold
                }
                _ => self.threshold == other.threshold,
            }
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
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
        assert_eq!(rule.min_request_amount, 5);
        assert_eq!(rule.stat_interval_ms, 1000);
        assert!((rule.threshold - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bucket_count_fallback() {
        let rule = Rule {
            stat_interval_ms: 1000,
            stat_sliding_window_bucket_count: 3,
            ..Default::default()
        };
        assert_eq!(rule.get_rule_stat_sliding_window_bucket_count(), 1);
        let rule = Rule {
            stat_interval_ms: 1000,
            stat_sliding_window_bucket_count: 2,
            ..Default::default()
        };
        assert_eq!(rule.get_rule_stat_sliding_window_bucket_count(), 2);
    }

    #[test]
    fn validity() {
        let bad_resource = Rule {
            retry_timeout_ms: 3000,
            ..Default::default()
        };
        assert!(bad_resource.is_valid().is_err());

        let bad_retry = Rule {
            resource: "abc".into(),
            retry_timeout_ms: 0,
            ..Default::default()
        };
        assert!(bad_retry.is_valid().is_err());

        let bad_ratio = Rule {
            resource: "abc".into(),
            retry_timeout_ms: 3000,
            strategy: BreakerStrategy::ErrorRatio,
            threshold: 1.5,
            ..Default::default()
        };
        assert!(bad_ratio.is_valid().is_err());

        let good_count = Rule {
            resource: "abc".into(),
            retry_timeout_ms: 3000,
            strategy: BreakerStrategy::ErrorCount,
            threshold: 10.0,
            ..Default::default()
        };
        assert!(good_count.is_valid().is_ok());
    }
}
