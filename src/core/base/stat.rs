//! Stat
//!
use crate::utils::AsAny;
use enum_map::Enum;
use std::any::Any;
use std::fmt;

/// The events recorded per bucket.
/// pass + block == total attempts; complete counts finished passed calls.
#[derive(Debug, Clone, Copy, Enum)]
pub enum MetricEvent {
    /// rule checks passed
    Pass,
    /// rule checks blocked
    Block,
    /// passed invocation finished (exit reached)
    Complete,
    /// business error, reported via `trace_error`, feeds the circuit breakers
    Error,
    /// round trip time sum, unit is millisecond
    Rt,
    /// tokens borrowed from a future window by prioritized requests
    OccupiedPass,
}

pub trait ReadStat: Send + Sync + fmt::Debug {
    fn qps(&self, _event: MetricEvent) -> f64 {
        0f64
    }
    fn qps_previous(&self, _event: MetricEvent) -> f64 {
        0f64
    }
    fn sum(&self, _event: MetricEvent) -> u64 {
        0u64
    }
    fn min_rt(&self) -> f64 {
        0f64
    }
    fn avg_rt(&self) -> f64 {
        0f64
    }
}

pub trait WriteStat: Send + Sync + fmt::Debug {
    fn add_count(&self, _event: MetricEvent, _count: u64) {}
}

pub trait ConcurrencyStat: Send + Sync + fmt::Debug {
    fn current_concurrency(&self) -> u32;
    fn increase_concurrency(&self);
    fn decrease_concurrency(&self);
}

/// StatNode holds real-time statistics for a resource seen from one
/// aggregation scope (per entry path, per resource or per origin).
pub trait StatNode: ReadStat + WriteStat + ConcurrencyStat + Any + AsAny {}

// expose the mocks in crate for testing usage
#[cfg(test)]
pub(crate) use test::MockStatNode;

#[cfg(test)]
mod test {
    use super::*;
    use mockall::predicate::*;
    use mockall::*;

    mock! {
        #[derive(Debug)]
        pub(crate) StatNode {}
        impl ReadStat for StatNode {
            fn qps(&self, _event: MetricEvent) -> f64;
            fn qps_previous(&self, _event: MetricEvent) -> f64;
            fn sum(&self, _event: MetricEvent) -> u64;
            fn min_rt(&self) -> f64;
            fn avg_rt(&self) -> f64;
        }
        impl WriteStat for StatNode {
            fn add_count(&self, _event: MetricEvent, _count: u64);
        }
        impl ConcurrencyStat for StatNode {
            fn current_concurrency(&self) -> u32;
            fn increase_concurrency(&self);
            fn decrease_concurrency(&self);
        }
        impl StatNode for StatNode {}
    }
}
