//!  Circuit Breaker State Machine:
//!
//! ```text
//!                                switch to open based on rule
//!
//!             +-----------------------------------------------------------------------+
//!             |                                                                       |
//!             |                                                                       v
//!     +----------------+                   +----------------+      Probe      +----------------+
//!     |                |                   |                |<----------------|                |
//!     |                |   Probe succeed   |                |                 |                |
//!     |     Closed     |<------------------|    HalfOpen    |                 |      Open      |
//!     |                |                   |                |   Probe failed  |                |
//!     |                |                   |                +---------------->|                |
//!     +----------------+                   +----------------+                 +----------------+
//! ```
//!

/// Error count
pub mod error_count;
/// Error ratio
pub mod error_ratio;
/// Slow round trip time
pub mod slow_request;
pub mod stat;

pub use error_count::*;
pub use error_ratio::*;
pub use slow_request::*;
pub use stat::*;

use super::rule::Rule;
use super::rule_manager::state_change_listeners;
use crate::{
    base::{EntryContext, EntryContextPtr, GuardEntry, Snapshot},
    logging, utils, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc,
};

/// `BreakerStrategy` represents the trigger metric of a circuit breaker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum BreakerStrategy {
    /// open when the ratio of requests slower than `max_allowed_rt_ms`
    /// reaches the threshold
    SlowRequestRatio,
    /// open when the error ratio reaches the threshold
    ErrorRatio,
    /// open when the error amount reaches the threshold
    ErrorCount,
}

impl Default for BreakerStrategy {
    fn default() -> BreakerStrategy {
        BreakerStrategy::SlowRequestRatio
    }
}

/// States of the circuit breaker state machine
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum State {
    Closed,
    HalfOpen,
    Open,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

impl From<u8> for State {
    fn from(v: u8) -> Self {
        match v {
            1 => State::HalfOpen,
            2 => State::Open,
            _ => State::Closed,
        }
    }
}

impl From<State> for u8 {
    fn from(s: State) -> Self {
        match s {
            State::Closed => 0,
            State::HalfOpen => 1,
            State::Open => 2,
        }
    }
}

/// The state cell of one breaker. Every transition is a single CAS, so at
/// most one observer performs each transition.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn get(&self) -> State {
        self.0.load(Ordering::SeqCst).into()
    }

    pub fn set(&self, state: State) {
        self.0.store(state.into(), Ordering::SeqCst);
    }

    pub fn cas(&self, from: State, to: State) -> bool {
        self.0
            .compare_exchange(from.into(), to.into(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// `StateChangeListener` listens on the state change events of every breaker.
pub trait StateChangeListener: Sync + Send {
    /// Triggered when a breaker transforms to Closed. The rule is shared
    /// with the breaker; changing it does not affect the breaker.
    fn on_transform_to_closed(&self, prev: State, rule: Arc<Rule>);

    /// Triggered when a breaker transforms to Open. The "snapshot" is the
    /// triggered metric value at the moment of the transformation.
    fn on_transform_to_open(&self, prev: State, rule: Arc<Rule>, snapshot: Option<Arc<Snapshot>>);

    /// Triggered when a breaker transforms to HalfOpen.
    fn on_transform_to_half_open(&self, prev: State, rule: Arc<Rule>);
}

/// `CircuitBreakerTrait` is the basic trait of circuit breakers.
pub trait CircuitBreakerTrait: Send + Sync {
    /// `breaker` returns the associated inner breaker base.
    fn breaker(&self) -> &BreakerBase;

    /// `stat` returns the associated outcome window.
    fn stat(&self) -> &Arc<OutcomeLeapArray>;

    /// `try_pass` acquires the permission of an invocation based on the
    /// state machine. An open breaker whose recovery timeout elapsed admits
    /// exactly one probe by winning the Open -> HalfOpen CAS.
    fn try_pass(&self, ctx: &EntryContext) -> bool {
        match self.current_state() {
            State::Closed => true,
            State::Open => {
                self.breaker().retry_timeout_arrived() && self.breaker().from_open_to_half_open(ctx)
            }
            State::HalfOpen => false,
        }
    }

    #[inline]
    fn next_retry_timestamp_ms(&self) -> u64 {
        self.breaker()
            .next_retry_timestamp_ms
            .load(Ordering::SeqCst)
    }

    /// `bound_rule` returns the associated circuit breaking rule.
    #[inline]
    fn bound_rule(&self) -> &Arc<Rule> {
        self.breaker().bound_rule()
    }

    #[inline]
    fn set_state(&self, state: State) {
        self.breaker().state.set(state);
    }

    /// `current_state` returns the current state of the circuit breaker.
    #[inline]
    fn current_state(&self) -> State {
        self.breaker().state.get()
    }

    /// `on_request_complete` records a completed request with the given
    /// response time and error (if present), and handles the state
    /// transformation. It is called only when a passed invocation finishes.
    fn on_request_complete(&self, rt: u64, error: &Option<Error>);

    /// the underlying metric is internally mutable, hence `&self`
    fn reset_metric(&self) {
        self.stat().clear();
    }
}

/// BreakerBase encompasses the common fields of circuit breakers.
#[derive(Debug)]
pub struct BreakerBase {
    pub(crate) rule: Arc<Rule>,
    /// recovery timeout (ms); during the open period no requests are
    /// permitted until it has elapsed
    pub(crate) retry_timeout_ms: u32,
    /// the time after which the breaker may probe
    pub(crate) next_retry_timestamp_ms: AtomicU64,
    /// shared with the probe-rollback exit hook
    pub(crate) state: Arc<StateCell>,
}

impl BreakerBase {
    pub fn new(rule: Arc<Rule>) -> Self {
        let retry_timeout_ms = rule.retry_timeout_ms;
        BreakerBase {
            rule,
            retry_timeout_ms,
            next_retry_timestamp_ms: AtomicU64::new(0),
            state: Arc::new(StateCell::default()),
        }
    }

    pub fn bound_rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn retry_timeout_arrived(&self) -> bool {
        utils::curr_time_millis() >= self.next_retry_timestamp_ms.load(Ordering::SeqCst)
    }

    pub fn update_next_retry_timestamp(&self) {
        self.next_retry_timestamp_ms.store(
            utils::curr_time_millis() + self.retry_timeout_ms as u64,
            Ordering::SeqCst,
        );
    }

    /// Closed -> Open. Returns true only if the caller won the transition.
    pub fn from_closed_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        if !self.state.cas(State::Closed, State::Open) {
            return false;
        }
        self.update_next_retry_timestamp();
        let listeners = state_change_listeners().lock().unwrap();
        for listener in &*listeners {
            listener.on_transform_to_open(
                State::Closed,
                Arc::clone(&self.rule),
                Some(Arc::clone(&snapshot)),
            );
        }
        true
    }

    /// Open -> HalfOpen. Returns true only if the caller won the
    /// transition; the winner's entry becomes the single probe. An exit
    /// hook rolls the breaker back to Open when the probe entry itself is
    /// blocked by a later slot of the chain.
    pub fn from_open_to_half_open(&self, ctx: &EntryContext) -> bool {
        if !self.state.cas(State::Open, State::HalfOpen) {
            return false;
        }
        {
            let listeners = state_change_listeners().lock().unwrap();
            for listener in &*listeners {
                listener.on_transform_to_half_open(State::Open, Arc::clone(&self.rule));
            }
        }
        match ctx.entry().and_then(|e| e.upgrade()) {
            Some(entry) => {
                let rule = Arc::clone(&self.rule);
                let state = Arc::clone(&self.state);
                let mut entry = entry.write().unwrap();
                entry.when_exit(Box::new(
                    move |_entry: &GuardEntry, ctx: EntryContextPtr| -> Result<()> {
                        let blocked = ctx.read().unwrap().is_blocked();
                        if blocked && state.cas(State::HalfOpen, State::Open) {
                            let listeners = state_change_listeners().lock().unwrap();
                            for listener in &*listeners {
                                listener.on_transform_to_open(
                                    State::HalfOpen,
                                    Arc::clone(&rule),
                                    Some(Arc::new(1.0)),
                                );
                            }
                        }
                        Ok(())
                    },
                ));
            }
            None => {
                logging::error!(
                    "Entry is None in BreakerBase::from_open_to_half_open(), rule: {:?}",
                    self.rule,
                );
            }
        }
        true
    }

    /// HalfOpen -> Open, after a failed probe.
    pub fn from_half_open_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        if !self.state.cas(State::HalfOpen, State::Open) {
            return false;
        }
        self.update_next_retry_timestamp();
        let listeners = state_change_listeners().lock().unwrap();
        for listener in &*listeners {
            listener.on_transform_to_open(
                State::HalfOpen,
                Arc::clone(&self.rule),
                Some(Arc::clone(&snapshot)),
            );
        }
        true
    }

    /// HalfOpen -> Closed, after a successful probe.
    pub fn from_half_open_to_closed(&self) -> bool {
        if !self.state.cas(State::HalfOpen, State::Closed) {
            return false;
        }
        let listeners = state_change_listeners().lock().unwrap();
        for listener in &*listeners {
            listener.on_transform_to_closed(State::HalfOpen, Arc::clone(&self.rule));
        }
        true
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::base::{ResourceType, ResourceWrapper, SlotChain, TrafficType};
    use std::sync::RwLock;

    pub(crate) fn probe_rule(strategy: BreakerStrategy) -> Arc<Rule> {
        Arc::new(Rule {
            resource: "abc".into(),
            strategy,
            retry_timeout_ms: 3000,
            min_request_amount: 10,
            stat_interval_ms: 10000,
            max_allowed_rt_ms: 50,
            threshold: 0.5,
            ..Default::default()
        })
    }

    pub(crate) fn ctx_with_entry() -> EntryContextPtr {
        let sc = Arc::new(SlotChain::new());
        let mut ctx = EntryContext::new();
        let res = ResourceWrapper::new("abc".into(), ResourceType::Common, TrafficType::Inbound);
        ctx.set_resource(res);
        let ctx = Arc::new(RwLock::new(ctx));
        let entry = Arc::new(RwLock::new(GuardEntry::new(Arc::clone(&ctx), sc)));
        entry.write().unwrap().set_weak(Arc::downgrade(&entry));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));
        ctx
    }

    #[test]
    fn state_cell_cas() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), State::Closed);
        assert!(cell.cas(State::Closed, State::Open));
        assert!(!cell.cas(State::Closed, State::HalfOpen));
        assert_eq!(cell.get(), State::Open);
    }

    #[test]
    fn closed_breaker_passes() {
        let breaker = SlowRtBreaker::new(probe_rule(BreakerStrategy::SlowRequestRatio));
        assert!(breaker.try_pass(&EntryContext::new()));
    }

    #[test]
    fn open_breaker_probes_after_timeout() {
        let breaker = SlowRtBreaker::new(probe_rule(BreakerStrategy::SlowRequestRatio));
        breaker.set_state(State::Open);
        // retry timestamp is still 0, so the timeout has arrived
        let ctx = ctx_with_entry();
        let token = breaker.try_pass(&ctx.read().unwrap());
        assert!(token);
        assert_eq!(breaker.current_state(), State::HalfOpen);
        // a second caller must not get a probe
        assert!(!breaker.try_pass(&ctx.read().unwrap()));
    }

    #[test]
    fn open_breaker_blocks_before_timeout() {
        let breaker = SlowRtBreaker::new(probe_rule(BreakerStrategy::SlowRequestRatio));
        breaker.set_state(State::Open);
        breaker.breaker().update_next_retry_timestamp();
        let ctx = ctx_with_entry();
        assert!(!breaker.try_pass(&ctx.read().unwrap()));
        assert_eq!(breaker.current_state(), State::Open);
    }

    #[test]
    fn half_open_probe_outcomes() {
        let breaker = SlowRtBreaker::new(probe_rule(BreakerStrategy::SlowRequestRatio));

        // probe fails: slow response reopens the breaker
        breaker.set_state(State::HalfOpen);
        breaker.on_request_complete(100, &None);
        assert_eq!(breaker.current_state(), State::Open);

        // probe succeeds: breaker closes and the metric resets
        breaker.set_state(State::HalfOpen);
        breaker.on_request_complete(10, &None);
        assert_eq!(breaker.current_state(), State::Closed);
    }
}
