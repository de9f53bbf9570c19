use super::MetricTrait;
use crate::utils::curr_time_millis;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// An untouched slot; real window starts are unix-millisecond timestamps,
/// so zero can never collide with one.
const EMPTY_STAMP: u64 = 0;

/// One slot of the ring: the aligned start timestamp of the span the slot
/// currently covers, plus the metric payload. The payload is atomic, so
/// slots are never handed out by value; queries fold over borrowed slots.
#[derive(Debug, Default)]
pub struct WindowSlot<T: MetricTrait> {
    start: AtomicU64,
    metric: T,
}

impl<T: MetricTrait> WindowSlot<T> {
    pub fn start(&self) -> u64 {
        self.start.load(Ordering::SeqCst)
    }

    pub fn metric(&self) -> &T {
        &self.metric
    }

    /// A slot counts toward the sliding window while its span begins no
    /// earlier than `interval` before `now`.
    fn expired(&self, now: u64, interval: u64) -> bool {
        let start = self.start();
        start == EMPTY_STAMP || (now > start && now - start > interval)
    }
}

/// A fixed ring of `slot_count` slots covering a sliding window of
/// `interval_ms`, each slot spanning `span_ms = interval_ms / slot_count`.
/// The slot of a wall-clock instant is `(t / span_ms) % slot_count`; once
/// the ring wraps around, the stale slot is wiped and republished under a
/// short recycle guard so no query ever observes half-reset counters.
#[derive(Debug)]
pub struct LeapArray<T: MetricTrait> {
    span_ms: u32,
    slot_count: u32,
    interval_ms: u32,
    slots: Box<[WindowSlot<T>]>,
    /// serializes stale-slot recycling; the hot path takes it only in the
    /// instant a slot flips over to a new cycle
    recycle: Mutex<()>,
}

impl<T: MetricTrait> LeapArray<T> {
    pub fn new(slot_count: u32, interval_ms: u32) -> Result<Self> {
        if slot_count == 0 || interval_ms % slot_count != 0 {
            return Err(Error::msg(
                "the window interval must be evenly divided by the slot count",
            ));
        }
        let slots = (0..slot_count)
            .map(|_| WindowSlot::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(LeapArray {
            span_ms: interval_ms / slot_count,
            slot_count,
            interval_ms,
            slots,
            recycle: Mutex::new(()),
        })
    }

    pub fn span_ms(&self) -> u32 {
        self.span_ms
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// start timestamp of the span containing `t`
    pub(crate) fn align(&self, t: u64) -> u64 {
        t - t % (self.span_ms as u64)
    }

    pub(crate) fn idx_of(&self, t: u64) -> usize {
        ((t / self.span_ms as u64) % self.slot_count as u64) as usize
    }

    /// Resolves the slot covering `now`, recycling it first if it still
    /// carries the counters of an elapsed cycle.
    pub fn slot_for(&self, now: u64) -> Result<&WindowSlot<T>> {
        let target = self.align(now);
        let slot = &self.slots[self.idx_of(now)];
        loop {
            let seen = slot.start();
            if seen == target {
                return Ok(slot);
            } else if seen == EMPTY_STAMP {
                // claim the untouched slot; its payload is already zeroed,
                // so winning the CAS is all that is needed
                if slot
                    .start
                    .compare_exchange(EMPTY_STAMP, target, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    return Ok(slot);
                }
            } else if seen < target {
                // the ring wrapped around; wipe the counters before
                // publishing the new start, so a concurrent query either
                // sees the complete old cycle (and discards it as expired)
                // or the zeroed new one
                let _guard = self.recycle.lock().unwrap();
                if slot.start() == seen {
                    slot.metric.reset();
                    slot.start.store(target, Ordering::SeqCst);
                }
            } else {
                return Err(Error::msg(
                    "timestamp behind the current window, cannot locate slot",
                ));
            }
        }
    }

    pub fn current_slot(&self) -> Result<&WindowSlot<T>> {
        self.slot_for(curr_time_millis())
    }

    /// The slot exactly one span before `now`, if its data is still from
    /// that span (`None` once it was recycled or never written).
    pub fn previous_slot(&self, now: u64) -> Option<&WindowSlot<T>> {
        let prev = now.checked_sub(self.span_ms as u64)?;
        let slot = &self.slots[self.idx_of(prev)];
        if slot.start() == self.align(prev) {
            Some(slot)
        } else {
            None
        }
    }

    /// Folds `f` over the metrics of every slot still inside the sliding
    /// window ending at `now`.
    pub fn fold_valid<R>(&self, now: u64, init: R, mut f: impl FnMut(R, &T) -> R) -> R {
        let mut acc = init;
        for slot in self.slots.iter() {
            if !slot.expired(now, self.interval_ms as u64) {
                acc = f(acc, slot.metric());
            }
        }
        acc
    }

    /// Empties every slot, as if the array was freshly created.
    pub fn clear(&self) {
        let _guard = self.recycle.lock().unwrap();
        for slot in self.slots.iter() {
            slot.start.store(EMPTY_STAMP, Ordering::SeqCst);
            slot.metric.reset();
        }
    }
}
