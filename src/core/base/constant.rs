/// Name of the context created implicitly when an entry is built without
/// an explicitly entered context.
pub const DEFAULT_CONTEXT_NAME: &str = "sentinel_default_context";

/// Origin selector matching every caller.
pub const LIMIT_APP_DEFAULT: &str = "default";
/// Origin selector matching every caller without a dedicated rule.
pub const LIMIT_APP_OTHER: &str = "other";

/// Resources beyond this amount are admitted but not statistically tracked.
pub const DEFAULT_MAX_RESOURCE_AMOUNT: usize = 6000;
/// Upper bound on the amount of distinct context names per process.
pub const DEFAULT_MAX_CONTEXT_NAME_AMOUNT: usize = 2000;

// realtime window: 1 s spread over 2 buckets
pub const DEFAULT_SAMPLE_COUNT: u32 = 2;
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

// minute-level window: 60 s spread over 60 buckets
pub const DEFAULT_SAMPLE_COUNT_TOTAL: u32 = 60;
pub const DEFAULT_INTERVAL_MS_TOTAL: u32 = 60000;

/// Round trips above this value (ms) are clamped before being recorded.
pub const DEFAULT_STATISTIC_MAX_RT: u64 = 4900;

pub const DEFAULT_WARM_UP_COLD_FACTOR: u32 = 3;
pub const DEFAULT_WARM_UP_PERIOD_SEC: u32 = 10;
pub const DEFAULT_MAX_QUEUEING_TIME_MS: u32 = 500;

pub const SLOT_INIT: usize = 8;
