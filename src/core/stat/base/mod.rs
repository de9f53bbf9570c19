pub mod bucket_leap_array;
pub mod leap_array;
pub mod metric_bucket;

pub use bucket_leap_array::*;
pub use leap_array::*;
pub use metric_bucket::*;
