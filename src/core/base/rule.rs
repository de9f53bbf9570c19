use crate::Result;
use std::fmt;

/// Common capability of all rule kinds. Rule managers rely on `is_valid`
/// to drop malformed rules on load.
pub trait GuardRule: fmt::Debug + Send + Sync {
    fn resource_name(&self) -> String;
    fn is_valid(&self) -> Result<()> {
        Ok(())
    }
}
