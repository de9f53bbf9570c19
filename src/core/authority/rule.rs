use crate::base::GuardRule;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Whether `limit_app` enumerates the allowed or the denied origins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum AuthorityStrategy {
    WhiteList,
    BlackList,
}

impl Default for AuthorityStrategy {
    fn default() -> AuthorityStrategy {
        AuthorityStrategy::WhiteList
    }
}

/// Rule describes an origin allow/deny policy of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: String,
    pub resource: String,
    /// comma-separated origin names the strategy applies to
    pub limit_app: String,
    pub strategy: AuthorityStrategy,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            limit_app: String::default(),
            strategy: AuthorityStrategy::default(),
        }
    }
}

impl Rule {
    pub fn contains_origin(&self, origin: &str) -> bool {
        self.limit_app
            .split(',')
            .map(str::trim)
            .any(|app| app == origin)
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
        if self.limit_app.trim().is_empty() {
            return Err(Error::msg("empty limit_app"));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.limit_app == other.limit_app
            && self.strategy == other.strategy
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
