//! Resource/Traffic Wrappers
use serde::{Deserialize, Serialize};
use std::fmt;

/// ResourceType represents the classification of the resources
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Common,
    Web,
    Rpc,
    ApiGateway,
    DbSql,
    Cache,
    Mq,
}

impl Default for ResourceType {
    fn default() -> Self {
        ResourceType::Common
    }
}

/// TrafficType describes the traffic type: Inbound or Outbound.
/// Only inbound traffic is subject to the system adaptive protection rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficType {
    Inbound,
    Outbound,
}

impl Default for TrafficType {
    fn default() -> Self {
        TrafficType::Outbound
    }
}

/// ResourceWrapper represents the invocation
#[derive(Debug, Clone, Default)]
pub struct ResourceWrapper {
    /// global unique resource name
    name: String,
    /// resource classification
    classification: ResourceType,
    /// Inbound or Outbound
    traffic_type: TrafficType,
}

impl fmt::Display for ResourceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceWrapper{{name={}, trafficType={:?}, classification={:?}}}",
            self.name, self.traffic_type, self.classification
        )
    }
}

impl ResourceWrapper {
    pub fn new(name: String, classification: ResourceType, traffic_type: TrafficType) -> Self {
        Self {
            name,
            classification,
            traffic_type,
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn classification(&self) -> ResourceType {
        self.classification
    }

    pub fn traffic_type(&self) -> TrafficType {
        self.traffic_type
    }
}
