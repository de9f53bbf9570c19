use crate::base::GuardRule;
use crate::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// PropertyConverter converts the raw source payload into the rule vector.
/// An empty or absent payload converts to an empty vector.
pub type PropertyConverter<P> = fn(src: &str) -> Result<Vec<Arc<P>>>;

/// `rule_json_array_parser` provides JSON as the default serialization for
/// a list of rules.
pub fn rule_json_array_parser<P: GuardRule + DeserializeOwned>(src: &str) -> Result<Vec<Arc<P>>> {
    let rules: Vec<P> = serde_json::from_str(src)?;
    Ok(rules.into_iter().map(Arc::new).collect())
}

/// PropertyUpdater pushes the converted rules to the downstream rule
/// manager, returning whether a real update happened.
pub type PropertyUpdater<P> = fn(rules: Vec<Arc<P>>) -> Result<bool>;

pub trait PropertyHandler<P: GuardRule>: Send + Sync {
    /// check whether the source is consistent with the last update
    fn is_property_consistent(&mut self, rules: &[Arc<P>]) -> bool;
    /// handle the raw payload of the source
    fn handle(&mut self, src: Option<&String>) -> Result<bool>;
    /// push already-converted rules downstream
    fn load(&mut self, rules: Vec<Arc<P>>) -> Result<bool>;
}

/// DefaultPropertyHandler encapsulates the converter and updater of one
/// property type. It drops updates identical to the last seen rule set so
/// config sources may push redundantly.
pub struct DefaultPropertyHandler<P: GuardRule + PartialEq + DeserializeOwned> {
    last_update_property: Option<Vec<Arc<P>>>,
    converter: PropertyConverter<P>,
    updater: PropertyUpdater<P>,
}

impl<P: GuardRule + PartialEq + DeserializeOwned> DefaultPropertyHandler<P> {
    pub fn new(converter: PropertyConverter<P>, updater: PropertyUpdater<P>) -> Arc<Self> {
        Arc::new(Self {
            converter,
            updater,
            last_update_property: None,
        })
    }
}

impl<P: GuardRule + PartialEq + DeserializeOwned> PropertyHandler<P>
    for DefaultPropertyHandler<P>
{
    fn is_property_consistent(&mut self, rules: &[Arc<P>]) -> bool {
        if self.last_update_property.is_some()
            && self.last_update_property.as_ref().unwrap() == rules
        {
            true
        } else {
            self.last_update_property = Some(rules.to_vec());
            false
        }
    }

    fn handle(&mut self, src: Option<&String>) -> Result<bool> {
        match src {
            Some(src) => {
                let rules = (self.converter)(src)?;
                let is_the_same = self.is_property_consistent(&rules);
                if is_the_same {
                    return Ok(false);
                }
                (self.updater)(rules)
            }
            None => (self.updater)(Vec::new()),
        }
    }

    fn load(&mut self, rules: Vec<Arc<P>>) -> Result<bool> {
        (self.updater)(rules)
    }
}
