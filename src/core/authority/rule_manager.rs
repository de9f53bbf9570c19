use super::*;
use crate::{base::GuardRule, logging};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: RwLock<RuleMap> = RwLock::new(RuleMap::new());
}

pub fn get_rules_of_resource(res: &String) -> Vec<Arc<Rule>> {
    RULE_MAP
        .read()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    let rule_map = RULE_MAP.read().unwrap();
    rule_map.values().flatten().cloned().collect()
}

/// `load_rules` loads the given authority rules, replacing all previous
/// rules atomically. Invalid rules are dropped with a warning.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        match rule.is_valid() {
            Ok(_) => rule_map.entry(rule.resource.clone()).or_default().push(rule),
            Err(err) => logging::warn!(
                "[Authority load_rules] Ignoring invalid authority rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }
    let mut global_rule_map = RULE_MAP.write().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[Authority] Load rules is the same with current rules, so ignore load operation."
        );
        return false;
    }
    *global_rule_map = rule_map;
    drop(global_rule_map);
    logging::info!("[AuthorityRuleManager] Authority rules loaded");
    true
}

/// `load_rules_of_resource` replaces the rules of one resource only.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> bool {
    let mut global_rule_map = RULE_MAP.write().unwrap();
    if rules.is_empty() {
        global_rule_map.remove(res);
        return true;
    }
    let mut valid_rules = Vec::with_capacity(rules.len());
    for rule in rules {
        match rule.is_valid() {
            Ok(_) => valid_rules.push(rule),
            Err(err) => logging::warn!(
                "[Authority load_rules_of_resource] Ignoring invalid authority rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }
    global_rule_map.insert(res.clone(), valid_rules);
    true
}

pub fn clear_rules() {
    RULE_MAP.write().unwrap().clear();
}

/// Appends a single rule to its resource; an already-present equal rule is
/// a no-op.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    if RULE_MAP
        .read()
        .unwrap()
        .get(&rule.resource)
        .map(|rules| rules.contains(&rule))
        .unwrap_or(false)
    {
        return false;
    }
    match rule.is_valid() {
        Ok(_) => {
            RULE_MAP
                .write()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .push(rule);
            true
        }
        Err(err) => {
            logging::warn!(
                "[Authority append_rule] Ignoring invalid authority rule {:?}, reason: {:?}",
                rule,
                err
            );
            false
        }
    }
}
