use super::*;
use crate::{base::GuardRule, logging, utils};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

pub type RuleMap = HashMap<MetricType, Vec<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: RwLock<RuleMap> = RwLock::new(RuleMap::new());
    static ref CURRENT_RULES: Mutex<Vec<Arc<Rule>>> = Mutex::new(Vec::new());
}

/// `get_rules` returns all the rules of the global `RULE_MAP`.
// This func acquires a read lock on the global `RULE_MAP`,
// please release the lock before calling this func
pub fn get_rules() -> Vec<Arc<Rule>> {
    let rule_map = RULE_MAP.read().unwrap();
    rule_map.values().flatten().cloned().collect()
}

pub fn append_rule(rule: Arc<Rule>) -> bool {
    if RULE_MAP
        .read()
        .unwrap()
        .get(&rule.metric_type)
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
                .entry(rule.metric_type)
                .or_default()
                .push(Arc::clone(&rule));
            CURRENT_RULES.lock().unwrap().push(rule);
            true
        }
        Err(err) => {
            logging::warn!(
                "[System append_rule] Ignoring invalid rule {:?}, reason: {:?}",
                rule,
                err
            );
            false
        }
    }
}

/// `load_rules` loads the given system rules, replacing all previous rules.
// This func acquires the lock on the global `CURRENT_RULES`,
// please release the lock before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut current_rules = CURRENT_RULES.lock().unwrap();
    if *current_rules == rules {
        logging::info!(
            "[System] Load rules is the same with current rules, so ignore load operation."
        );
        return;
    }

    let m = build_rule_map(rules.clone());

    let start = utils::curr_time_nanos();
    let mut rule_map = RULE_MAP.write().unwrap();
    *rule_map = m;

    logging::debug!(
        "[System load_rules] Time statistic(ns) for updating system rule, timeCost {:?}",
        utils::curr_time_nanos() - start
    );
    logging::info!("[SystemRuleManager] System rules loaded, rules {:?}", rule_map);
    *current_rules = rules;
}

/// `clear_rules` clears all the previous rules.
pub fn clear_rules() {
    CURRENT_RULES.lock().unwrap().clear();
    RULE_MAP.write().unwrap().clear();
}

fn build_rule_map(rules: Vec<Arc<Rule>>) -> RuleMap {
    let mut m = RuleMap::new();
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[System build_rule_map] Ignoring invalid system rule, rule: {:?}, error: {:?}",
                rule,
                err
            );
            continue;
        }
        m.entry(rule.metric_type).or_default().push(rule);
    }
    m
}
