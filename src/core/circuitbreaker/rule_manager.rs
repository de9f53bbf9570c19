use super::*;
use crate::{base::GuardRule, logging, utils};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;
pub type BreakerMap = HashMap<String, Vec<Arc<dyn CircuitBreakerTrait>>>;

lazy_static! {
    static ref STATE_CHANGE_LISTENERS: Mutex<Vec<Arc<dyn StateChangeListener>>> =
        Mutex::new(Vec::new());
    static ref BREAKER_MAP: RwLock<BreakerMap> = RwLock::new(BreakerMap::new());
    static ref BREAKER_RULES: RwLock<RuleMap> = RwLock::new(RuleMap::new());
}

pub fn state_change_listeners() -> &'static Mutex<Vec<Arc<dyn StateChangeListener>>> {
    &STATE_CHANGE_LISTENERS
}

pub fn register_state_change_listeners(listeners: Vec<Arc<dyn StateChangeListener>>) {
    STATE_CHANGE_LISTENERS.lock().unwrap().extend(listeners);
}

pub fn clear_state_change_listeners() {
    STATE_CHANGE_LISTENERS.lock().unwrap().clear();
}

fn new_breaker_of_rule(rule: Arc<Rule>) -> Arc<dyn CircuitBreakerTrait> {
    match rule.strategy {
        BreakerStrategy::SlowRequestRatio => Arc::new(SlowRtBreaker::new(rule)),
        BreakerStrategy::ErrorRatio => Arc::new(ErrorRatioBreaker::new(rule)),
        BreakerStrategy::ErrorCount => Arc::new(ErrorCountBreaker::new(rule)),
    }
}

/// `get_rules_of_resource` returns the rules of the specific resource.
// This func acquires a read lock on the global `BREAKER_RULES`,
// please release your write locks on it before calling this func
pub fn get_rules_of_resource(res: &String) -> Vec<Arc<Rule>> {
    BREAKER_RULES
        .read()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

/// `get_rules` returns all the rules.
pub fn get_rules() -> Vec<Arc<Rule>> {
    let breaker_rules = BREAKER_RULES.read().unwrap();
    breaker_rules.values().flatten().cloned().collect()
}

pub fn get_breakers_of_resource(res: &String) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    BREAKER_MAP
        .read()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

/// `clear_rules` clears all the previous rules and breakers.
pub fn clear_rules() {
    BREAKER_RULES.write().unwrap().clear();
    BREAKER_MAP.write().unwrap().clear();
}

/// Appends a single rule to its resource, building the matching breaker;
/// an already-present equal rule is a no-op.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    if BREAKER_RULES
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
            BREAKER_RULES
                .write()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .push(Arc::clone(&rule));
            BREAKER_MAP
                .write()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .push(new_breaker_of_rule(rule));
            true
        }
        Err(err) => {
            logging::warn!(
                "[CircuitBreaker append_rule] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
                rule,
                err
            );
            false
        }
    }
}

/// load_rules replaces the old rules with the given circuit breaking rules
/// atomically. Breakers are built fresh, so a changed rule starts over in
/// the Closed state with empty statistics. The returned `bool` indicates
/// whether the rule table changed.
// This func acquires the locks on the global `BREAKER_RULES` and
// `BREAKER_MAP`, please release your locks on them before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().push(rule);
    }

    let mut global_rules = BREAKER_RULES.write().unwrap();
    if *global_rules == rule_map {
        logging::info!(
            "[CircuitBreaker] Loaded rules is the same with current rules, so ignore load operation."
        );
        return false;
    }

    let mut valid_rules_map: RuleMap = HashMap::with_capacity(rule_map.len());
    for (res, rules) in &rule_map {
        let mut valid_rules = Vec::new();
        for rule in rules {
            match rule.is_valid() {
                Ok(_) => valid_rules.push(Arc::clone(rule)),
                Err(err) => logging::warn!(
                    "[CircuitBreaker load_rules] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
                    rule,
                    err
                ),
            }
        }
        if !valid_rules.is_empty() {
            valid_rules_map.insert(res.clone(), valid_rules);
        }
    }

    let start = utils::curr_time_nanos();
    let mut breaker_map = BREAKER_MAP.write().unwrap();
    let mut valid_breaker_map = BreakerMap::with_capacity(valid_rules_map.len());
    for (res, rules) in valid_rules_map.iter() {
        let breakers: Vec<Arc<dyn CircuitBreakerTrait>> = rules
            .iter()
            .map(|r| new_breaker_of_rule(Arc::clone(r)))
            .collect();
        valid_breaker_map.insert(res.clone(), breakers);
    }

    if valid_rules_map.is_empty() {
        logging::info!("[CircuitBreaker] Circuit breaking rules were cleared")
    } else {
        logging::info!(
            "[CircuitBreaker] Circuit breaking rules were loaded: {:?}",
            valid_rules_map.values()
        )
    }

    *global_rules = valid_rules_map;
    *breaker_map = valid_breaker_map;
    drop(global_rules);
    drop(breaker_map);
    logging::debug!(
        "[CircuitBreaker load_rules] Time statistic(ns) for updating circuit breaking rule, time cost {}",
        utils::curr_time_nanos() - start
    );
    true
}

/// `load_rules_of_resource` replaces the rules of one resource only.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> bool {
    let mut global_rules = BREAKER_RULES.write().unwrap();
    let mut breaker_map = BREAKER_MAP.write().unwrap();
    if rules.is_empty() {
        global_rules.remove(res);
        breaker_map.remove(res);
        logging::info!(
            "[CircuitBreaker] clear resource level rules, resource {}",
            res
        );
        return true;
    }
    if global_rules.get(res).map(|r| r == &rules).unwrap_or(false) {
        return false;
    }
    let mut valid_rules = Vec::with_capacity(rules.len());
    for rule in &rules {
        match rule.is_valid() {
            Ok(_) => valid_rules.push(Arc::clone(rule)),
            Err(err) => logging::warn!(
                "[CircuitBreaker load_rules_of_resource] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }
    let breakers: Vec<Arc<dyn CircuitBreakerTrait>> = valid_rules
        .iter()
        .map(|r| new_breaker_of_rule(Arc::clone(r)))
        .collect();
    global_rules.insert(res.clone(), valid_rules);
    breaker_map.insert(res.clone(), breakers);
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn breakers_follow_rules() {
        let res = String::from("cb_manager_res");
        let rule = Arc::new(Rule {
            resource: res.clone(),
            strategy: BreakerStrategy::ErrorCount,
            retry_timeout_ms: 3000,
            threshold: 10.0,
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![rule]);
        assert_eq!(get_breakers_of_resource(&res).len(), 1);
        assert_eq!(get_rules_of_resource(&res).len(), 1);
        load_rules_of_resource(&res, vec![]);
        assert!(get_breakers_of_resource(&res).is_empty());
    }

    #[test]
    fn invalid_rule_dropped() {
        let res = String::from("cb_manager_invalid");
        let rule = Arc::new(Rule {
            resource: res.clone(),
            retry_timeout_ms: 0,
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![rule]);
        assert!(get_breakers_of_resource(&res).is_empty());
        load_rules_of_resource(&res, vec![]);
    }

    #[test]
    fn append_builds_a_breaker_once() {
        let res = String::from("cb_manager_append");
        let rule = Arc::new(Rule {
            resource: res.clone(),
            strategy: BreakerStrategy::ErrorRatio,
            retry_timeout_ms: 3000,
            threshold: 0.5,
            ..Default::default()
        });
        assert!(append_rule(Arc::clone(&rule)));
        // the equal rule again is a no-op
        assert!(!append_rule(rule));
        assert_eq!(get_rules_of_resource(&res).len(), 1);
        assert_eq!(get_breakers_of_resource(&res).len(), 1);

        let invalid = Arc::new(Rule {
            resource: res.clone(),
            retry_timeout_ms: 0,
            ..Default::default()
        });
        assert!(!append_rule(invalid));
        assert_eq!(get_breakers_of_resource(&res).len(), 1);
        load_rules_of_resource(&res, vec![]);
    }
}
