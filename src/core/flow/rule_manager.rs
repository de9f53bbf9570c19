use super::*;
use crate::{base::GuardRule, logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// ControllerMap represents the map storage for Controller.
pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;
pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(RuleMap::new());
    static ref CONTROLLER_MAP: Mutex<ControllerMap> = Mutex::new(ControllerMap::new());
}

/// Builds the calculator/checker pair of the rule. Thread-grade rules always
/// use the direct reject pair since pacing makes no sense for concurrency.
fn new_traffic_controller(rule: Arc<Rule>) -> Arc<Controller> {
    let calculator: Box<dyn Calculator> = if rule.grade == FlowGrade::Qps && rule.uses_warm_up() {
        Box::new(WarmUpCalculator::new(rule.clone()))
    } else {
        Box::new(DirectCalculator::new(rule.threshold))
    };
    let checker: Box<dyn Checker> = if rule.grade == FlowGrade::Qps && rule.uses_throttling() {
        Box::new(ThrottlingChecker::new(rule.clone()))
    } else {
        Box::new(RejectChecker::new(rule.clone()))
    };
    Arc::new(Controller::new(rule, calculator, checker))
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[FlowRuleManager] Flow rules were cleared")
    } else {
        logging::info!(
            "[FlowRuleManager] Flow rules were loaded: {:?}",
            map.values()
        )
    }
}

/// `load_rules` loads the given flow rules to the rule manager, replacing
/// all previous rules atomically. Controllers are rebuilt from scratch so
/// shaper state never leaks between reloads. The returned `bool` indicates
/// whether a real load happened; an identical rule set is ignored.
// This func acquires the locks on the global `RULE_MAP` and `CONTROLLER_MAP`,
// please release your locks on them before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().push(rule);
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[Flow] Load rules is the same with current rules, so ignore load operation."
        );
        return false;
    }

    // drop invalid rules with a warning
    let mut valid_rules_map: RuleMap = HashMap::with_capacity(rule_map.len());
    for (res, rules) in &rule_map {
        let mut valid_rules = Vec::new();
        for rule in rules {
            match rule.is_valid() {
                Ok(_) => valid_rules.push(Arc::clone(rule)),
                Err(err) => logging::warn!(
                    "[Flow load_rules] Ignoring invalid flow rule {:?}, reason: {:?}",
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
    let mut controller_map = CONTROLLER_MAP.lock().unwrap();
    let mut valid_controller_map = HashMap::with_capacity(valid_rules_map.len());
    for (res, rules) in valid_rules_map.iter() {
        let tcs: Vec<Arc<Controller>> = rules
            .iter()
            .map(|r| new_traffic_controller(Arc::clone(r)))
            .collect();
        valid_controller_map.insert(res.clone(), tcs);
    }
    *controller_map = valid_controller_map;
    *global_rule_map = rule_map;
    drop(global_rule_map);
    drop(controller_map);
    logging::debug!(
        "[Flow load_rules] Time statistic(ns) for updating flow rule, time cost {}",
        utils::curr_time_nanos() - start
    );
    log_rule_update(&valid_rules_map);
    true
}

/// Appends a single rule; an already-present equal rule is a no-op.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    if RULE_MAP
        .lock()
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
                .lock()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .push(Arc::clone(&rule));
            CONTROLLER_MAP
                .lock()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .push(new_traffic_controller(rule));
            true
        }
        Err(err) => {
            logging::warn!(
                "[Flow append_rule] Ignoring invalid flow rule {:?}, reason: {:?}",
                rule,
                err
            );
            false
        }
    }
}

/// `load_rules_of_resource` replaces the rules of one resource only.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let mut global_rule_map = RULE_MAP.lock().unwrap();
    let mut global_controller_map = CONTROLLER_MAP.lock().unwrap();
    if rules.is_empty() {
        global_rule_map.remove(res);
        global_controller_map.remove(res);
        logging::info!("[Flow] clear resource level rules, resource {}", res);
        return Ok(true);
    }
    if global_rule_map.get(res).map(|r| r == &rules).unwrap_or(false) {
        logging::info!("[Flow] Load resource level rules is the same with current resource level rules, so ignore load operation.");
        return Ok(false);
    }

    let mut valid_res_rules = Vec::with_capacity(rules.len());
    for rule in &rules {
        match rule.is_valid() {
            Ok(_) => valid_res_rules.push(Arc::clone(rule)),
            Err(err) => logging::warn!(
                "[Flow load_rules_of_resource] Ignoring invalid flow rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }
    let tcs: Vec<Arc<Controller>> = valid_res_rules
        .iter()
        .map(|r| new_traffic_controller(Arc::clone(r)))
        .collect();
    global_rule_map.insert(res.clone(), rules);
    global_controller_map.insert(res.clone(), tcs);
    Ok(true)
}

/// `get_rules` returns all the current flow rules.
pub fn get_rules() -> Vec<Arc<Rule>> {
    let rule_map = RULE_MAP.lock().unwrap();
    rule_map.values().flatten().cloned().collect()
}

pub fn get_rules_of_resource(res: &String) -> Vec<Arc<Rule>> {
    RULE_MAP
        .lock()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

pub fn clear_rules() {
    RULE_MAP.lock().unwrap().clear();
    CONTROLLER_MAP.lock().unwrap().clear();
}

pub fn get_traffic_controller_list_for(res: &String) -> Vec<Arc<Controller>> {
    CONTROLLER_MAP
        .lock()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

/// Whether any rule of this resource names the origin explicitly; used by
/// the `other` origin selector.
pub(crate) fn has_origin_specific_rule(res: &String, origin: &str) -> bool {
    RULE_MAP
        .lock()
        .unwrap()
        .get(res)
        .map(|rules| rules.iter().any(|r| r.limit_app == origin))
        .unwrap_or(false)
}
