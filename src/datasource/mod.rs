//! Bridge between external configuration sources and the rule managers.
//! A source parses its raw payload with a `PropertyConverter` and hands the
//! result to a `PropertyHandler`, which forwards changed rule sets to the
//! matching `load_rules`.

pub mod property;

pub use property::*;

use crate::core::{authority, circuitbreaker, flow, system};
use crate::Result;
use std::sync::Arc;

/// flow_rule_updater loads the flow rule vector into the flow rule manager.
fn flow_rule_updater(rules: Vec<Arc<flow::Rule>>) -> Result<bool> {
    Ok(flow::load_rules(rules))
}

pub fn new_flow_rule_handler(
    converter: PropertyConverter<flow::Rule>,
) -> Arc<impl PropertyHandler<flow::Rule>> {
    DefaultPropertyHandler::new(converter, flow_rule_updater)
}

/// system_rule_updater loads the system rule vector into the system rule manager.
fn system_rule_updater(rules: Vec<Arc<system::Rule>>) -> Result<bool> {
    system::load_rules(rules);
    Ok(true)
}

pub fn new_system_rule_handler(
    converter: PropertyConverter<system::Rule>,
) -> Arc<impl PropertyHandler<system::Rule>> {
    DefaultPropertyHandler::new(converter, system_rule_updater)
}

/// circuitbreaker_rule_updater loads the circuit breaking rule vector into
/// the circuit breaker rule manager.
fn circuitbreaker_rule_updater(rules: Vec<Arc<circuitbreaker::Rule>>) -> Result<bool> {
    Ok(circuitbreaker::load_rules(rules))
}

pub fn new_circuitbreaker_rule_handler(
    converter: PropertyConverter<circuitbreaker::Rule>,
) -> Arc<impl PropertyHandler<circuitbreaker::Rule>> {
    DefaultPropertyHandler::new(converter, circuitbreaker_rule_updater)
}

/// authority_rule_updater loads the authority rule vector into the
/// authority rule manager.
fn authority_rule_updater(rules: Vec<Arc<authority::Rule>>) -> Result<bool> {
    Ok(authority::load_rules(rules))
}

pub fn new_authority_rule_handler(
    converter: PropertyConverter<authority::Rule>,
) -> Arc<impl PropertyHandler<authority::Rule>> {
    DefaultPropertyHandler::new(converter, authority_rule_updater)
}
