//! # flowguard
//!
//! `flowguard` is an in-process resource-guard and flow-control engine.
//! Every unit of work worth protecting is a *resource*; business code wraps
//! an invocation of a resource in an entry, and the engine records traffic
//! statistics and evaluates the configured rules (flow control, circuit
//! breaking, origin authority, system adaptive protection) to decide whether
//! the call is admitted.
//!
//! The engine adopts a chain-of-responsibility design: every entry traverses
//! the `base::SlotChain`, whose slots resolve statistics nodes, run the rule
//! checkers and record metrics. Generally there are four steps to use it:
//! 1. Initialize the engine (`api::init_default()` or a custom config).
//! 2. Load rules for the resources to be protected.
//! 3. Build an entry around the protected logic with `api::EntryBuilder`.
//! 4. Exit the entry when the logic finishes (mandatory pairing).
//!
//! ## Entry definition
//!
//! `EntryBuilder::build()` returns an error when the calling is blocked:
//!
//! ```rust,ignore
//! use flowguard::{base, EntryBuilder};
//! let entry_builder = EntryBuilder::new(res_name.clone())
//!     .with_traffic_type(base::TrafficType::Inbound);
//! match entry_builder.build() {
//!     Ok(entry) => {
//!         // The request is admitted; run the protected logic,
//!         // then exit the entry.
//!         entry.exit().unwrap();
//!     }
//!     Err(_blocked) => {
//!         // The request is rejected; run the fallback logic.
//!         // Do not call `exit()` for a blocked entry.
//!     }
//! }
//! ```
//!
//! ## Loading rules
//!
//! `load_rules()` replaces all rules of the corresponding kind atomically:
//!
//! ```rust,ignore
//! flow::load_rules(vec![Arc::new(flow::Rule {
//!     resource: "example".into(),
//!     threshold: 10.0,
//!     control_behavior: flow::ControlBehavior::Reject,
//!     ..Default::default()
//! })]);
//! ```
//!
//! External configuration sources push updates through the
//! `datasource::PropertyHandler` bridge, which converts the raw payload and
//! calls the matching `load_rules` on change.

/// Embedding API: entry builder, context transfer, error tracing,
/// the global slot chain and engine initialization.
pub mod api;
/// Core implementations: the shared vocabulary types, the task context and
/// invocation tree, the sliding-window statistics, the node graph and the
/// rule engines (flow, circuit breaker, authority, system).
pub mod core;
/// Bridge between external configuration sources and the rule managers.
pub mod datasource;
/// Adapter over the `log` facade.
pub mod logging;
/// Time and casting utilities.
pub mod utils;

pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
