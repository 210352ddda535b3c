//! # Runtime
//!
//! Process-level wiring of the controller binary.
//!
//! - `initialization`: rustls, tracing, metrics, probe server and reconciler setup
//! - `watch_loop`: kube-runtime `Controller` loop with restart and graceful shutdown
//! - `error_policy`: Fibonacci backoff for failed reconciliations and watch error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
