//! # Controller
//!
//! Core controller modules for the CloudSecret controller.
//!
//! - `backoff`: Fibonacci backoff for store-error retries
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//! - `store`: Persistence of `CloudSecret` resources and managed Secrets

pub mod backoff;
pub mod reconciler;
pub mod server;
pub mod store;
