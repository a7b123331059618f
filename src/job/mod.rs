//! Review and report jobs: lifecycle, persistence and execution.
//!
//! A job moves through `Pending -> Running -> Completed | Failed` with
//! `Cancelled` reachable from `Pending` and `Running`, and `Failed` or
//! `Cancelled` jobs returning to `Pending` on retry. Each job owns an
//! ordered list of units (review rules or report sections) that the
//! pipeline executor runs one at a time. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
