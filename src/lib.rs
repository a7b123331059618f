//! Revue: orchestration core for automated code reviews and documentation
//! reports.
//!
//! Jobs are created by API callers or by inbound webhook events, queued on
//! a bounded queue and executed by a fixed pool of workers. Each job runs
//! an ordered pipeline of units (review rules or report sections) against
//! AI agents, persisting progress after every unit.
//!
//! # Architecture
//!
//! Revue follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, in-memory)
//!
//! # Modules
//!
//! - [`job`]: Job and unit lifecycle, persistence, engine and pipeline
//! - [`agent`]: Name-keyed AI agent clients
//! - [`provider`]: Git hosting clients, repository snapshots and webhook events
//! - [`webhook`]: Webhook deduplication and revision counting
//! - [`notification`]: Best-effort terminal-state notifications
//! - [`telemetry`]: Tracing subscriber setup

pub mod agent;
pub mod job;
pub mod notification;
pub mod provider;
pub mod telemetry;
pub mod webhook;
