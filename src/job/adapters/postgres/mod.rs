//! `PostgreSQL` adapter for job, unit and attempt persistence.

mod models;
mod schema;
mod store;

pub use store::{JobPgPool, PostgresJobStore};
