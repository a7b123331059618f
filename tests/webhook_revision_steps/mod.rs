//! Step definitions for pull request review revision scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
