//! Review creation from inbound webhook events.
//!
//! The resolver decides, per event, whether a review job is created, an
//! existing review is returned (dedup on pull request URL and commit), or
//! the merge timestamp of earlier reviews is updated.

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
