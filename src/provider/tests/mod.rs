//! Unit tests for the provider context.
