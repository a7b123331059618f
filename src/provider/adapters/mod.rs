//! Adapter implementations for provider ports.

pub mod memory;
