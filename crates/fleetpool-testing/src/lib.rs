//! Test utilities for fleetpool services.
//!
//! Provides the contract fixture loader. Per-service record builders live in
//! each service's own `tests/integration/helpers.rs`, not here, since they'd
//! otherwise need to depend back on the service crate.
//!
//! Import in `#[cfg(test)]` blocks only — never in production code.

pub mod fixture;
