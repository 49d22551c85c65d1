//! Domain types shared across all fleetpool services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase`/`engine` and `domain` layers; never in `infra` or `handlers`.

pub mod id;
pub mod pagination;
