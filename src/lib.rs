//! laddersim: rule-based ladder position-management backtester.
//!
//! Hexagonal architecture: simulation and decision logic in [`domain`],
//! collaborator traits in [`ports`], concrete implementations in
//! [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
