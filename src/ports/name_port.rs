//! Instrument-name repository port.
//!
//! An explicitly injected collaborator instead of a process-wide cache:
//! the driver populates it during data preparation and resolves names once,
//! so nothing in the simulation loop touches shared mutable state.

pub trait NameRepository {
    /// Display name for a normalized code, if known.
    fn lookup(&self, code: &str) -> Option<String>;

    /// Insert or replace (code, name) pairs.
    fn populate(&mut self, entries: &[(String, String)]);
}
