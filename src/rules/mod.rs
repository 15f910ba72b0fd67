//! Link rewriting rules: pattern matching, host splicing, and the ordered
//! registry of active platforms.

mod registry;
mod rule;

pub use registry::{Platform, RegistryEntry, RuleMatch, RuleRegistry};
pub use rule::{RewriteKind, Rule};
