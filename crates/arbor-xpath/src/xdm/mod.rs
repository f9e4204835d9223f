//! XPath data model: type hierarchy, atomic values and items.

use std::fmt;

pub mod atomic;
pub mod temporal;
pub mod types;
pub mod value;

pub use atomic::{AtomicValue, Scalar};
pub use temporal::{Duration, Temporal};
pub use types::{is_known_type, is_subtype_of, Occurrence, SequenceType, TypeName};
pub use value::{ArrayValue, FunctionImpl, FunctionValue, MapValue, Value};

/// Namespace URI plus local name; the prefix never takes part in comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn ns(ns_uri: &str, local: &str) -> Self {
        Self { ns_uri: Some(ns_uri.to_string()), local: local.to_string() }
    }

    pub fn local(local: &str) -> Self {
        Self { ns_uri: None, local: local.to_string() }
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "Q{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}
