//! Host node model.
//!
//! The engine never walks a tree on its own. Node handles only know their
//! kind and name; everything structural goes through a [`DocumentFacade`]
//! whose answers may be deferred (see [`Fetch`]).

use crate::engine::runtime::Error;
use crate::engine::suspend::Fetch;
use crate::xdm::ExpandedName;
use std::fmt;
use std::hash::Hash;

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    /// Kind test name as used in the type hierarchy.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Document => "document()",
            NodeKind::Element => "element()",
            NodeKind::Attribute => "attribute()",
            NodeKind::Text => "text()",
            NodeKind::Comment => "comment()",
            NodeKind::ProcessingInstruction => "processing-instruction()",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: None }
    }

    pub fn with_ns(ns_uri: impl Into<String>, prefix: Option<&str>, local: impl Into<String>) -> Self {
        Self { prefix: prefix.map(str::to_string), local: local.into(), ns_uri: Some(ns_uri.into()) }
    }

    pub fn expanded(&self) -> ExpandedName {
        ExpandedName { ns_uri: self.ns_uri.clone(), local: self.local.clone() }
    }

    /// Namespace and local part match; the prefix is not significant.
    pub fn same_name(&self, other: &QName) -> bool {
        self.local == other.local && self.ns_uri == other.ns_uri
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) if !p.is_empty() => write!(f, "{p}:{}", self.local),
            _ => f.write_str(&self.local),
        }
    }
}

/// An opaque reference to a host node. Equality is node identity.
pub trait XdmNode: Clone + Eq + Hash + fmt::Debug + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
}

/// Traversal primitives supplied by the host.
///
/// Every call may answer right away or hand back an awaitable; the engine
/// re-issues the same call once the awaitable has completed.
pub trait DocumentFacade<N: XdmNode> {
    /// Children in document order. Attributes are not children.
    fn child_nodes(&self, node: &N) -> Result<Fetch<Vec<N>>, Error>;

    fn parent_node(&self, node: &N) -> Result<Fetch<Option<N>>, Error>;

    /// Value of the attribute with the given lexical name.
    fn attribute(&self, node: &N, name: &str) -> Result<Fetch<Option<String>>, Error>;

    fn all_attributes(&self, node: &N) -> Result<Fetch<Vec<N>>, Error>;

    /// Character data of attribute, text, comment and processing-instruction nodes.
    fn data(&self, node: &N) -> Result<Fetch<String>, Error>;
}
