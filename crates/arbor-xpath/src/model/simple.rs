//! Simple in-memory tree with a matching [`DocumentFacade`], used in tests,
//! benchmarks and quick prototypes.
//!
//! ```
//! use arbor_xpath::model::simple::{attr, doc, elem, text};
//!
//! let root = doc()
//!     .child(elem("list").attr(attr("id", "l1")).child(elem("item").child(text("one"))))
//!     .build();
//! assert_eq!(root.children().len(), 1);
//! ```
//!
//! [`SimpleFacade::deferred`] answers the first request for every
//! (node, operation) pair with a suspension, which makes it easy to check that
//! a computation really resumes where it stopped.

use super::{DocumentFacade, NodeKind, QName, XdmNode};
use crate::consts::{XML_URI, XMLNS_URI};
use crate::engine::runtime::Error;
use crate::engine::suspend::{Awaitable, Fetch};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: Weak<Inner>,
    attributes: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

/// An `Rc`-backed immutable node. Keep the root alive while using handles.
#[derive(Clone)]
pub struct SimpleNode(Rc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}
impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name.as_ref().map(ToString::to_string))
            .field("value", &self.0.value)
            .finish()
    }
}

impl SimpleNode {
    pub fn parent(&self) -> Option<SimpleNode> {
        self.0.parent.upgrade().map(SimpleNode)
    }

    pub fn children(&self) -> &[SimpleNode] {
        &self.0.children
    }

    pub fn attributes(&self) -> &[SimpleNode] {
        &self.0.attributes
    }

    pub fn value(&self) -> Option<&str> {
        self.0.value.as_deref()
    }

    /// Concatenated descendant text for elements and documents.
    pub fn string_value(&self) -> String {
        fn dfs(n: &SimpleNode, out: &mut String) {
            if n.0.kind == NodeKind::Text {
                if let Some(v) = &n.0.value {
                    out.push_str(v);
                }
            }
            for c in &n.0.children {
                dfs(c, out);
            }
        }
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => {
                let mut out = String::new();
                dfs(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }
}

/// Describes a node before it is built. Parents are wired up by [`SimpleNodeBuilder::build`].
#[derive(Debug, Clone)]
pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    attributes: Vec<SimpleNodeBuilder>,
    children: Vec<SimpleNodeBuilder>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        Self { kind, name, value, attributes: Vec::new(), children: Vec::new() }
    }

    pub fn child(mut self, child: SimpleNodeBuilder) -> Self {
        debug_assert!(child.kind != NodeKind::Attribute);
        self.children.push(child);
        self
    }

    pub fn children<I: IntoIterator<Item = SimpleNodeBuilder>>(mut self, it: I) -> Self {
        self.children.extend(it);
        self
    }

    pub fn attr(mut self, attr: SimpleNodeBuilder) -> Self {
        debug_assert!(attr.kind == NodeKind::Attribute);
        self.attributes.push(attr);
        self
    }

    pub fn build(self) -> SimpleNode {
        self.build_with_parent(Weak::new())
    }

    fn build_with_parent(self, parent: Weak<Inner>) -> SimpleNode {
        let SimpleNodeBuilder { kind, name, value, attributes, children } = self;
        SimpleNode(Rc::new_cyclic(|me| Inner {
            kind,
            name,
            value,
            parent,
            attributes: attributes.into_iter().map(|a| a.build_with_parent(me.clone())).collect(),
            children: children.into_iter().map(|c| c.build_with_parent(me.clone())).collect(),
        }))
    }
}

fn parse_name(ns_uri: Option<&str>, name: &str) -> QName {
    let (prefix, local) = match name.split_once(':') {
        Some((p, l)) => (Some(p.to_string()), l.to_string()),
        None => (None, name.to_string()),
    };
    let ns_uri = match (ns_uri, prefix.as_deref()) {
        (Some(uri), _) => Some(uri.to_string()),
        (None, Some("xml")) => Some(XML_URI.to_string()),
        (None, Some("xmlns")) => Some(XMLNS_URI.to_string()),
        (None, _) if name == "xmlns" => Some(XMLNS_URI.to_string()),
        _ => None,
    };
    QName { prefix, local, ns_uri }
}

pub fn doc() -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Document, None, None)
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Element, Some(parse_name(None, name)), None)
}

pub fn elem_ns(ns_uri: &str, name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Element, Some(parse_name(Some(ns_uri), name)), None)
}

pub fn attr(name: &str, value: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Attribute, Some(parse_name(None, name)), Some(value.to_string()))
}

pub fn text(value: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Text, None, Some(value.to_string()))
}

pub fn comment(value: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Comment, None, Some(value.to_string()))
}

pub fn pi(target: &str, data: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::ProcessingInstruction, Some(QName::local(target)), Some(data.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    Children,
    Parent,
    Attribute,
    Attributes,
    Data,
}

#[derive(Default)]
struct Deferral {
    resolved: RefCell<HashSet<(usize, Operation)>>,
    suspensions: Cell<usize>,
}

/// Facade over [`SimpleNode`] trees.
#[derive(Clone, Default)]
pub struct SimpleFacade {
    deferral: Option<Rc<Deferral>>,
}

impl SimpleFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// A facade that suspends once per (node, operation) before answering.
    pub fn deferred() -> Self {
        Self { deferral: Some(Rc::new(Deferral::default())) }
    }

    /// Number of suspensions handed out so far.
    pub fn suspensions(&self) -> usize {
        self.deferral.as_ref().map_or(0, |d| d.suspensions.get())
    }

    fn gate<T>(&self, node: &SimpleNode, op: Operation, answer: impl FnOnce() -> T) -> Fetch<T> {
        let Some(deferral) = &self.deferral else {
            return Fetch::Ready(answer());
        };
        let key = (node.key(), op);
        if deferral.resolved.borrow().contains(&key) {
            return Fetch::Ready(answer());
        }
        deferral.suspensions.set(deferral.suspensions.get() + 1);
        let deferral = Rc::clone(deferral);
        Fetch::Pending(Awaitable::new(async move {
            deferral.resolved.borrow_mut().insert(key);
        }))
    }
}

impl fmt::Debug for SimpleFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleFacade").field("deferred", &self.deferral.is_some()).finish()
    }
}

impl DocumentFacade<SimpleNode> for SimpleFacade {
    fn child_nodes(&self, node: &SimpleNode) -> Result<Fetch<Vec<SimpleNode>>, Error> {
        Ok(self.gate(node, Operation::Children, || node.children().to_vec()))
    }

    fn parent_node(&self, node: &SimpleNode) -> Result<Fetch<Option<SimpleNode>>, Error> {
        Ok(self.gate(node, Operation::Parent, || node.parent()))
    }

    fn attribute(&self, node: &SimpleNode, name: &str) -> Result<Fetch<Option<String>>, Error> {
        Ok(self.gate(node, Operation::Attribute, || {
            node.attributes()
                .iter()
                .find(|a| a.0.name.as_ref().is_some_and(|q| q.to_string() == name))
                .and_then(|a| a.0.value.clone())
        }))
    }

    fn all_attributes(&self, node: &SimpleNode) -> Result<Fetch<Vec<SimpleNode>>, Error> {
        Ok(self.gate(node, Operation::Attributes, || node.attributes().to_vec()))
    }

    fn data(&self, node: &SimpleNode) -> Result<Fetch<String>, Error> {
        Ok(self.gate(node, Operation::Data, || node.string_value()))
    }
}
