//! Axis steps: `child::p`, `attribute::*`, `ancestor::node()`, ...

use super::{Bucket, Expression, ExpressionBase, ResultOrder, Specificity, SpecificityKind};
use crate::consts::XMLNS_URI;
use crate::engine::runtime::{DynamicContext, Error, ExecutionParameters};
use crate::engine::sequence::{Sequence, Step};
use crate::engine::suspend::{try_ready, Fetch};
use crate::model::{DocumentFacade, NodeKind, XdmNode};
use crate::xdm::{ExpandedName, Value};
use std::fmt;
use string_cache::DefaultAtom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    SelfAxis,
    Child,
    Attribute,
    Parent,
    Descendant,
    DescendantOrSelf,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn is_reverse(self) -> bool {
        matches!(self, Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling)
    }

    fn principal_kind(self) -> NodeKind {
        if self == Axis::Attribute { NodeKind::Attribute } else { NodeKind::Element }
    }

    /// (peer, subtree) for the nodes reached from a single context node.
    fn locality(self) -> (bool, bool) {
        match self {
            Axis::SelfAxis | Axis::Child | Axis::Attribute => (true, true),
            Axis::Descendant | Axis::DescendantOrSelf => (false, true),
            Axis::Parent | Axis::FollowingSibling | Axis::PrecedingSibling => (true, false),
            Axis::Ancestor | Axis::AncestorOrSelf => (false, false),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::SelfAxis => "self",
            Axis::Child => "child",
            Axis::Attribute => "attribute",
            Axis::Parent => "parent",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// An exact expanded name.
    Name(ExpandedName),
    /// `*`, `prefix:*` or `*:local`; unset parts match anything.
    Wildcard { ns_uri: Option<String>, local: Option<String> },
    /// `node()` when `None`, otherwise `element()`, `text()`, ...
    Kind(Option<NodeKind>),
}

impl NodeTest {
    pub fn name(local: &str) -> Self {
        NodeTest::Name(ExpandedName::local(local))
    }

    pub fn any_name() -> Self {
        NodeTest::Wildcard { ns_uri: None, local: None }
    }

    fn matches<N: XdmNode>(&self, node: &N, principal: NodeKind) -> bool {
        match self {
            NodeTest::Kind(None) => true,
            NodeTest::Kind(Some(kind)) => node.kind() == *kind,
            NodeTest::Name(expected) => {
                node.kind() == principal
                    && node.name().is_some_and(|q| q.local == expected.local && q.ns_uri == expected.ns_uri)
            }
            NodeTest::Wildcard { ns_uri, local } => {
                node.kind() == principal
                    && node.name().is_some_and(|q| {
                        ns_uri.as_ref().is_none_or(|ns| q.ns_uri.as_ref() == Some(ns))
                            && local.as_ref().is_none_or(|l| &q.local == l)
                    })
            }
        }
    }

    fn specificity(&self) -> Specificity {
        Specificity::of(match self {
            NodeTest::Name(_) => SpecificityKind::NodeName,
            NodeTest::Wildcard { .. } | NodeTest::Kind(Some(_)) => SpecificityKind::NodeType,
            NodeTest::Kind(None) => SpecificityKind::Universal,
        })
    }

    fn bucket(&self, principal: NodeKind) -> Option<Bucket> {
        match self {
            NodeTest::Name(name) if principal == NodeKind::Element => {
                Some(Bucket::LocalName(DefaultAtom::from(name.local.as_str())))
            }
            NodeTest::Name(_) | NodeTest::Wildcard { .. } => Some(Bucket::NodeKind(principal)),
            NodeTest::Kind(kind) => kind.map(Bucket::NodeKind),
        }
    }
}

/// `axis::test`
#[derive(Debug)]
pub struct AxisStep<N> {
    base: ExpressionBase<N>,
    axis: Axis,
    test: NodeTest,
}

impl<N: XdmNode> AxisStep<N> {
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        let mut specificity = test.specificity();
        if axis == Axis::Attribute {
            specificity = specificity.add(&Specificity::of(SpecificityKind::Attribute));
        }
        let (peer, subtree) = axis.locality();
        let order = if axis.is_reverse() { ResultOrder::ReverseSorted } else { ResultOrder::Sorted };
        let base = ExpressionBase::new(specificity, Vec::new()).ordered(order).locality(peer, subtree);
        Self { base, axis, test }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }
}

impl<N: XdmNode> Expression<N> for AxisStep<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    /// Only `self::` steps constrain the context node itself.
    fn bucket(&self) -> Option<Bucket> {
        if self.axis == Axis::SelfAxis { self.test.bucket(self.axis.principal_kind()) } else { None }
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let node = match &ctx.context_item {
            Some(Value::Node(n)) => n.clone(),
            Some(other) => {
                return Err(Error::type_error(format!(
                    "the {} axis can only be applied to nodes, got {}",
                    self.axis,
                    other.type_name()
                )));
            }
            None => return Err(Error::missing_context(&format!("the {} axis", self.axis))),
        };
        let principal = self.axis.principal_kind();
        let test = self.test.clone();
        let facade = std::rc::Rc::clone(&params.document);
        let mut walk = Walk::start(self.axis, node);
        Ok(Sequence::from_fn(move || {
            loop {
                match try_ready!(walk.next_node(&*facade)) {
                    Some(n) if test.matches(&n, principal) => return Ok(Step::Item(Value::Node(n))),
                    Some(_) => {}
                    None => return Ok(Step::Done),
                }
            }
        }))
    }
}

fn may_have_children(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::Element | NodeKind::Document)
}

/// Resumable traversal of one axis from one node, in axis order.
enum Walk<N> {
    Listed(std::vec::IntoIter<N>),
    Children(N),
    Attributes(N),
    Parent(N),
    Descendants { stack: Vec<std::vec::IntoIter<N>>, expand: Option<N> },
    Ancestors { yield_self: Option<N>, from: Option<N> },
    Siblings { node: N, following: bool, parent: Option<Option<N>> },
}

impl<N: XdmNode> Walk<N> {
    fn start(axis: Axis, node: N) -> Self {
        match axis {
            Axis::SelfAxis => Walk::Listed(vec![node].into_iter()),
            Axis::Child => Walk::Children(node),
            Axis::Attribute => Walk::Attributes(node),
            Axis::Parent => Walk::Parent(node),
            Axis::Descendant => Walk::Descendants { stack: Vec::new(), expand: Some(node) },
            Axis::DescendantOrSelf => Walk::Descendants { stack: vec![vec![node].into_iter()], expand: None },
            Axis::Ancestor => Walk::Ancestors { yield_self: None, from: Some(node) },
            Axis::AncestorOrSelf => Walk::Ancestors { yield_self: Some(node.clone()), from: Some(node) },
            Axis::FollowingSibling => Walk::Siblings { node, following: true, parent: None },
            Axis::PrecedingSibling => Walk::Siblings { node, following: false, parent: None },
        }
    }

    fn next_node(&mut self, facade: &dyn DocumentFacade<N>) -> Result<Fetch<Option<N>>, Error> {
        loop {
            match self {
                Walk::Listed(nodes) => return Ok(Fetch::Ready(nodes.next())),
                Walk::Children(node) => {
                    let children =
                        if may_have_children(node.kind()) { try_ready!(facade.child_nodes(node)) } else { Vec::new() };
                    *self = Walk::Listed(children.into_iter());
                }
                Walk::Attributes(node) => {
                    let attributes = if node.kind() == NodeKind::Element {
                        try_ready!(facade.all_attributes(node))
                    } else {
                        Vec::new()
                    };
                    let attributes: Vec<N> = attributes
                        .into_iter()
                        .filter(|a| a.name().is_none_or(|q| q.ns_uri.as_deref() != Some(XMLNS_URI)))
                        .collect();
                    *self = Walk::Listed(attributes.into_iter());
                }
                Walk::Parent(node) => {
                    let parent = try_ready!(facade.parent_node(node));
                    *self = Walk::Listed(parent.into_iter().collect::<Vec<_>>().into_iter());
                }
                Walk::Descendants { stack, expand } => {
                    if let Some(node) = expand {
                        let children = if may_have_children(node.kind()) {
                            try_ready!(facade.child_nodes(node))
                        } else {
                            Vec::new()
                        };
                        *expand = None;
                        stack.push(children.into_iter());
                    }
                    let Some(top) = stack.last_mut() else {
                        return Ok(Fetch::Ready(None));
                    };
                    match top.next() {
                        Some(next) => {
                            *expand = Some(next.clone());
                            return Ok(Fetch::Ready(Some(next)));
                        }
                        None => {
                            stack.pop();
                        }
                    }
                }
                Walk::Ancestors { yield_self, from } => {
                    if let Some(node) = yield_self.take() {
                        return Ok(Fetch::Ready(Some(node)));
                    }
                    let Some(node) = from else {
                        return Ok(Fetch::Ready(None));
                    };
                    let parent = try_ready!(facade.parent_node(node));
                    *from = parent.clone();
                    return Ok(Fetch::Ready(parent));
                }
                Walk::Siblings { node, following, parent } => {
                    if node.kind() == NodeKind::Attribute {
                        *self = Walk::Listed(Vec::new().into_iter());
                        continue;
                    }
                    let parent = match parent {
                        Some(p) => p,
                        slot @ None => slot.insert(try_ready!(facade.parent_node(node))),
                    };
                    let Some(parent) = parent else {
                        *self = Walk::Listed(Vec::new().into_iter());
                        continue;
                    };
                    let mut siblings = try_ready!(facade.child_nodes(parent));
                    let position = siblings
                        .iter()
                        .position(|c| c == node)
                        .ok_or_else(|| Error::internal(format!("{node:?} is not listed below its parent")))?;
                    let selected = if *following {
                        siblings.split_off(position + 1)
                    } else {
                        siblings.truncate(position);
                        siblings.reverse();
                        siblings
                    };
                    *self = Walk::Listed(selected.into_iter());
                }
            }
        }
    }
}
