//! Structural equality across every kind of item.
//!
//! Each comparison is a [`Resumable`] state machine: node comparisons consult
//! the document facade, which may suspend, so nothing here recurses
//! synchronously through a tree.

use crate::consts::XMLNS_URI;
use crate::engine::atomize::{atomize_item, ItemAtomizer};
use crate::engine::runtime::{Error, ExecutionParameters};
use crate::engine::sequence::{Sequence, Step};
use crate::engine::suspend::{try_ready, BoxResumable, Every, Fetch, Resolved, Resumable};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::types::primitive_type;
use crate::xdm::{AtomicValue, Scalar, Value};
use rust_decimal::Decimal;

const TEMPORAL_TYPES: [&str; 8] = [
    "xs:dateTime",
    "xs:date",
    "xs:time",
    "xs:gYearMonth",
    "xs:gYear",
    "xs:gMonthDay",
    "xs:gMonth",
    "xs:gDay",
];

fn exact_decimal(a: &AtomicValue) -> Option<Decimal> {
    match a.value() {
        Scalar::Integer(i) => Some(Decimal::from(*i)),
        Scalar::Decimal(d) => Some(*d),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_f32(a: &AtomicValue) -> Option<f32> {
    match a.value() {
        Scalar::Float(f) => Some(*f),
        _ => a.as_f64().map(|d| d as f32),
    }
}

/// Identity of map keys: like [`atomic_deep_equal`], except that integers
/// and decimals compare exactly instead of through `xs:float`.
pub(crate) fn same_key(a: &AtomicValue, b: &AtomicValue) -> bool {
    match (exact_decimal(a), exact_decimal(b)) {
        (Some(x), Some(y)) => x == y,
        _ => atomic_deep_equal(a, b),
    }
}

/// Equality of two atomic values as used by `fn:deep-equal`.
///
/// Integers, decimals and floats compare as `xs:float`, other numerics as
/// `xs:double`. `NaN` equals `NaN` here, unlike value comparison.
pub fn atomic_deep_equal(a: &AtomicValue, b: &AtomicValue) -> bool {
    let float_family = |v: &AtomicValue| matches!(v.value(), Scalar::Integer(_) | Scalar::Decimal(_) | Scalar::Float(_));
    if float_family(a) && float_family(b) {
        return match (as_f32(a), as_f32(b)) {
            (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
            _ => false,
        };
    }
    if a.is_numeric() && b.is_numeric() {
        return match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
            _ => false,
        };
    }
    match (a.value(), b.value()) {
        (Scalar::QName(x), Scalar::QName(y)) => x.same_name(y),
        (Scalar::Temporal(x), Scalar::Temporal(y)) => {
            let family = |v: &AtomicValue| primitive_type(v.type_name().as_str()).filter(|p| TEMPORAL_TYPES.contains(p));
            family(a).is_some() && family(a) == family(b) && x.calendar_eq(y)
        }
        (x, y) => x == y,
    }
}

/// Resumable deep-equality of two items.
pub fn deep_equal<N: XdmNode>(left: Value<N>, right: Value<N>, params: &ExecutionParameters<N>) -> BoxResumable<bool> {
    match (left, right) {
        (Value::Atomic(a), Value::Atomic(b)) => verdict(atomic_deep_equal(&a, &b)),
        (Value::Map(m1), Value::Map(m2)) => {
            if m1.len() != m2.len() {
                return verdict(false);
            }
            let params = params.clone();
            Box::new(Every::new(m1.len(), move |i| {
                let (key, value) = &m1.entries()[i];
                Ok(match m2.get(key) {
                    Some(other) => sequence_deep_equal(value.reader(), other.reader(), &params),
                    None => verdict(false),
                })
            }))
        }
        (Value::Array(a1), Value::Array(a2)) => {
            if a1.len() != a2.len() {
                return verdict(false);
            }
            let params = params.clone();
            Box::new(Every::new(a1.len(), move |i| {
                let readers = a1.get(i).zip(a2.get(i)).map(|(x, y)| (x.reader(), y.reader()));
                Ok(match readers {
                    Some((x, y)) => sequence_deep_equal(x, y, &params),
                    None => verdict(false),
                })
            }))
        }
        (Value::Node(n1), Value::Node(n2)) => node_deep_equal(n1, n2, params),
        _ => verdict(false),
    }
}

/// Resumable deep-equality of two sequences, compared pairwise in order.
pub fn sequence_deep_equal<N: XdmNode>(
    left: Sequence<N>,
    right: Sequence<N>,
    params: &ExecutionParameters<N>,
) -> BoxResumable<bool> {
    Box::new(SequenceDeepEqual {
        left,
        right,
        left_item: None,
        right_item: None,
        comparison: None,
        params: params.clone(),
    })
}

fn verdict(value: bool) -> BoxResumable<bool> {
    Box::new(Resolved::new(value))
}

struct SequenceDeepEqual<N> {
    left: Sequence<N>,
    right: Sequence<N>,
    // `Some(None)` records that the side is exhausted.
    left_item: Option<Option<Value<N>>>,
    right_item: Option<Option<Value<N>>>,
    comparison: Option<BoxResumable<bool>>,
    params: ExecutionParameters<N>,
}

fn pull<N: XdmNode>(seq: &mut Sequence<N>, slot: &mut Option<Option<Value<N>>>) -> Result<Fetch<()>, Error> {
    if slot.is_none() {
        *slot = Some(match seq.next()? {
            Step::Item(v) => Some(v),
            Step::Done => None,
            Step::Pending(a) => return Ok(Fetch::Pending(a)),
        });
    }
    Ok(Fetch::Ready(()))
}

impl<N: XdmNode> Resumable for SequenceDeepEqual<N> {
    type Output = bool;

    fn resume(&mut self) -> Result<Fetch<bool>, Error> {
        loop {
            if let Some(comparison) = self.comparison.as_mut() {
                let equal = try_ready!(comparison.resume());
                self.comparison = None;
                if !equal {
                    return Ok(Fetch::Ready(false));
                }
            }
            try_ready!(pull(&mut self.left, &mut self.left_item));
            try_ready!(pull(&mut self.right, &mut self.right_item));
            match (self.left_item.take().flatten(), self.right_item.take().flatten()) {
                (Some(a), Some(b)) => self.comparison = Some(deep_equal(a, b, &self.params)),
                (None, None) => return Ok(Fetch::Ready(true)),
                _ => return Ok(Fetch::Ready(false)),
            }
        }
    }
}

// ===== Nodes =====

fn node_deep_equal<N: XdmNode>(left: N, right: N, params: &ExecutionParameters<N>) -> BoxResumable<bool> {
    use NodeKind::*;
    let params = params.clone();
    match (left.kind(), right.kind()) {
        (Document, Document) => Box::new(NodeListsEqual::new(left, right, NodeList::Content, params)),
        (Element, Element) => {
            if !names_equal(&left, &right) {
                return verdict(false);
            }
            Box::new(Every::new(2, move |stage| {
                let list = if stage == 0 { NodeList::Attributes } else { NodeList::Content };
                Ok(Box::new(NodeListsEqual::new(left.clone(), right.clone(), list, params.clone())) as BoxResumable<bool>)
            }))
        }
        (Attribute, Attribute)
        | (ProcessingInstruction, ProcessingInstruction)
        | (Text | Comment, Text | Comment) => {
            if !names_equal(&left, &right) {
                return verdict(false);
            }
            match (atomize_item(&Value::Node(left), &params), atomize_item(&Value::Node(right), &params)) {
                (Ok(a), Ok(b)) => Box::new(AtomizedEqual { left: a, right: b, left_value: None }),
                (Err(e), _) | (_, Err(e)) => Box::new(Failed(Some(e))),
            }
        }
        _ => verdict(false),
    }
}

fn names_equal<N: XdmNode>(a: &N, b: &N) -> bool {
    match (a.name(), b.name()) {
        (Some(x), Some(y)) => x.same_name(&y),
        (None, None) => true,
        _ => false,
    }
}

fn is_namespace_declaration<N: XdmNode>(attr: &N) -> bool {
    attr.name().is_some_and(|q| q.ns_uri.as_deref() == Some(XMLNS_URI))
}

#[derive(Clone, Copy)]
enum NodeList {
    /// Attributes without namespace declarations, ordered by qualified name.
    Attributes,
    /// Element and text children in document order.
    Content,
}

struct NodeListsEqual<N> {
    nodes: [N; 2],
    lists: [Option<Vec<N>>; 2],
    which: NodeList,
    params: ExecutionParameters<N>,
    inner: Option<BoxResumable<bool>>,
}

impl<N: XdmNode> NodeListsEqual<N> {
    fn new(left: N, right: N, which: NodeList, params: ExecutionParameters<N>) -> Self {
        Self { nodes: [left, right], lists: [None, None], which, params, inner: None }
    }

    fn fetch(&self, node: &N) -> Result<Fetch<Vec<N>>, Error> {
        let facade = &self.params.document;
        Ok(match self.which {
            NodeList::Attributes => facade.all_attributes(node)?.map(|mut attrs| {
                attrs.retain(|a| !is_namespace_declaration(a));
                attrs.sort_by_cached_key(|a| a.name().map(|q| q.to_string()).unwrap_or_default());
                attrs
            }),
            NodeList::Content => facade
                .child_nodes(node)?
                .map(|children| children.into_iter().filter(|c| matches!(c.kind(), NodeKind::Element | NodeKind::Text)).collect()),
        })
    }
}

impl<N: XdmNode> Resumable for NodeListsEqual<N> {
    type Output = bool;

    fn resume(&mut self) -> Result<Fetch<bool>, Error> {
        if self.inner.is_none() {
            for side in 0..2 {
                if self.lists[side].is_none() {
                    let list = try_ready!(self.fetch(&self.nodes[side]));
                    self.lists[side] = Some(list);
                }
            }
            let [left, right] = std::mem::take(&mut self.lists).map(Option::unwrap_or_default);
            if left.len() != right.len() {
                return Ok(Fetch::Ready(false));
            }
            let as_sequence = |nodes: Vec<N>| Sequence::from_vec(nodes.into_iter().map(Value::Node).collect());
            self.inner = Some(sequence_deep_equal(as_sequence(left), as_sequence(right), &self.params));
        }
        match self.inner.as_mut() {
            Some(inner) => inner.resume(),
            None => Err(Error::internal("node list comparison lost its state")),
        }
    }
}

struct AtomizedEqual<N> {
    left: ItemAtomizer<N>,
    right: ItemAtomizer<N>,
    left_value: Option<AtomicValue>,
}

impl<N: XdmNode> Resumable for AtomizedEqual<N> {
    type Output = bool;

    fn resume(&mut self) -> Result<Fetch<bool>, Error> {
        let left = match self.left_value.take() {
            Some(v) => v,
            None => try_ready!(self.left.resume()),
        };
        let right = match self.right.resume()? {
            Fetch::Ready(v) => v,
            Fetch::Pending(a) => {
                self.left_value = Some(left);
                return Ok(Fetch::Pending(a));
            }
        };
        Ok(Fetch::Ready(atomic_deep_equal(&left, &right)))
    }
}

struct Failed(Option<Error>);

impl Resumable for Failed {
    type Output = bool;

    fn resume(&mut self) -> Result<Fetch<bool>, Error> {
        Err(self.0.take().unwrap_or_else(|| Error::internal("comparison failure reported twice")))
    }
}
