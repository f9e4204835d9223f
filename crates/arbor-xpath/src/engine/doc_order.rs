//! Document order for host nodes.
//!
//! A node's [`OrderKey`] is the list of sibling positions on the way from its
//! root down to the node. Within a parent, attributes are numbered before
//! children, so an element precedes its attributes, which precede its
//! content. Comparing keys lexicographically yields document order, and an
//! ancestor's key is always a prefix of its descendants' keys.
//!
//! Nodes from different trees are ordered by the first time their root was
//! seen by the same [`DocumentOrder`], which keeps the order stable within one
//! evaluation.

use crate::engine::runtime::{Error, ExecutionParameters};
use crate::engine::sequence::{Sequence, Step};
use crate::engine::suspend::{try_ready, Fetch, Resumable};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::Value;
use itertools::Itertools;
use smallvec::SmallVec;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderKey {
    root: usize,
    path: SmallVec<[u32; 16]>,
}

impl OrderKey {
    /// `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &OrderKey) -> bool {
        self.root == other.root && other.path.starts_with(&self.path)
    }
}

struct Siblings<N> {
    attributes: Option<Vec<N>>,
    children: Option<Vec<N>>,
}

impl<N> Default for Siblings<N> {
    fn default() -> Self {
        Self { attributes: None, children: None }
    }
}

/// Builds order keys, caching the sibling lists it had to fetch.
pub struct DocumentOrder<N> {
    params: ExecutionParameters<N>,
    siblings: HashMap<N, Siblings<N>>,
    roots: Vec<N>,
}

/// Progress of one key computation across suspensions.
pub struct KeyProgress<N> {
    // Node first, then its ancestors up to the root.
    chain: Vec<N>,
    climbing: bool,
    path: SmallVec<[u32; 16]>,
}

impl<N: XdmNode> KeyProgress<N> {
    pub fn new(node: N) -> Self {
        Self { chain: vec![node], climbing: true, path: SmallVec::new() }
    }
}

impl<N: XdmNode> DocumentOrder<N> {
    pub fn new(params: &ExecutionParameters<N>) -> Self {
        Self { params: params.clone(), siblings: HashMap::new(), roots: Vec::new() }
    }

    pub fn key(&mut self, progress: &mut KeyProgress<N>) -> Result<Fetch<OrderKey>, Error> {
        while progress.climbing {
            let Some(top) = progress.chain.last() else {
                return Err(Error::internal("order key requested for no node"));
            };
            match try_ready!(self.params.document.parent_node(top)) {
                Some(parent) => progress.chain.push(parent),
                None => progress.climbing = false,
            }
        }
        // chain[i + 1] is the parent of chain[i]; walk from the root down.
        let depth = progress.chain.len() - 1;
        while progress.path.len() < depth {
            let level = depth - 1 - progress.path.len();
            let parent = progress.chain[level + 1].clone();
            let child = progress.chain[level].clone();
            let index = try_ready!(self.sibling_index(&parent, &child));
            progress.path.push(index);
        }
        let root_node = &progress.chain[depth];
        let root = match self.roots.iter().position(|r| r == root_node) {
            Some(i) => i,
            None => {
                self.roots.push(root_node.clone());
                self.roots.len() - 1
            }
        };
        Ok(Fetch::Ready(OrderKey { root, path: progress.path.clone() }))
    }

    fn sibling_index(&mut self, parent: &N, child: &N) -> Result<Fetch<u32>, Error> {
        let facade = std::rc::Rc::clone(&self.params.document);
        let entry = self.siblings.entry(parent.clone()).or_default();
        if entry.attributes.is_none() {
            let attributes =
                if parent.kind() == NodeKind::Element { try_ready!(facade.all_attributes(parent)) } else { Vec::new() };
            entry.attributes = Some(attributes);
        }
        let attributes = entry.attributes.as_deref().unwrap_or_default();
        if let Some(i) = attributes.iter().position(|a| a == child) {
            return Ok(Fetch::Ready(to_index(i)));
        }
        let offset = attributes.len();
        if entry.children.is_none() {
            entry.children = Some(try_ready!(facade.child_nodes(parent)));
        }
        entry
            .children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .position(|c| c == child)
            .map(|i| Fetch::Ready(to_index(offset + i)))
            .ok_or_else(|| Error::internal(format!("{child:?} is not listed below its parent {parent:?}")))
    }
}

fn to_index(i: usize) -> u32 {
    u32::try_from(i).unwrap_or(u32::MAX)
}

/// Resumable sort of nodes into document order, dropping duplicates.
pub struct SortNodes<N> {
    order: DocumentOrder<N>,
    nodes: Vec<N>,
    keys: Vec<OrderKey>,
    progress: Option<KeyProgress<N>>,
}

impl<N: XdmNode> SortNodes<N> {
    pub fn new(nodes: Vec<N>, params: &ExecutionParameters<N>) -> Self {
        let keys = Vec::with_capacity(nodes.len());
        Self { order: DocumentOrder::new(params), nodes, keys, progress: None }
    }
}

impl<N: XdmNode> Resumable for SortNodes<N> {
    type Output = Vec<(OrderKey, N)>;

    fn resume(&mut self) -> Result<Fetch<Self::Output>, Error> {
        while self.keys.len() < self.nodes.len() {
            let node = &self.nodes[self.keys.len()];
            let progress = self.progress.get_or_insert_with(|| KeyProgress::new(node.clone()));
            let key = try_ready!(self.order.key(progress));
            self.progress = None;
            self.keys.push(key);
        }
        let keys = std::mem::take(&mut self.keys);
        let nodes = std::mem::take(&mut self.nodes);
        Ok(Fetch::Ready(
            keys.into_iter()
                .zip(nodes)
                .sorted_by(|a, b| a.0.cmp(&b.0))
                .dedup_by(|a, b| a.0 == b.0)
                .collect(),
        ))
    }
}

/// Sort node values into document order without duplicates.
///
/// Fails with a type error if `values` holds anything but nodes.
pub fn sort_nodes<N: XdmNode>(values: Vec<Value<N>>, params: &ExecutionParameters<N>) -> Sequence<N> {
    let nodes: Result<Vec<N>, Error> = values
        .into_iter()
        .map(|v| match v {
            Value::Node(n) => Ok(n),
            other => Err(Error::type_error(format!("expected a node, got {}", other.type_name()))),
        })
        .collect();
    let mut sorter = match nodes {
        Ok(nodes) => SortNodes::new(nodes, params),
        Err(e) => return Sequence::failed(e),
    };
    let mut sorted: Option<std::vec::IntoIter<(OrderKey, N)>> = None;
    Sequence::from_fn(move || {
        if sorted.is_none() {
            sorted = Some(try_ready!(sorter.resume()).into_iter());
        }
        Ok(match sorted.as_mut().and_then(Iterator::next) {
            Some((_, node)) => Step::Item(Value::Node(node)),
            None => Step::Done,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::{attr, doc, elem, text, SimpleFacade};
    use futures::executor::block_on;
    use std::rc::Rc;

    #[test]
    fn sorts_and_dedups_with_attributes_before_children() {
        let root = doc().child(elem("a").attr(attr("id", "1")).child(elem("b").child(text("t"))).child(elem("c"))).build();
        let a = root.children()[0].clone();
        let id = a.attributes()[0].clone();
        let b = a.children()[0].clone();
        let c = a.children()[1].clone();
        let params = ExecutionParameters::new(Rc::new(SimpleFacade::deferred()));
        let input = [&c, &b, &id, &a, &c, &root].map(|n| Value::Node(n.clone())).to_vec();
        let sorted = block_on(sort_nodes(input, &params).materialize()).unwrap();
        let sorted: Vec<_> = sorted.into_iter().filter_map(|v| v.as_node().cloned()).collect();
        assert_eq!(sorted, vec![root, a, id, b, c]);
    }

    #[test]
    fn ancestor_keys_contain_descendant_keys() {
        let root = doc().child(elem("a").child(elem("b"))).build();
        let a = root.children()[0].clone();
        let b = a.children()[0].clone();
        let params = ExecutionParameters::new(Rc::new(SimpleFacade::new()));
        let mut order = DocumentOrder::new(&params);
        let ka = order.key(&mut KeyProgress::new(a)).unwrap().ready().unwrap();
        let kb = order.key(&mut KeyProgress::new(b)).unwrap().ready().unwrap();
        assert!(ka.contains(&kb));
        assert!(!kb.contains(&ka));
        assert!(ka < kb);
    }
}
