use super::{context_item, items_from_resumable, take_args, zip_singleton};
use crate::consts::FNS;
use crate::engine::runtime::{Error, ExecutionParameters, FunctionRegistry};
use crate::engine::sequence::Sequence;
use crate::engine::suspend::{try_ready, Fetch, Resumable};
use crate::model::{DocumentFacade, NodeKind, XdmNode};
use crate::xdm::Value;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// Elements whose `id` attribute is one of the wanted values.
    Id,
    /// Elements whose `idref` attribute lists one of the wanted values.
    Idref,
}

impl Lookup {
    fn attribute(self) -> &'static str {
        match self {
            Lookup::Id => "id",
            Lookup::Idref => "idref",
        }
    }
}

struct Frame<N> {
    node: N,
    /// Pre-order position, set once the children are on the stack.
    order: Option<usize>,
}

/// Walks the whole tree of a node, looking at one attribute per element.
///
/// Children are checked before their parent, so among nested elements
/// sharing an id the innermost one is kept. Matches are returned in
/// document order.
struct IdSearch<N> {
    document: Rc<dyn DocumentFacade<N>>,
    lookup: Lookup,
    wanted: HashSet<String>,
    climbing: Option<N>,
    stack: Vec<Frame<N>>,
    visited: usize,
    found: Vec<(usize, Value<N>)>,
}

impl<N: XdmNode> IdSearch<N> {
    fn new(lookup: Lookup, wanted: HashSet<String>, start: N, params: &ExecutionParameters<N>) -> Self {
        Self {
            document: Rc::clone(&params.document),
            lookup,
            wanted,
            climbing: Some(start),
            stack: Vec::new(),
            visited: 0,
            found: Vec::new(),
        }
    }

    fn matches(&mut self, value: &str) -> bool {
        match self.lookup {
            Lookup::Id => self.wanted.remove(value),
            Lookup::Idref => value.split_whitespace().any(|v| self.wanted.contains(v)),
        }
    }
}

impl<N: XdmNode> Resumable for IdSearch<N> {
    type Output = Vec<Value<N>>;

    fn resume(&mut self) -> Result<Fetch<Self::Output>, Error> {
        while let Some(node) = self.climbing.clone() {
            match try_ready!(self.document.parent_node(&node)) {
                Some(parent) => self.climbing = Some(parent),
                None => {
                    self.climbing = None;
                    self.stack.push(Frame { node, order: None });
                }
            }
        }
        while let Some(frame) = self.stack.last_mut() {
            if self.wanted.is_empty() {
                break;
            }
            match frame.order {
                None => {
                    let children = try_ready!(self.document.child_nodes(&frame.node));
                    frame.order = Some(self.visited);
                    self.visited += 1;
                    self.stack.extend(children.into_iter().rev().map(|node| Frame { node, order: None }));
                }
                Some(order) => {
                    let node = frame.node.clone();
                    if node.kind() == NodeKind::Element {
                        let value = try_ready!(self.document.attribute(&node, self.lookup.attribute()));
                        if value.is_some_and(|v| self.matches(&v)) {
                            self.found.push((order, Value::Node(node)));
                        }
                    }
                    self.stack.pop();
                }
            }
        }
        tracing::trace!(lookup = ?self.lookup, found = self.found.len(), "id search done");
        let mut found = std::mem::take(&mut self.found);
        found.sort_unstable_by_key(|(order, _)| *order);
        Ok(Fetch::Ready(found.into_iter().map(|(_, value)| value).collect()))
    }
}

fn search<N: XdmNode>(
    lookup: Lookup,
    ids: Sequence<N>,
    target: Sequence<N>,
    params: &ExecutionParameters<N>,
) -> Sequence<N> {
    let params = params.clone();
    zip_singleton(vec![target], move |mut firsts| {
        let Some(Value::Node(start)) = firsts.pop().flatten() else {
            return Ok(Sequence::empty());
        };
        Ok(ids.map_all(move |ids| {
            let values = ids.iter().filter_map(Value::as_atomic).map(|a| a.string_value());
            let wanted: HashSet<String> = match lookup {
                Lookup::Id => values.flat_map(|v| v.split_whitespace().map(str::to_string).collect::<Vec<_>>()).collect(),
                Lookup::Idref => values.collect(),
            };
            Ok(items_from_resumable(IdSearch::new(lookup, wanted, start, &params)))
        }))
    })
}

pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    for (local, lookup, returns) in [("id", Lookup::Id, "element()*"), ("idref", Lookup::Idref, "node()*")] {
        reg.register(FNS, local, &["xs:string*"], returns, move |ctx, args| {
            let [ids] = take_args::<1, N>(args)?;
            let target = Sequence::singleton(context_item(ctx, &format!("fn:{local}"))?);
            Ok(search(lookup, ids, target, &ctx.params))
        });
        reg.register(FNS, local, &["xs:string*", "node()"], returns, move |ctx, args| {
            let [ids, target] = take_args::<2, N>(args)?;
            Ok(search(lookup, ids, target, &ctx.params))
        });
    }
}
