use super::{context_item, from_resumable, items_from_resumable, take_args, unexpected, zip_singleton};
use crate::consts::FNS;
use crate::engine::doc_order::{OrderKey, SortNodes};
use crate::engine::runtime::{CallContext, Error, FunctionRegistry};
use crate::engine::sequence::Sequence;
use crate::engine::suspend::{try_ready, Fetch, Resumable, ResumeFn};
use crate::model::{NodeKind, QName, XdmNode};
use crate::xdm::{AtomicValue, Value};

type NameAccessor = fn(Option<QName>) -> Option<AtomicValue>;

fn name(q: Option<QName>) -> Option<AtomicValue> {
    Some(AtomicValue::string(q.map(|q| q.to_string()).unwrap_or_default()))
}

fn local_name(q: Option<QName>) -> Option<AtomicValue> {
    Some(AtomicValue::string(q.map(|q| q.local).unwrap_or_default()))
}

fn namespace_uri(q: Option<QName>) -> Option<AtomicValue> {
    Some(AtomicValue::any_uri(q.and_then(|q| q.ns_uri).unwrap_or_default()))
}

fn node_name(q: Option<QName>) -> Option<AtomicValue> {
    q.map(AtomicValue::qname)
}

fn node_of<N: XdmNode>(item: Option<Value<N>>) -> Result<Option<N>, Error> {
    match item {
        None => Ok(None),
        Some(Value::Node(n)) => Ok(Some(n)),
        Some(other) => Err(unexpected("node()", Some(&other))),
    }
}

/// Applies a name accessor; an empty argument counts as a node without name,
/// except for `node-name` which then returns the empty sequence.
fn named<N: XdmNode>(arg: Sequence<N>, accessor: NameAccessor, empty_is_empty: bool) -> Sequence<N> {
    zip_singleton(vec![arg], move |mut firsts| {
        let result = match node_of(firsts.pop().flatten())? {
            Some(node) => accessor(node.name()),
            None if empty_is_empty => None,
            None => accessor(None),
        };
        Ok(result.map_or_else(Sequence::empty, |a| Sequence::singleton(Value::Atomic(a))))
    })
}

fn context_node<N: XdmNode>(ctx: &CallContext<N>, function: &str) -> Result<Sequence<N>, Error> {
    let item = context_item(ctx, function)?;
    node_of(Some(item.clone()))?;
    Ok(Sequence::singleton(item))
}

fn root<N: XdmNode>(arg: Sequence<N>, ctx: &CallContext<N>) -> Sequence<N> {
    let document = std::rc::Rc::clone(&ctx.params.document);
    zip_singleton(vec![arg], move |mut firsts| {
        let Some(mut node) = node_of(firsts.pop().flatten())? else {
            return Ok(Sequence::empty());
        };
        Ok(from_resumable(
            ResumeFn(move || {
                while let Some(parent) = try_ready!(document.parent_node(&node)) {
                    node = parent;
                }
                Ok(Fetch::Ready(node.clone()))
            }),
            Value::Node,
        ))
    })
}

/// Keeps the nodes that have no descendant (innermost) or no ancestor
/// (outermost) within the same sequence; results are in document order.
fn select_by_nesting<N: XdmNode>(arg: Sequence<N>, ctx: &CallContext<N>, innermost: bool) -> Sequence<N> {
    let params = ctx.params.clone();
    arg.map_all(move |items| {
        let nodes = items
            .into_iter()
            .map(|v| node_of(Some(v)).and_then(|n| n.ok_or_else(|| Error::internal("missing node"))))
            .collect::<Result<Vec<_>, Error>>()?;
        let mut sorter = SortNodes::new(nodes, &params);
        Ok(items_from_resumable(ResumeFn(move || {
            Ok(sorter.resume()?.map(|sorted| if innermost { innermost_of(sorted) } else { outermost_of(sorted) }))
        })))
    })
}

fn innermost_of<N: XdmNode>(sorted: Vec<(OrderKey, N)>) -> Vec<Value<N>> {
    // A subtree is contiguous in document order. Attributes extend their
    // element's key but are not its descendants.
    let keep: Vec<bool> = (0..sorted.len())
        .map(|i| {
            !sorted[i + 1..]
                .iter()
                .take_while(|(key, _)| sorted[i].0.contains(key))
                .any(|(_, node)| node.kind() != NodeKind::Attribute)
        })
        .collect();
    sorted.into_iter().zip(keep).filter(|(_, keep)| *keep).map(|((_, n), _)| Value::Node(n)).collect()
}

fn outermost_of<N: XdmNode>(sorted: Vec<(OrderKey, N)>) -> Vec<Value<N>> {
    let mut outer: Option<OrderKey> = None;
    let mut result = Vec::new();
    for (key, node) in sorted {
        if outer.as_ref().is_some_and(|o| o.contains(&key)) {
            continue;
        }
        outer = Some(key);
        result.push(Value::Node(node));
    }
    result
}

pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    let accessors: [(&'static str, &'static str, NameAccessor, bool); 4] = [
        ("name", "xs:string", name, false),
        ("local-name", "xs:string", local_name, false),
        ("namespace-uri", "xs:anyURI", namespace_uri, false),
        ("node-name", "xs:QName?", node_name, true),
    ];
    for (local, returns, accessor, empty_is_empty) in accessors {
        reg.register(FNS, local, &[], returns, move |ctx, _| {
            Ok(named(context_node(ctx, &format!("fn:{local}"))?, accessor, empty_is_empty))
        });
        reg.register(FNS, local, &["node()?"], returns, move |_, args| {
            let [arg] = take_args::<1, N>(args)?;
            Ok(named(arg, accessor, empty_is_empty))
        });
    }
    reg.register(FNS, "root", &[], "node()", |ctx, _| Ok(root(context_node(ctx, "fn:root")?, ctx)));
    reg.register(FNS, "root", &["node()?"], "node()?", |ctx, args| {
        let [arg] = take_args::<1, N>(args)?;
        Ok(root(arg, ctx))
    });
    reg.register(FNS, "innermost", &["node()*"], "node()*", |ctx, args| {
        let [arg] = take_args::<1, N>(args)?;
        Ok(select_by_nesting(arg, ctx, true))
    });
    reg.register(FNS, "outermost", &["node()*"], "node()*", |ctx, args| {
        let [arg] = take_args::<1, N>(args)?;
        Ok(select_by_nesting(arg, ctx, false))
    });
}
