//! Atomization of single items.

use crate::engine::runtime::{Error, ErrorCode, ExecutionParameters};
use crate::engine::suspend::{try_ready, Fetch, Resumable};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::{AtomicValue, Value};

/// Resumable atomization of one item.
pub enum ItemAtomizer<N> {
    Ready(Option<AtomicValue>),
    Data { node: N, kind: NodeKind, params: ExecutionParameters<N> },
    Descendants { stack: Vec<N>, text: String, params: ExecutionParameters<N> },
}

/// Start atomizing `item`.
///
/// Arrays must be atomized member by member by the caller; see
/// [`Sequence::atomize`](crate::engine::sequence::Sequence::atomize).
pub fn atomize_item<N: XdmNode>(item: &Value<N>, params: &ExecutionParameters<N>) -> Result<ItemAtomizer<N>, Error> {
    match item {
        Value::Atomic(a) => Ok(ItemAtomizer::Ready(Some(a.clone()))),
        Value::Node(n) => Ok(match n.kind() {
            NodeKind::Element | NodeKind::Document => {
                ItemAtomizer::Descendants { stack: vec![n.clone()], text: String::new(), params: params.clone() }
            }
            kind => ItemAtomizer::Data { node: n.clone(), kind, params: params.clone() },
        }),
        Value::Array(_) => {
            Err(Error::type_error("an array cannot be atomized as a single item; atomize its members instead"))
        }
        Value::Map(_) | Value::Function(_) => Err(Error::from_code(
            ErrorCode::FOTY0013,
            format!("atomization is not defined for {}", item.type_name()),
        )),
    }
}

impl<N: XdmNode> Resumable for ItemAtomizer<N> {
    type Output = AtomicValue;

    fn resume(&mut self) -> Result<Fetch<AtomicValue>, Error> {
        match self {
            ItemAtomizer::Ready(value) => {
                value.take().map(Fetch::Ready).ok_or_else(|| Error::internal("atomized value taken twice"))
            }
            ItemAtomizer::Data { node, kind, params } => {
                let data = try_ready!(params.document.data(node));
                Ok(Fetch::Ready(match kind {
                    NodeKind::Comment | NodeKind::ProcessingInstruction => AtomicValue::string(data),
                    _ => AtomicValue::untyped(data),
                }))
            }
            ItemAtomizer::Descendants { stack, text, params } => {
                while let Some(node) = stack.last().cloned() {
                    match node.kind() {
                        NodeKind::Text => {
                            let data = try_ready!(params.document.data(&node));
                            text.push_str(&data);
                            stack.pop();
                        }
                        NodeKind::Element | NodeKind::Document => {
                            let children = try_ready!(params.document.child_nodes(&node));
                            stack.pop();
                            stack.extend(children.into_iter().rev());
                        }
                        _ => {
                            stack.pop();
                        }
                    }
                }
                Ok(Fetch::Ready(AtomicValue::untyped(std::mem::take(text))))
            }
        }
    }
}
