use super::{Expression, ExprRef, ExpressionBase, ResultOrder, Specificity, SpecificityKind};
use crate::engine::runtime::{DynamicContext, Error, ExecutionParameters};
use crate::engine::sequence::{Sequence, SharedSequence};
use crate::model::XdmNode;
use crate::xdm::{ArrayValue, MapValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayConstructorKind {
    /// `[a, b, c]`: one member per expression.
    Square,
    /// `array { a, b, c }`: one member per item of the single expression.
    Curly,
}

#[derive(Debug)]
pub struct ArrayConstructor<N> {
    base: ExpressionBase<N>,
    kind: ArrayConstructorKind,
}

impl<N: XdmNode> ArrayConstructor<N> {
    pub fn new(kind: ArrayConstructorKind, members: Vec<ExprRef<N>>) -> Self {
        let is_static = members.iter().all(|m| m.can_be_statically_evaluated());
        let base = ExpressionBase::new(Specificity::of(SpecificityKind::External), members)
            .statically_evaluable(is_static)
            .ordered(ResultOrder::Unsorted);
        Self { base, kind }
    }
}

impl<N: XdmNode> Expression<N> for ArrayConstructor<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let members = &self.base.children;
        match self.kind {
            ArrayConstructorKind::Curly => match members.first() {
                Some(member) => Ok(member
                    .evaluate_maybe_statically(ctx, params)?
                    .map_all(|items| Ok(Sequence::singleton(Value::Array(ArrayValue::from_items(items)))))),
                None => Ok(Sequence::singleton(Value::Array(ArrayValue::new(Vec::new())))),
            },
            ArrayConstructorKind::Square => {
                let members = members
                    .iter()
                    .map(|m| m.evaluate_maybe_statically(ctx, params).map(SharedSequence::new))
                    .collect::<Result<Vec<_>, Error>>()?;
                Ok(Sequence::singleton(Value::Array(ArrayValue::new(members))))
            }
        }
    }
}

/// `map { k1: v1, k2: v2 }`
#[derive(Debug)]
pub struct MapConstructor<N> {
    base: ExpressionBase<N>,
}

impl<N: XdmNode> MapConstructor<N> {
    /// Children alternate key and value expressions.
    pub fn new(entries: Vec<(ExprRef<N>, ExprRef<N>)>) -> Self {
        let children: Vec<ExprRef<N>> = entries.into_iter().flat_map(|(k, v)| [k, v]).collect();
        let is_static = children.iter().all(|c| c.can_be_statically_evaluated());
        let base = ExpressionBase::new(Specificity::of(SpecificityKind::External), children)
            .statically_evaluable(is_static)
            .ordered(ResultOrder::Unsorted);
        Self { base }
    }
}

impl<N: XdmNode> Expression<N> for MapConstructor<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for pair in self.base.children.chunks(2) {
            let [key, value] = pair else {
                return Err(Error::internal("map constructor entry without a value"));
            };
            keys.push(key.evaluate_maybe_statically(ctx, params)?.atomize(params).map_all(|mut items| {
                match (items.pop(), items.is_empty()) {
                    (Some(key @ Value::Atomic(_)), true) => Ok(Sequence::singleton(key)),
                    _ => Err(Error::type_error("a map key must be a single atomic value")),
                }
            }));
            values.push(SharedSequence::new(value.evaluate_maybe_statically(ctx, params)?));
        }
        Ok(Sequence::concat(keys).map_all(move |keys| {
            let entries = keys
                .into_iter()
                .zip(values)
                .filter_map(|(k, v)| match k {
                    Value::Atomic(k) => Some((k, v)),
                    _ => None,
                })
                .collect();
            Ok(Sequence::singleton(Value::Map(MapValue::new(entries)?)))
        }))
    }
}
