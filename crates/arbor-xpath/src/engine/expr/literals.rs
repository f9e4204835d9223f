use super::{sum_specificity, ExprRef, Expression, ExpressionBase, ResultOrder, Specificity};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, ExecutionParameters};
use crate::engine::sequence::Sequence;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, Value};
use std::fmt;

/// A constant item.
pub struct Literal<N> {
    base: ExpressionBase<N>,
    value: Value<N>,
}

impl<N: XdmNode> Literal<N> {
    pub fn new(value: impl Into<Value<N>>) -> Self {
        Self { base: ExpressionBase::new(Specificity::default(), Vec::new()).statically_evaluable(true), value: value.into() }
    }
}

impl<N: XdmNode> fmt::Debug for Literal<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Literal").field(&self.value).finish()
    }
}

impl<N: XdmNode> Expression<N> for Literal<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, _: &DynamicContext<N>, _: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        Ok(Sequence::singleton(self.value.clone()))
    }
}

/// The comma operator: every operand's items, in order.
#[derive(Debug)]
pub struct SequenceConstructor<N> {
    base: ExpressionBase<N>,
}

impl<N: XdmNode> SequenceConstructor<N> {
    pub fn new(members: Vec<ExprRef<N>>) -> Self {
        let is_static = members.iter().all(|m| m.can_be_statically_evaluated());
        let base = ExpressionBase::new(sum_specificity(&members), members)
            .statically_evaluable(is_static)
            .ordered(ResultOrder::Unsorted);
        Self { base }
    }
}

impl<N: XdmNode> Expression<N> for SequenceConstructor<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let members = self.base.children.clone();
        let ctx = ctx.clone();
        let params = params.clone();
        // Operands are evaluated when the previous one is exhausted.
        Ok(Sequence::concat(
            members
                .into_iter()
                .map(|m| {
                    let (ctx, params) = (ctx.clone(), params.clone());
                    Sequence::deferred(move || m.evaluate_maybe_statically(&ctx, &params))
                })
                .collect(),
        ))
    }
}

/// The context item, `.`.
#[derive(Debug)]
pub struct ContextItem<N> {
    base: ExpressionBase<N>,
}

impl<N: XdmNode> ContextItem<N> {
    pub fn new() -> Self {
        Self { base: ExpressionBase::new(Specificity::default(), Vec::new()).locality(true, false) }
    }
}

impl<N: XdmNode> Default for ContextItem<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: XdmNode> Expression<N> for ContextItem<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, _: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        ctx.context_item
            .clone()
            .map(Sequence::singleton)
            .ok_or_else(|| Error::missing_context("the context item expression"))
    }
}

/// A variable reference, `$name`.
#[derive(Debug)]
pub struct VarRef<N> {
    base: ExpressionBase<N>,
    name: ExpandedName,
}

impl<N: XdmNode> VarRef<N> {
    pub fn new(name: ExpandedName) -> Self {
        Self { base: ExpressionBase::new(Specificity::default(), Vec::new()).ordered(ResultOrder::Unsorted), name }
    }
}

impl<N: XdmNode> Expression<N> for VarRef<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, _: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        ctx.lookup_variable(&self.name)
            .map(|shared| shared.reader())
            .ok_or_else(|| Error::from_code(ErrorCode::XPST0008, format!("variable ${} is not bound", self.name)))
    }
}
