use super::{Bucket, ExprRef, Expression, ExpressionBase};
use crate::engine::runtime::{DynamicContext, Error, ExecutionParameters};
use crate::engine::sequence::{Sequence, SharedSequence, Step};
use crate::engine::suspend::{try_ready, Fetch};
use crate::model::XdmNode;
use crate::xdm::{Scalar, Value};
use std::fmt;

/// `selector[predicate]`
pub struct Filter<N> {
    base: ExpressionBase<N>,
    selector: ExprRef<N>,
    predicate: ExprRef<N>,
}

impl<N: XdmNode> Filter<N> {
    pub fn new(selector: ExprRef<N>, predicate: ExprRef<N>) -> Self {
        let specificity = selector.specificity().add(&predicate.specificity());
        let is_static = selector.can_be_statically_evaluated() && predicate.can_be_statically_evaluated();
        let selector_base = selector.base();
        let base = ExpressionBase::new(specificity, vec![selector.clone(), predicate.clone()])
            .statically_evaluable(is_static)
            .ordered(selector.result_order())
            .locality(selector_base.is_peer, selector_base.is_subtree);
        Self { base, selector, predicate }
    }
}

impl<N: XdmNode> fmt::Debug for Filter<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("selector", &self.selector).field("predicate", &self.predicate).finish()
    }
}

/// A numeric predicate value as a position; `None` for non-integral values.
#[allow(clippy::cast_possible_truncation)]
fn as_position<N>(value: &Value<N>) -> Option<Option<i64>> {
    let Value::Atomic(a) = value else { return None };
    if !a.is_numeric() {
        return None;
    }
    Some(match a.value() {
        Scalar::Integer(i) => Some(*i),
        _ => a.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64),
    })
}

enum Gate {
    /// Keep only the item at this 1-based position.
    Position(i64),
    Everything,
    Nothing,
}

/// Filtering by a predicate whose value does not depend on the focus.
fn filter_constant<N: XdmNode>(mut values: Sequence<N>, mut predicate: Sequence<N>) -> Sequence<N> {
    let mut gate: Option<Gate> = None;
    Sequence::from_fn(move || {
        let gate = match &mut gate {
            Some(g) => g,
            slot @ None => {
                let decided = match try_ready!(predicate.try_get_first()) {
                    None => Gate::Nothing,
                    Some(first) => match as_position(&first) {
                        Some(Some(position)) => Gate::Position(position),
                        Some(None) => Gate::Nothing,
                        None => {
                            if try_ready!(predicate.try_get_effective_boolean_value()) {
                                Gate::Everything
                            } else {
                                Gate::Nothing
                            }
                        }
                    },
                };
                slot.insert(decided)
            }
        };
        match gate {
            Gate::Nothing => Ok(Step::Done),
            Gate::Everything => values.next(),
            Gate::Position(remaining) => loop {
                if *remaining < 1 {
                    return Ok(Step::Done);
                }
                match values.next()? {
                    Step::Item(v) => {
                        *remaining -= 1;
                        if *remaining == 0 {
                            return Ok(Step::Item(v));
                        }
                    }
                    other => return Ok(other),
                }
            },
        }
    })
}

/// Filtering with the predicate re-evaluated for every item in its own focus.
fn filter_per_item<N: XdmNode>(
    values: Sequence<N>,
    predicate: ExprRef<N>,
    ctx: &DynamicContext<N>,
    params: &ExecutionParameters<N>,
) -> Sequence<N> {
    let ctx = ctx.clone();
    let params = params.clone();
    let shared = SharedSequence::new(values);
    let mut index = 0usize;
    let mut current: Option<(Value<N>, Sequence<N>)> = None;
    Sequence::from_fn(move || loop {
        let (item, result) = match &mut current {
            Some(c) => c,
            slot @ None => {
                let item = match shared.fetch(index)? {
                    Fetch::Ready(Some(item)) => item,
                    Fetch::Ready(None) => return Ok(Step::Done),
                    Fetch::Pending(a) => return Ok(Step::Pending(a)),
                };
                let focus = ctx.scope_with_focus(index + 1, item.clone(), shared.clone());
                let result = predicate.evaluate_maybe_statically(&focus, &params)?;
                slot.insert((item, result))
            }
        };
        let keep = match try_ready!(result.try_get_first()) {
            None => false,
            Some(first) => match as_position(&first) {
                Some(position) => position.and_then(|p| usize::try_from(p).ok()) == Some(index + 1),
                None => try_ready!(result.try_get_effective_boolean_value()),
            },
        };
        let item = item.clone();
        current = None;
        index += 1;
        if keep {
            return Ok(Step::Item(item));
        }
    })
}

impl<N: XdmNode> Expression<N> for Filter<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn bucket(&self) -> Option<Bucket> {
        self.selector.bucket()
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let values = self.selector.evaluate_maybe_statically(ctx, params)?;
        if self.predicate.can_be_statically_evaluated() {
            let predicate = self.predicate.evaluate_maybe_statically(ctx, params)?;
            return Ok(filter_constant(values, predicate));
        }
        Ok(filter_per_item(values, self.predicate.clone(), ctx, params))
    }
}
