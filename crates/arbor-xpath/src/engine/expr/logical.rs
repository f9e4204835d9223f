use super::{common_bucket, max_specificity, sum_specificity, Bucket, ExprRef, Expression, ExpressionBase};
use crate::engine::runtime::{DynamicContext, Error, ExecutionParameters};
use crate::engine::sequence::{Sequence, Step};
use crate::engine::suspend::try_ready;
use crate::model::XdmNode;
use crate::xdm::{AtomicValue, Value};

/// Evaluates operand EBVs left to right until one equals `stop_on`.
fn short_circuit<N: XdmNode>(
    operands: Vec<ExprRef<N>>,
    stop_on: bool,
    ctx: &DynamicContext<N>,
    params: &ExecutionParameters<N>,
) -> Sequence<N> {
    let ctx = ctx.clone();
    let params = params.clone();
    let mut index = 0;
    let mut current: Option<Sequence<N>> = None;
    let mut done = false;
    Sequence::from_fn(move || {
        if done {
            return Ok(Step::Done);
        }
        while index < operands.len() {
            let seq = match &mut current {
                Some(seq) => seq,
                slot @ None => slot.insert(operands[index].evaluate_maybe_statically(&ctx, &params)?),
            };
            let ebv = try_ready!(seq.try_get_effective_boolean_value());
            current = None;
            if ebv == stop_on {
                done = true;
                return Ok(Step::Item(Value::Atomic(AtomicValue::boolean(stop_on))));
            }
            index += 1;
        }
        done = true;
        Ok(Step::Item(Value::Atomic(AtomicValue::boolean(!stop_on))))
    })
}

/// `a or b or ...`
#[derive(Debug)]
pub struct Or<N> {
    base: ExpressionBase<N>,
    bucket: Option<Bucket>,
}

impl<N: XdmNode> Or<N> {
    pub fn new(operands: Vec<ExprRef<N>>) -> Self {
        let is_static = operands.iter().all(|o| o.can_be_statically_evaluated());
        let bucket = common_bucket(&operands);
        let base = ExpressionBase::new(max_specificity(&operands), operands).statically_evaluable(is_static);
        Self { base, bucket }
    }
}

impl<N: XdmNode> Expression<N> for Or<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn bucket(&self) -> Option<Bucket> {
        self.bucket.clone()
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        Ok(short_circuit(self.base.children.clone(), true, ctx, params))
    }
}

/// `a and b and ...`
#[derive(Debug)]
pub struct And<N> {
    base: ExpressionBase<N>,
    bucket: Option<Bucket>,
}

impl<N: XdmNode> And<N> {
    pub fn new(operands: Vec<ExprRef<N>>) -> Self {
        let is_static = operands.iter().all(|o| o.can_be_statically_evaluated());
        // Any operand's bucket narrows the conjunction.
        let bucket = operands.iter().find_map(|o| o.bucket());
        let base = ExpressionBase::new(sum_specificity(&operands), operands).statically_evaluable(is_static);
        Self { base, bucket }
    }
}

impl<N: XdmNode> Expression<N> for And<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn bucket(&self) -> Option<Bucket> {
        self.bucket.clone()
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        Ok(short_circuit(self.base.children.clone(), false, ctx, params))
    }
}
