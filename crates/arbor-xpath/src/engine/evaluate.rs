//! Entry points tying preparation and evaluation together.

use crate::engine::expr::ExprRef;
use crate::engine::runtime::{DynamicContext, Error, ExecutionParameters, StaticContext};
use crate::engine::sequence::Sequence;
use crate::model::XdmNode;
use crate::xdm::Value;
use std::rc::Rc;

/// Bind `expr` to `static_ctx` and cache every constant subexpression.
///
/// Calling this more than once is harmless; later calls keep the first
/// static context.
pub fn prepare<N: XdmNode>(expr: &ExprRef<N>, static_ctx: &Rc<StaticContext<N>>) {
    expr.perform_static_evaluation(static_ctx);
}

/// Start evaluating; items are computed as the returned sequence is pulled.
pub fn evaluate_stream<N: XdmNode>(
    expr: &ExprRef<N>,
    ctx: &DynamicContext<N>,
    params: &ExecutionParameters<N>,
) -> Result<Sequence<N>, Error> {
    expr.evaluate_maybe_statically(ctx, params)
}

/// Evaluate to completion, awaiting every suspension the document raises.
pub async fn evaluate<N: XdmNode>(
    expr: &ExprRef<N>,
    ctx: &DynamicContext<N>,
    params: &ExecutionParameters<N>,
) -> Result<Vec<Value<N>>, Error> {
    evaluate_stream(expr, ctx, params)?.materialize().await
}

/// [`evaluate`] on the current thread.
pub fn evaluate_blocking<N: XdmNode>(
    expr: &ExprRef<N>,
    ctx: &DynamicContext<N>,
    params: &ExecutionParameters<N>,
) -> Result<Vec<Value<N>>, Error> {
    futures::executor::block_on(evaluate(expr, ctx, params))
}
