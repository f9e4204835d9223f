use super::{sum_specificity, Bucket, ExprRef, Expression, ExpressionBase, ResultOrder};
use crate::engine::doc_order::sort_nodes;
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, ExecutionParameters};
use crate::engine::sequence::{Sequence, SharedSequence, Step};
use crate::engine::suspend::{try_ready, Fetch};
use crate::model::XdmNode;
use crate::xdm::Value;
use std::collections::HashSet;

/// `step1/step2/...`: each step runs once per node produced by the previous one.
#[derive(Debug)]
pub struct PathExpression<N> {
    base: ExpressionBase<N>,
}

impl<N: XdmNode> PathExpression<N> {
    pub fn new(steps: Vec<ExprRef<N>>) -> Self {
        let mut peer = true;
        for (i, step) in steps.iter().enumerate() {
            let b = step.base();
            peer = b.is_peer && (i == 0 || (peer && b.is_subtree));
        }
        let subtree = steps.iter().all(|s| s.base().is_subtree);
        let base = ExpressionBase::new(sum_specificity(&steps), steps)
            .ordered(ResultOrder::Sorted)
            .locality(peer, subtree);
        Self { base }
    }
}

impl<N: XdmNode> Expression<N> for PathExpression<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn bucket(&self) -> Option<Bucket> {
        self.base.children.first().and_then(|s| s.bucket())
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let mut run = PathRun {
            steps: self.base.children.clone(),
            ctx: ctx.clone(),
            params: params.clone(),
            step_index: 0,
            inputs: Vec::new(),
            inputs_peer: true,
            input_index: 0,
            current: None,
            collected: Vec::new(),
            seen: HashSet::new(),
            sorting: None,
        };
        let mut output: Option<std::vec::IntoIter<Value<N>>> = None;
        Ok(Sequence::from_fn(move || {
            if output.is_none() {
                output = Some(try_ready!(run.resume()).into_iter());
            }
            Ok(output.as_mut().and_then(Iterator::next).map_or(Step::Done, Step::Item))
        }))
    }
}

/// Step-by-step evaluation state; survives suspensions of any step.
struct PathRun<N> {
    steps: Vec<ExprRef<N>>,
    ctx: DynamicContext<N>,
    params: ExecutionParameters<N>,
    step_index: usize,
    /// Results of the previous step.
    inputs: Vec<Value<N>>,
    /// No input contains another one.
    inputs_peer: bool,
    input_index: usize,
    current: Option<Sequence<N>>,
    collected: Vec<Value<N>>,
    seen: HashSet<N>,
    sorting: Option<Sequence<N>>,
}

impl<N: XdmNode> PathRun<N> {
    /// The first step runs once in the caller's own focus.
    fn input_count(&self) -> usize {
        if self.step_index == 0 { 1 } else { self.inputs.len() }
    }

    fn resume(&mut self) -> Result<Fetch<Vec<Value<N>>>, Error> {
        while self.step_index < self.steps.len() {
            if let Some(sorter) = &mut self.sorting {
                let sorted = try_ready!(sorter.try_drain());
                self.sorting = None;
                self.finish_step(sorted);
                continue;
            }
            if self.input_index < self.input_count() {
                let step = &self.steps[self.step_index];
                let seq = match &mut self.current {
                    Some(seq) => seq,
                    slot @ None => {
                        let scoped = if self.step_index == 0 {
                            self.ctx.clone()
                        } else {
                            let input = self.inputs[self.input_index].clone();
                            if !input.is_node() {
                                return Err(Error::from_code(
                                    ErrorCode::XPTY0019,
                                    "the / operator can only be applied to nodes",
                                ));
                            }
                            self.ctx.scope_with_focus(1, input.clone(), SharedSequence::from_vec(vec![input]))
                        };
                        slot.insert(step.evaluate_maybe_statically(&scoped, &self.params)?)
                    }
                };
                let mut items = try_ready!(seq.try_drain());
                self.current = None;
                self.input_index += 1;
                if step.result_order() == ResultOrder::ReverseSorted {
                    items.reverse();
                }
                for item in items {
                    let fresh = match &item {
                        Value::Node(n) => self.seen.insert(n.clone()),
                        _ => true,
                    };
                    if fresh {
                        self.collected.push(item);
                    }
                }
                continue;
            }
            self.end_step()?;
        }
        Ok(Fetch::Ready(std::mem::take(&mut self.inputs)))
    }

    /// All inputs of the current step are done; sort if order is not guaranteed.
    fn end_step(&mut self) -> Result<(), Error> {
        let has_nodes = self.collected.iter().any(Value::is_node);
        if has_nodes && self.collected.iter().any(|v| !v.is_node()) {
            return Err(Error::from_code(
                ErrorCode::XPTY0018,
                "the path operator should either return nodes or non-nodes, mixed sequences are not allowed",
            ));
        }
        let step = self.steps[self.step_index].base();
        let concatenation_ordered = self.input_count() <= 1 || (self.inputs_peer && step.is_subtree);
        let needs_sort = step.result_order == ResultOrder::Unsorted || !concatenation_ordered;
        let collected = std::mem::take(&mut self.collected);
        if has_nodes && needs_sort && collected.len() > 1 {
            self.sorting = Some(sort_nodes(collected, &self.params));
        } else {
            self.finish_step(collected);
        }
        Ok(())
    }

    fn finish_step(&mut self, results: Vec<Value<N>>) {
        let step = self.steps[self.step_index].base();
        self.inputs_peer = step.is_peer && (self.input_count() <= 1 || (self.inputs_peer && step.is_subtree));
        tracing::trace!(step = self.step_index, inputs = self.input_count(), results = results.len(), "path step done");
        self.inputs = results;
        self.input_index = 0;
        self.step_index += 1;
        self.seen.clear();
    }
}
