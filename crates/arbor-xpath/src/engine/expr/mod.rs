//! Expression tree nodes.
//!
//! Trees are assembled by a host (typically a parser) from the node types in
//! the submodules, prepared once with
//! [`perform_static_evaluation`](Expression::perform_static_evaluation) and
//! evaluated any number of times.

pub mod arithmetic;
pub mod comparison;
pub mod constructors;
pub mod filter;
pub mod function_call;
pub mod literals;
pub mod logical;
pub mod path;
pub mod specificity;
pub mod step;

pub use arithmetic::{ArithmeticOp, BinaryNumeric, Unary, UnaryOp};
pub use comparison::{ComparisonOp, GeneralComparison};
pub use constructors::{ArrayConstructor, ArrayConstructorKind, MapConstructor};
pub use filter::Filter;
pub use function_call::{FunctionCall, NamedFunctionRef};
pub use literals::{ContextItem, Literal, SequenceConstructor, VarRef};
pub use logical::{And, Or};
pub use path::PathExpression;
pub use specificity::{Bucket, Specificity, SpecificityKind};
pub use step::{Axis, AxisStep, NodeTest};

use crate::engine::runtime::{DynamicContext, Error, ExecutionParameters, StaticContext};
use crate::engine::sequence::Sequence;
use crate::engine::suspend::Fetch;
use crate::model::XdmNode;
use crate::xdm::Value;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

pub type ExprRef<N> = Rc<dyn Expression<N>>;

/// Order in which an expression yields nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrder {
    Sorted,
    ReverseSorted,
    Unsorted,
}

/// State every expression node carries.
pub struct ExpressionBase<N> {
    pub specificity: Specificity,
    pub children: Vec<ExprRef<N>>,
    pub can_be_statically_evaluated: bool,
    pub result_order: ResultOrder,
    /// Results never contain a node and one of its descendants.
    pub is_peer: bool,
    /// Results are all within the subtree of the context node.
    pub is_subtree: bool,
    static_value: OnceCell<Vec<Value<N>>>,
    static_context: OnceCell<Rc<StaticContext<N>>>,
}

impl<N> ExpressionBase<N> {
    pub fn new(specificity: Specificity, children: Vec<ExprRef<N>>) -> Self {
        Self {
            specificity,
            children,
            can_be_statically_evaluated: false,
            result_order: ResultOrder::Sorted,
            is_peer: false,
            is_subtree: false,
            static_value: OnceCell::new(),
            static_context: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn statically_evaluable(mut self, yes: bool) -> Self {
        self.can_be_statically_evaluated = yes;
        self
    }

    #[must_use]
    pub fn ordered(mut self, order: ResultOrder) -> Self {
        self.result_order = order;
        self
    }

    #[must_use]
    pub fn locality(mut self, peer: bool, subtree: bool) -> Self {
        self.is_peer = peer;
        self.is_subtree = subtree;
        self
    }

    /// The static context recorded during preparation.
    pub fn static_context(&self) -> Option<&Rc<StaticContext<N>>> {
        self.static_context.get()
    }

    /// The value computed during preparation, if the node is constant.
    pub fn static_value(&self) -> Option<&[Value<N>]> {
        self.static_value.get().map(Vec::as_slice)
    }
}

impl<N> fmt::Debug for ExpressionBase<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionBase")
            .field("specificity", &self.specificity)
            .field("children", &self.children.len())
            .field("static", &self.can_be_statically_evaluated)
            .field("result_order", &self.result_order)
            .finish_non_exhaustive()
    }
}

pub trait Expression<N: XdmNode>: fmt::Debug {
    fn base(&self) -> &ExpressionBase<N>;

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error>;

    /// Class of nodes this expression can match, if it is that narrow.
    fn bucket(&self) -> Option<Bucket> {
        None
    }

    fn specificity(&self) -> Specificity {
        self.base().specificity
    }

    fn can_be_statically_evaluated(&self) -> bool {
        self.base().can_be_statically_evaluated
    }

    fn result_order(&self) -> ResultOrder {
        self.base().result_order
    }

    /// Evaluate, answering from the value cached at preparation time when
    /// there is one.
    fn evaluate_maybe_statically(
        &self,
        ctx: &DynamicContext<N>,
        params: &ExecutionParameters<N>,
    ) -> Result<Sequence<N>, Error> {
        match self.base().static_value() {
            Some(values) => Ok(Sequence::from_vec(values.to_vec())),
            None => self.evaluate(ctx, params),
        }
    }

    /// Prepare the subtree: record the static context and pre-compute
    /// constant nodes.
    ///
    /// A constant node whose evaluation fails or suspends is left to be
    /// evaluated at run time, where the error surfaces in context.
    fn perform_static_evaluation(&self, static_ctx: &Rc<StaticContext<N>>) {
        let base = self.base();
        for child in &base.children {
            child.perform_static_evaluation(static_ctx);
        }
        let _ = base.static_context.set(Rc::clone(static_ctx));
        if !base.can_be_statically_evaluated || base.static_value.get().is_some() {
            return;
        }
        let attempt = self
            .evaluate(&DynamicContext::new(), &ExecutionParameters::detached())
            .and_then(|mut seq| seq.try_drain());
        match attempt {
            Ok(Fetch::Ready(values)) => {
                tracing::debug!(expression = ?self, items = values.len(), "cached constant subexpression");
                let _ = base.static_value.set(values);
            }
            Ok(Fetch::Pending(_)) => {
                tracing::debug!(expression = ?self, "constant subexpression suspended; evaluating at run time");
            }
            Err(error) => {
                tracing::debug!(expression = ?self, %error, "constant subexpression failed; evaluating at run time");
            }
        }
    }
}

/// Specificity of the most specific expression.
pub(crate) fn max_specificity<N: XdmNode>(exprs: &[ExprRef<N>]) -> Specificity {
    exprs.iter().map(|e| e.specificity()).max().unwrap_or_default()
}

/// Sum of the specificities of all expressions.
pub(crate) fn sum_specificity<N: XdmNode>(exprs: &[ExprRef<N>]) -> Specificity {
    exprs.iter().fold(Specificity::default(), |acc, e| acc.add(&e.specificity()))
}

/// The shared bucket, if every expression declares the same one.
pub(crate) fn common_bucket<N: XdmNode>(exprs: &[ExprRef<N>]) -> Option<Bucket> {
    let mut buckets = exprs.iter().map(|e| e.bucket());
    let first = buckets.next()??;
    buckets.all(|b| b.as_ref() == Some(&first)).then_some(first)
}
