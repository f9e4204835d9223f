//! Lazy, suspension-capable XPath 3.1 style expression evaluation.
//!
//! Expression trees are built by a host (usually a parser), prepared once
//! against a [`StaticContext`] and then evaluated against a [`DynamicContext`]
//! and [`ExecutionParameters`]. Evaluation yields a [`Sequence`] that is pulled
//! item by item; whenever the host document cannot answer synchronously the
//! pull returns [`Step::Pending`] carrying an [`Awaitable`] to wait on.

pub mod consts;
pub mod engine;
pub mod model;
pub mod xdm;

pub use engine::evaluate::{evaluate, evaluate_blocking, evaluate_stream, prepare};
pub use engine::expr::{Expression, ExprRef};
pub use engine::runtime::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, ErrorKind, ExecutionParameters,
    FunctionRegistry, StaticContext, StaticContextBuilder,
};
pub use engine::sequence::{Sequence, SharedSequence, Step};
pub use engine::suspend::{Awaitable, Fetch, Resumable};
pub use model::{DocumentFacade, NodeKind, QName, XdmNode};
pub use xdm::{AtomicValue, ExpandedName, Scalar, TypeName, Value};
