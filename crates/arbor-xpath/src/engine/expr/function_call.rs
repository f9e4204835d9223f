use super::{ExprRef, Expression, ExpressionBase, ResultOrder, Specificity, SpecificityKind};
use crate::engine::functions::arrays::array_get;
use crate::engine::runtime::{CallContext, DynamicContext, Error, ErrorCode, ExecutionParameters, StaticContext};
use crate::engine::sequence::{Sequence, SharedSequence};
use crate::model::XdmNode;
use crate::xdm::{AtomicValue, ExpandedName, FunctionImpl, FunctionValue, SequenceType, Value};
use std::fmt;
use std::rc::Rc;

fn prepared_context<N: XdmNode>(base: &ExpressionBase<N>) -> Result<Rc<StaticContext<N>>, Error> {
    base.static_context().cloned().ok_or_else(|| Error::internal("expression evaluated before it was prepared"))
}

/// A function item for anything callable: functions, maps (arity 1, key
/// lookup) and arrays (arity 1, member lookup).
pub fn callable<N: XdmNode>(item: Value<N>) -> Result<FunctionValue<N>, Error> {
    match item {
        Value::Function(f) => Ok(f),
        Value::Map(map) => {
            let implementation: FunctionImpl<N> = Rc::new(move |_: &CallContext<N>, mut args: Vec<Sequence<N>>| {
                let map = map.clone();
                Ok(sole_argument(&mut args)?.map_all(move |items| {
                    let key = single_key(items)?;
                    Ok(map.get(&key).map_or_else(Sequence::empty, SharedSequence::reader))
                }))
            });
            Ok(FunctionValue::new(
                None,
                vec![SequenceType::parse("xs:anyAtomicType")],
                SequenceType::parse("item()*"),
                implementation,
            ))
        }
        Value::Array(array) => {
            let implementation: FunctionImpl<N> = Rc::new(move |_: &CallContext<N>, mut args: Vec<Sequence<N>>| {
                let array = array.clone();
                Ok(sole_argument(&mut args)?.map_all(move |items| {
                    let position = single_key(items)?;
                    array_get(&array, &position).map(SharedSequence::reader)
                }))
            });
            Ok(FunctionValue::new(
                None,
                vec![SequenceType::parse("xs:integer")],
                SequenceType::parse("item()*"),
                implementation,
            ))
        }
        other => Err(Error::type_error(format!(
            "expected base expression to evaluate to a function item, got {}",
            other.type_name()
        ))),
    }
}

fn sole_argument<N: XdmNode>(args: &mut Vec<Sequence<N>>) -> Result<Sequence<N>, Error> {
    args.pop().ok_or_else(|| Error::internal("lookup called without an argument"))
}

fn single_key<N: XdmNode>(mut items: Vec<Value<N>>) -> Result<AtomicValue, Error> {
    match (items.pop(), items.is_empty()) {
        (Some(Value::Atomic(key)), true) => Ok(key),
        _ => Err(Error::type_error("lookup expects a single atomic key")),
    }
}

/// Dynamic function call `f(a, ?, c)`. `None` arguments are placeholders.
pub struct FunctionCall<N> {
    base: ExpressionBase<N>,
    function: ExprRef<N>,
    arguments: Vec<Option<ExprRef<N>>>,
}

impl<N: XdmNode> FunctionCall<N> {
    pub fn new(function: ExprRef<N>, arguments: Vec<Option<ExprRef<N>>>) -> Self {
        let children = std::iter::once(Rc::clone(&function)).chain(arguments.iter().flatten().cloned()).collect();
        let base = ExpressionBase::new(Specificity::of(SpecificityKind::External), children)
            .ordered(ResultOrder::Unsorted)
            .locality(false, false);
        Self { base, function, arguments }
    }

    /// Static call of a named function with every argument supplied.
    pub fn named(name: ExpandedName, arguments: Vec<ExprRef<N>>) -> Self {
        let function = Rc::new(NamedFunctionRef::new(name, arguments.len()));
        Self::new(function, arguments.into_iter().map(Some).collect())
    }
}

impl<N: XdmNode> fmt::Debug for FunctionCall<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("function", &self.function)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl<N: XdmNode> Expression<N> for FunctionCall<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let static_ctx = prepared_context(&self.base)?;
        let arguments = self.arguments.clone();
        let (ctx, params) = (ctx.clone(), params.clone());
        let function = self.function.evaluate_maybe_statically(&ctx, &params)?;
        Ok(function.map_all(move |mut items| {
            if items.len() != 1 {
                return Err(Error::type_error(format!(
                    "expected base expression to evaluate to a sequence with a single item, got {} items",
                    items.len()
                )));
            }
            let Some(item) = items.pop() else {
                return Err(Error::internal("function item vanished"));
            };
            let function = callable(item)?;
            if function.arity() != arguments.len() {
                return Err(Error::type_error(format!(
                    "expected arity of function {} to be {}, got function with arity of {}",
                    function.label(),
                    arguments.len(),
                    function.arity()
                )));
            }
            let evaluated = arguments
                .iter()
                .map(|arg| arg.as_ref().map(|a| a.evaluate_maybe_statically(&ctx, &params)).transpose())
                .collect::<Result<Vec<_>, Error>>()?;
            if evaluated.iter().any(Option::is_none) {
                return Ok(Sequence::singleton(Value::Function(function.apply_arguments(evaluated))));
            }
            let call = CallContext { dynamic: ctx, params, static_ctx };
            tracing::trace!(function = %function.label(), "calling function");
            function.invoke(&call, evaluated.into_iter().flatten().collect())
        }))
    }
}

/// `name#arity`, resolved against the function registry.
#[derive(Debug)]
pub struct NamedFunctionRef<N> {
    base: ExpressionBase<N>,
    name: ExpandedName,
    arity: usize,
}

impl<N: XdmNode> NamedFunctionRef<N> {
    pub fn new(name: ExpandedName, arity: usize) -> Self {
        let base = ExpressionBase::new(Specificity::default(), Vec::new()).statically_evaluable(true);
        Self { base, name, arity }
    }
}

impl<N: XdmNode> Expression<N> for NamedFunctionRef<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, _: &DynamicContext<N>, _: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let static_ctx = prepared_context(&self.base)?;
        match static_ctx.functions.lookup(&self.name, self.arity) {
            Some(function) => Ok(Sequence::singleton(Value::Function(function))),
            None => {
                tracing::debug!(name = %self.name, arity = self.arity, "function lookup failed");
                Err(Error::from_code(
                    ErrorCode::XPST0017,
                    format!("function {}#{} is not defined", self.name, self.arity),
                ))
            }
        }
    }
}
