//! Built-in function library.
//!
//! Implementations receive their arguments already converted to the declared
//! types (see [`convert_arguments`](crate::engine::conversion::convert_arguments))
//! and return lazy sequences; nothing here blocks on the host.

pub(crate) mod arrays;
mod constructors;
mod debugging;
mod ids;
mod json;
mod maps;
mod nodes;
mod sequences;

use crate::engine::runtime::{CallContext, Error, FunctionRegistry};
use crate::engine::sequence::{Sequence, Step};
use crate::engine::suspend::{try_ready, Resumable};
use crate::model::XdmNode;
use crate::xdm::{ArrayValue, AtomicValue, FunctionValue, MapValue, Scalar, Value};

/// Registry with every built-in function in the `fn`, `array`, `map` and `xs` namespaces.
pub fn default_function_registry<N: XdmNode>() -> FunctionRegistry<N> {
    let mut reg = FunctionRegistry::new();
    sequences::register(&mut reg);
    nodes::register(&mut reg);
    ids::register(&mut reg);
    json::register(&mut reg);
    debugging::register(&mut reg);
    arrays::register(&mut reg);
    maps::register(&mut reg);
    constructors::register(&mut reg);
    reg
}

/// The argument list as a fixed-size array; the registry guarantees the arity.
fn take_args<const K: usize, N>(args: Vec<Sequence<N>>) -> Result<[Sequence<N>; K], Error> {
    <[Sequence<N>; K]>::try_from(args).map_err(|args| {
        Error::internal(format!("expected {K} arguments, got {}", args.len()))
    })
}

fn boolean<N: XdmNode>(b: bool) -> Sequence<N> {
    Sequence::singleton(Value::Atomic(AtomicValue::boolean(b)))
}

fn boolean_value<N>(b: bool) -> Value<N> {
    Value::Atomic(AtomicValue::boolean(b))
}

fn integer<N: XdmNode>(n: usize) -> Sequence<N> {
    Sequence::singleton(Value::Atomic(AtomicValue::integer(i64::try_from(n).unwrap_or(i64::MAX))))
}

fn string<N: XdmNode>(s: impl Into<String>) -> Sequence<N> {
    Sequence::singleton(Value::Atomic(AtomicValue::string(s)))
}

/// The context item, for the zero-argument forms of context-dependent functions.
fn context_item<N: XdmNode>(ctx: &CallContext<N>, function: &str) -> Result<Value<N>, Error> {
    ctx.dynamic.context_item.clone().ok_or_else(|| Error::missing_context(function))
}

/// A single-item sequence whose item is computed by a resumable.
fn from_resumable<N, R>(mut computation: R, mut to_value: impl FnMut(R::Output) -> Value<N> + 'static) -> Sequence<N>
where
    N: XdmNode,
    R: Resumable + 'static,
{
    let mut done = false;
    Sequence::from_fn(move || {
        if done {
            return Ok(Step::Done);
        }
        let output = try_ready!(computation.resume());
        done = true;
        Ok(Step::Item(to_value(output)))
    })
}

/// The items computed by a resumable, produced once it completes.
fn items_from_resumable<N, R>(mut computation: R) -> Sequence<N>
where
    N: XdmNode,
    R: Resumable<Output = Vec<Value<N>>> + 'static,
{
    let mut output: Option<std::vec::IntoIter<Value<N>>> = None;
    Sequence::from_fn(move || {
        let items = match &mut output {
            Some(items) => items,
            slot @ None => slot.insert(try_ready!(computation.resume()).into_iter()),
        };
        Ok(items.next().map_or(Step::Done, Step::Item))
    })
}

/// Wait for the first item of every argument, then continue with `f`.
fn zip_singleton<N: XdmNode>(
    mut args: Vec<Sequence<N>>,
    f: impl FnOnce(Vec<Option<Value<N>>>) -> Result<Sequence<N>, Error> + 'static,
) -> Sequence<N> {
    let mut firsts = Vec::with_capacity(args.len());
    let mut f = Some(f);
    let mut output: Option<Sequence<N>> = None;
    Sequence::from_fn(move || {
        if let Some(out) = output.as_mut() {
            return out.next();
        }
        while firsts.len() < args.len() {
            let first = try_ready!(args[firsts.len()].try_get_first());
            firsts.push(first);
        }
        let f = f.take().ok_or_else(|| Error::internal("argument continuation called twice"))?;
        output.insert(f(std::mem::take(&mut firsts))?).next()
    })
}

fn expect_array<N: XdmNode>(value: Option<Value<N>>) -> Result<ArrayValue<N>, Error> {
    match value {
        Some(Value::Array(a)) => Ok(a),
        other => Err(unexpected("array(*)", other.as_ref())),
    }
}

fn expect_map<N: XdmNode>(value: Option<Value<N>>) -> Result<MapValue<N>, Error> {
    match value {
        Some(Value::Map(m)) => Ok(m),
        other => Err(unexpected("map(*)", other.as_ref())),
    }
}

fn expect_atomic<N: XdmNode>(value: Option<Value<N>>) -> Result<AtomicValue, Error> {
    match value {
        Some(Value::Atomic(a)) => Ok(a),
        other => Err(unexpected("xs:anyAtomicType", other.as_ref())),
    }
}

fn expect_integer<N: XdmNode>(value: Option<Value<N>>) -> Result<i64, Error> {
    let atomic = expect_atomic(value)?;
    integer_of(&atomic)
}

fn integer_of(value: &AtomicValue) -> Result<i64, Error> {
    match value.value() {
        Scalar::Integer(i) => Ok(*i),
        _ => Err(Error::type_error(format!("expected xs:integer, got {}", value.type_name()))),
    }
}

fn expect_function<N: XdmNode>(value: Option<Value<N>>) -> Result<FunctionValue<N>, Error> {
    match value {
        Some(v) => crate::engine::expr::function_call::callable(v),
        None => Err(unexpected::<N>("function(*)", None)),
    }
}

fn unexpected<N: XdmNode>(expected: &str, got: Option<&Value<N>>) -> Error {
    match got {
        Some(v) => Error::type_error(format!("expected {expected}, got {}", v.type_name())),
        None => Error::type_error(format!("expected {expected}, got an empty sequence")),
    }
}
