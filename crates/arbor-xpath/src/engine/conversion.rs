//! Function conversion rules applied to call arguments.
//!
//! Conversion is lazy: the returned sequences check and convert items as
//! they are pulled, so an argument the function never reads is never
//! evaluated.

use crate::engine::casting::cast;
use crate::engine::runtime::{Error, ErrorCode, ExecutionParameters};
use crate::engine::sequence::{Sequence, Step};
use crate::model::XdmNode;
use crate::xdm::{AtomicValue, SequenceType, Value};

pub fn convert_arguments<N: XdmNode>(
    types: &[SequenceType],
    args: Vec<Sequence<N>>,
    params: &ExecutionParameters<N>,
    function: &str,
) -> Result<Vec<Sequence<N>>, Error> {
    if types.len() != args.len() {
        return Err(Error::type_error(format!(
            "expected argument list of {function} to have {} entries, got {}",
            types.len(),
            args.len()
        )));
    }
    Ok(args
        .into_iter()
        .zip(types)
        .enumerate()
        .map(|(i, (arg, ty))| convert_argument(arg, ty, params, function, i + 1))
        .collect())
}

/// Promote or cast an atomized argument item towards `expected`.
fn convert_atomic(value: AtomicValue, expected: &str) -> Result<AtomicValue, Error> {
    if value.is_instance_of(expected) {
        return Ok(value);
    }
    if value.is_instance_of("xs:untypedAtomic") {
        return cast(&value, expected);
    }
    let promotable = match expected {
        "xs:double" => value.is_instance_of("xs:decimal") || value.is_instance_of("xs:float"),
        "xs:float" => value.is_instance_of("xs:decimal"),
        "xs:string" => value.is_instance_of("xs:anyURI"),
        _ => false,
    };
    if promotable {
        return cast(&value, expected);
    }
    Err(Error::type_error(format!("expected {expected}, got {}", value.type_name())))
}

pub fn convert_argument<N: XdmNode>(
    arg: Sequence<N>,
    ty: &SequenceType,
    params: &ExecutionParameters<N>,
    function: &str,
    position: usize,
) -> Sequence<N> {
    if ty.item_type.as_str() == "item()" && ty.occurrence.allows(usize::MAX) {
        return arg;
    }
    let mut source = if ty.is_atomic() { arg.atomize(params) } else { arg };
    let ty = ty.clone();
    let function = function.to_string();
    let mut seen = 0usize;
    // With at most one item allowed, the item is held back until the source
    // is known to end, so callers that read only the first item still get
    // the multiplicity check.
    let mut held: Option<Value<N>> = None;
    let mut finished = false;
    let multiplicity_error = move |ty: &SequenceType, seen: usize| {
        Error::type_error(format!(
            "multiplicity of argument {position} of {function} is incorrect: expected {ty}, got {seen} item(s)"
        ))
    };
    Sequence::from_fn(move || {
        if finished {
            return Ok(Step::Done);
        }
        loop {
            match source.next()? {
                Step::Item(item) => {
                    seen += 1;
                    if ty.occurrence.max_one() && seen > 1 {
                        return Err(multiplicity_error(&ty, seen));
                    }
                    let item = convert_item(item, &ty, position)?;
                    if !ty.occurrence.max_one() {
                        return Ok(Step::Item(item));
                    }
                    held = Some(item);
                }
                Step::Done => {
                    if !ty.occurrence.allows(seen) {
                        return Err(multiplicity_error(&ty, seen));
                    }
                    finished = true;
                    return Ok(held.take().map_or(Step::Done, Step::Item));
                }
                pending => return Ok(pending),
            }
        }
    })
}

fn convert_item<N: XdmNode>(item: Value<N>, ty: &SequenceType, position: usize) -> Result<Value<N>, Error> {
    let expected = ty.item_type.as_str();
    match item {
        Value::Atomic(a) if ty.is_atomic() => convert_atomic(a, expected).map(Value::Atomic).map_err(|e| {
            if e.code == ErrorCode::XPTY0004 {
                Error::from_code(ErrorCode::XPTY0004, format!("argument {position}: {}", e.message))
            } else {
                e
            }
        }),
        other if other.is_instance_of(expected) => Ok(other),
        other => Err(Error::type_error(format!("argument {position} must be {ty}, got {}", other.type_name()))),
    }
}
