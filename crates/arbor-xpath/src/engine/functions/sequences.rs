use super::{boolean, boolean_value, context_item, from_resumable, integer, string, take_args};
use crate::consts::FNS;
use crate::engine::deep_equal::sequence_deep_equal;
use crate::engine::runtime::{Error, ErrorCode, ExecutionParameters, FunctionRegistry};
use crate::engine::sequence::Sequence;
use crate::engine::suspend::{Fetch, ResumeFn};
use crate::model::XdmNode;
use crate::xdm::{AtomicValue, Value};

pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    reg.register(FNS, "true", &[], "xs:boolean", |_, _| Ok(boolean(true)));
    reg.register(FNS, "false", &[], "xs:boolean", |_, _| Ok(boolean(false)));
    reg.register(FNS, "boolean", &["item()*"], "xs:boolean", |_, args| {
        let [mut arg] = take_args::<1, N>(args)?;
        Ok(from_resumable(ResumeFn(move || arg.try_get_effective_boolean_value()), boolean_value))
    });
    reg.register(FNS, "not", &["item()*"], "xs:boolean", |_, args| {
        let [mut arg] = take_args::<1, N>(args)?;
        Ok(from_resumable(ResumeFn(move || arg.try_get_effective_boolean_value()), |b| boolean_value(!b)))
    });
    reg.register(FNS, "count", &["item()*"], "xs:integer", |_, args| {
        let [arg] = take_args::<1, N>(args)?;
        Ok(arg.map_all(|items| Ok(integer(items.len()))))
    });
    reg.register(FNS, "empty", &["item()*"], "xs:boolean", |_, args| {
        let [mut arg] = take_args::<1, N>(args)?;
        Ok(from_resumable(ResumeFn(move || Ok(arg.try_get_first()?.map(|f| f.is_none()))), boolean_value))
    });
    reg.register(FNS, "exists", &["item()*"], "xs:boolean", |_, args| {
        let [mut arg] = take_args::<1, N>(args)?;
        Ok(from_resumable(ResumeFn(move || Ok(arg.try_get_first()?.map(|f| f.is_some()))), boolean_value))
    });
    reg.register(FNS, "position", &[], "xs:integer", |ctx, _| {
        context_item(ctx, "fn:position")?;
        Ok(integer(ctx.dynamic.context_position))
    });
    reg.register(FNS, "last", &[], "xs:integer", |ctx, _| {
        let Some(sequence) = ctx.dynamic.context_sequence.clone() else {
            return Err(Error::missing_context("fn:last"));
        };
        Ok(from_resumable(
            ResumeFn(move || match sequence.known_len() {
                Some(n) => Ok(Fetch::Ready(n)),
                None => Ok(sequence.try_items()?.map(|items| items.len())),
            }),
            |n| Value::Atomic(AtomicValue::integer(i64::try_from(n).unwrap_or(i64::MAX))),
        ))
    });
    reg.register(FNS, "deep-equal", &["item()*", "item()*"], "xs:boolean", |ctx, args| {
        let [left, right] = take_args::<2, N>(args)?;
        Ok(from_resumable(sequence_deep_equal(left, right, &ctx.params), boolean_value))
    });
    reg.register(FNS, "data", &[], "xs:anyAtomicType*", |ctx, _| {
        Ok(Sequence::singleton(context_item(ctx, "fn:data")?).atomize(&ctx.params))
    });
    reg.register(FNS, "data", &["item()*"], "xs:anyAtomicType*", |ctx, args| {
        let [arg] = take_args::<1, N>(args)?;
        Ok(arg.atomize(&ctx.params))
    });
    reg.register(FNS, "string", &[], "xs:string", |ctx, _| {
        Ok(string_of(Sequence::singleton(context_item(ctx, "fn:string")?), &ctx.params))
    });
    reg.register(FNS, "string", &["item()?"], "xs:string", |ctx, args| {
        let [arg] = take_args::<1, N>(args)?;
        Ok(string_of(arg, &ctx.params))
    });
}

/// The string value of an optional item.
fn string_of<N: XdmNode>(arg: Sequence<N>, params: &ExecutionParameters<N>) -> Sequence<N> {
    let params = params.clone();
    arg.map_all(move |items| match items.into_iter().next() {
        None => Ok(string("")),
        Some(Value::Atomic(a)) => Ok(string(a.string_value())),
        Some(node @ Value::Node(_)) => Ok(Sequence::singleton(node).atomize(&params).map(|v| {
            Ok(Value::Atomic(AtomicValue::string(v.as_atomic().map(AtomicValue::string_value).unwrap_or_default())))
        })),
        Some(other) => Err(Error::from_code(
            ErrorCode::FOTY0013,
            format!("fn:string is not defined for {}", other.type_name()),
        )),
    })
}
