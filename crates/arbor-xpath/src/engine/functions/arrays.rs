use super::{
    expect_array, expect_atomic, expect_function, expect_integer, from_resumable, integer, integer_of, take_args, zip_singleton,
};
use crate::consts::ARRAY_NS;
use crate::engine::expr::comparison::compare_atomic;
use crate::engine::runtime::{CallContext, Error, ErrorCode, FunctionRegistry};
use crate::engine::sequence::{Sequence, SharedSequence, Step};
use crate::engine::suspend::{try_ready, Fetch, ResumeFn};
use crate::model::XdmNode;
use crate::xdm::{ArrayValue, AtomicValue, Value};
use std::cmp::Ordering;

fn out_of_bounds(position: i64, len: usize) -> Error {
    Error::from_code(ErrorCode::FOAY0001, format!("array position {position} is out of bounds for an array of size {len}"))
}

/// 0-based index of a 1-based position that must address an existing member.
fn member_index(position: i64, len: usize) -> Result<usize, Error> {
    usize::try_from(position)
        .ok()
        .filter(|p| (1..=len).contains(p))
        .map(|p| p - 1)
        .ok_or_else(|| out_of_bounds(position, len))
}

/// The member at a 1-based position.
pub(crate) fn array_get<'a, N: XdmNode>(
    array: &'a ArrayValue<N>,
    position: &AtomicValue,
) -> Result<&'a SharedSequence<N>, Error> {
    let position = integer_of(position)?;
    let index = member_index(position, array.len())?;
    array.get(index).ok_or_else(|| out_of_bounds(position, array.len()))
}

fn array_of<N: XdmNode>(members: Vec<SharedSequence<N>>) -> Sequence<N> {
    Sequence::singleton(Value::Array(ArrayValue::new(members)))
}

fn subarray<N: XdmNode>(array: &ArrayValue<N>, start: i64, length: i64) -> Result<Sequence<N>, Error> {
    let len = array.len();
    let start_index = usize::try_from(start).ok().filter(|s| (1..=len + 1).contains(s)).ok_or_else(|| out_of_bounds(start, len))?;
    let Ok(length) = usize::try_from(length) else {
        return Err(Error::from_code(ErrorCode::FOAY0002, format!("array length {length} is negative")));
    };
    let end = start_index.checked_add(length).filter(|end| *end <= len + 1).ok_or_else(|| {
        Error::from_code(
            ErrorCode::FOAY0001,
            format!("subarray of length {length} from position {start} exceeds an array of size {len}"),
        )
    })?;
    Ok(array_of(array.members()[start_index - 1..end - 1].to_vec()))
}

fn remove<N: XdmNode>(array: &ArrayValue<N>, positions: &[i64]) -> Result<Sequence<N>, Error> {
    let mut indexes = positions.iter().map(|p| member_index(*p, array.len())).collect::<Result<Vec<_>, _>>()?;
    indexes.sort_unstable();
    indexes.dedup();
    let members = array
        .members()
        .iter()
        .enumerate()
        .filter(|(i, _)| indexes.binary_search(i).is_err())
        .map(|(_, m)| m.clone())
        .collect();
    Ok(array_of(members))
}

/// Lexicographic order of atomized members; unordered pairs count as equal.
fn compare_members<N: XdmNode>(a: &[Value<N>], b: &[Value<N>]) -> Result<Ordering, Error> {
    for (x, y) in a.iter().zip(b) {
        let (Some(x), Some(y)) = (x.as_atomic(), y.as_atomic()) else {
            continue;
        };
        match compare_atomic(x, y, false)? {
            Some(Ordering::Equal) | None => {}
            Some(other) => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

fn sort<N: XdmNode>(array: ArrayValue<N>, ctx: &CallContext<N>) -> Sequence<N> {
    let mut atomized: Vec<Sequence<N>> = array.members().iter().map(|m| m.reader().atomize(&ctx.params)).collect();
    let mut keys: Vec<Vec<Value<N>>> = Vec::with_capacity(atomized.len());
    let mut done = false;
    Sequence::from_fn(move || {
        if done {
            return Ok(Step::Done);
        }
        while keys.len() < atomized.len() {
            let items = try_ready!(atomized[keys.len()].try_drain());
            keys.push(items);
        }
        let mut order: Vec<usize> = (0..keys.len()).collect();
        let mut failure = None;
        order.sort_by(|&a, &b| match compare_members(&keys[a], &keys[b]) {
            Ok(o) => o,
            Err(e) => {
                failure = failure.take().or(Some(e));
                Ordering::Equal
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        done = true;
        let members = order.into_iter().filter_map(|i| array.get(i).cloned()).collect();
        Ok(Step::Item(Value::Array(ArrayValue::new(members))))
    })
}

fn filter<N: XdmNode>(array: ArrayValue<N>, ctx: &CallContext<N>, args: Vec<Sequence<N>>) -> Sequence<N> {
    let ctx = ctx.clone();
    zip_singleton(args, move |mut firsts| {
        let function = expect_function(firsts.pop().flatten())?;
        let mut verdicts = array
            .members()
            .iter()
            .map(|m| function.invoke(&ctx, vec![m.reader()]))
            .collect::<Result<Vec<_>, Error>>()?;
        let mut kept: Vec<bool> = Vec::with_capacity(verdicts.len());
        Ok(from_resumable(
            ResumeFn(move || {
                while kept.len() < verdicts.len() {
                    let keep = try_ready!(verdicts[kept.len()].try_get_effective_boolean_value());
                    kept.push(keep);
                }
                Ok(Fetch::Ready(std::mem::take(&mut kept)))
            }),
            move |kept| {
                let members =
                    array.members().iter().zip(kept).filter(|(_, keep)| *keep).map(|(m, _)| m.clone()).collect();
                Value::Array(ArrayValue::new(members))
            },
        ))
    })
}

fn flatten<N: XdmNode>(arg: Sequence<N>) -> Sequence<N> {
    let mut stack = vec![arg];
    Sequence::from_fn(move || {
        loop {
            let Some(top) = stack.last_mut() else {
                return Ok(Step::Done);
            };
            match top.next()? {
                Step::Done => {
                    stack.pop();
                }
                Step::Item(Value::Array(array)) => {
                    stack.push(Sequence::concat(array.members().iter().map(SharedSequence::reader).collect()));
                }
                step => return Ok(step),
            }
        }
    })
}

pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    reg.register(ARRAY_NS, "size", &["array(*)"], "xs:integer", |_, args| {
        Ok(zip_singleton(args, |mut firsts| Ok(integer(expect_array(firsts.pop().flatten())?.len()))))
    });
    reg.register(ARRAY_NS, "get", &["array(*)", "xs:integer"], "item()*", |_, args| {
        Ok(zip_singleton(args, |firsts| {
            let [array, position] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let array = expect_array(array)?;
            let position = expect_atomic(position)?;
            array_get(&array, &position).map(SharedSequence::reader)
        }))
    });
    reg.register(ARRAY_NS, "put", &["array(*)", "xs:integer", "item()*"], "array(*)", |_, args| {
        let [array, position, member] = take_args::<3, N>(args)?;
        let member = SharedSequence::new(member);
        Ok(zip_singleton(vec![array, position], move |firsts| {
            let [array, position] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let array = expect_array(array)?;
            let index = member_index(expect_integer(position)?, array.len())?;
            let mut members = array.members().to_vec();
            members[index] = member;
            Ok(array_of(members))
        }))
    });
    reg.register(ARRAY_NS, "append", &["array(*)", "item()*"], "array(*)", |_, args| {
        let [array, member] = take_args::<2, N>(args)?;
        let member = SharedSequence::new(member);
        Ok(zip_singleton(vec![array], move |mut firsts| {
            let mut members = expect_array(firsts.pop().flatten())?.members().to_vec();
            members.push(member);
            Ok(array_of(members))
        }))
    });
    reg.register(ARRAY_NS, "subarray", &["array(*)", "xs:integer"], "array(*)", |_, args| {
        Ok(zip_singleton(args, |firsts| {
            let [array, start] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let array = expect_array(array)?;
            let start = expect_integer(start)?;
            let length = i64::try_from(array.len())
                .unwrap_or(i64::MAX)
                .checked_sub(start)
                .and_then(|rest| rest.checked_add(1))
                .ok_or_else(|| out_of_bounds(start, array.len()))?;
            subarray(&array, start, length.max(0))
        }))
    });
    reg.register(ARRAY_NS, "subarray", &["array(*)", "xs:integer", "xs:integer"], "array(*)", |_, args| {
        Ok(zip_singleton(args, |firsts| {
            let [array, start, length] =
                <[Option<Value<N>>; 3]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            subarray(&expect_array(array)?, expect_integer(start)?, expect_integer(length)?)
        }))
    });
    reg.register(ARRAY_NS, "remove", &["array(*)", "xs:integer*"], "array(*)", |_, args| {
        let [array, positions] = take_args::<2, N>(args)?;
        Ok(zip_singleton(vec![array], move |mut firsts| {
            let array = expect_array(firsts.pop().flatten())?;
            Ok(positions.map_all(move |positions| {
                let positions = positions
                    .iter()
                    .map(|p| p.as_atomic().map_or_else(|| Err(Error::type_error("expected xs:integer")), integer_of))
                    .collect::<Result<Vec<_>, Error>>()?;
                remove(&array, &positions)
            }))
        }))
    });
    reg.register(ARRAY_NS, "insert-before", &["array(*)", "xs:integer", "item()*"], "array(*)", |_, args| {
        let [array, position, member] = take_args::<3, N>(args)?;
        let member = SharedSequence::new(member);
        Ok(zip_singleton(vec![array, position], move |firsts| {
            let [array, position] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let array = expect_array(array)?;
            let position = expect_integer(position)?;
            let index = usize::try_from(position)
                .ok()
                .filter(|p| (1..=array.len() + 1).contains(p))
                .ok_or_else(|| out_of_bounds(position, array.len()))?;
            let mut members = array.members().to_vec();
            members.insert(index - 1, member);
            Ok(array_of(members))
        }))
    });
    reg.register(ARRAY_NS, "head", &["array(*)"], "item()*", |_, args| {
        Ok(zip_singleton(args, |mut firsts| {
            let array = expect_array(firsts.pop().flatten())?;
            array_get(&array, &AtomicValue::integer(1)).map(SharedSequence::reader)
        }))
    });
    reg.register(ARRAY_NS, "tail", &["array(*)"], "array(*)", |_, args| {
        Ok(zip_singleton(args, |mut firsts| remove(&expect_array(firsts.pop().flatten())?, &[1])))
    });
    reg.register(ARRAY_NS, "reverse", &["array(*)"], "array(*)", |_, args| {
        Ok(zip_singleton(args, |mut firsts| {
            let mut members = expect_array(firsts.pop().flatten())?.members().to_vec();
            members.reverse();
            Ok(array_of(members))
        }))
    });
    reg.register(ARRAY_NS, "join", &["array(*)*"], "array(*)", |_, args| {
        let [arrays] = take_args::<1, N>(args)?;
        Ok(arrays.map_all(|arrays| {
            let mut members = Vec::new();
            for array in arrays {
                members.extend_from_slice(expect_array(Some(array))?.members());
            }
            Ok(array_of(members))
        }))
    });
    reg.register(ARRAY_NS, "for-each", &["array(*)", "function(*)"], "array(*)", |ctx, args| {
        let ctx = ctx.clone();
        Ok(zip_singleton(args, move |firsts| {
            let [array, function] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let array = expect_array(array)?;
            let function = expect_function(function)?;
            let members = array
                .members()
                .iter()
                .map(|m| function.invoke(&ctx, vec![m.reader()]).map(SharedSequence::new))
                .collect::<Result<Vec<_>, Error>>()?;
            Ok(array_of(members))
        }))
    });
    reg.register(ARRAY_NS, "filter", &["array(*)", "function(*)"], "array(*)", |ctx, args| {
        let [array, function] = take_args::<2, N>(args)?;
        let ctx = ctx.clone();
        Ok(zip_singleton(vec![array], move |mut firsts| {
            Ok(filter(expect_array(firsts.pop().flatten())?, &ctx, vec![function]))
        }))
    });
    reg.register(ARRAY_NS, "fold-left", &["array(*)", "item()*", "function(*)"], "item()*", |ctx, args| {
        let [array, zero, function] = take_args::<3, N>(args)?;
        let ctx = ctx.clone();
        Ok(zip_singleton(vec![array, function], move |firsts| {
            let [array, function] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let function = expect_function(function)?;
            expect_array(array)?
                .members()
                .iter()
                .try_fold(zero, |acc, member| function.invoke(&ctx, vec![acc, member.reader()]))
        }))
    });
    reg.register(ARRAY_NS, "fold-right", &["array(*)", "item()*", "function(*)"], "item()*", |ctx, args| {
        let [array, zero, function] = take_args::<3, N>(args)?;
        let ctx = ctx.clone();
        Ok(zip_singleton(vec![array, function], move |firsts| {
            let [array, function] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let function = expect_function(function)?;
            expect_array(array)?
                .members()
                .iter()
                .rev()
                .try_fold(zero, |acc, member| function.invoke(&ctx, vec![member.reader(), acc]))
        }))
    });
    reg.register(ARRAY_NS, "for-each-pair", &["array(*)", "array(*)", "function(*)"], "array(*)", |ctx, args| {
        let ctx = ctx.clone();
        Ok(zip_singleton(args, move |firsts| {
            let [left, right, function] =
                <[Option<Value<N>>; 3]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
            let (left, right) = (expect_array(left)?, expect_array(right)?);
            let function = expect_function(function)?;
            let members = left
                .members()
                .iter()
                .zip(right.members())
                .map(|(a, b)| function.invoke(&ctx, vec![a.reader(), b.reader()]).map(SharedSequence::new))
                .collect::<Result<Vec<_>, Error>>()?;
            Ok(array_of(members))
        }))
    });
    reg.register(ARRAY_NS, "sort", &["array(*)"], "array(*)", |ctx, args| {
        let ctx = ctx.clone();
        Ok(zip_singleton(args, move |mut firsts| Ok(sort(expect_array(firsts.pop().flatten())?, &ctx))))
    });
    reg.register(ARRAY_NS, "flatten", &["item()*"], "item()*", |_, args| {
        let [arg] = take_args::<1, N>(args)?;
        Ok(flatten(arg))
    });
}
