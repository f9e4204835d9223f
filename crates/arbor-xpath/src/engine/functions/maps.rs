use super::{boolean_value, expect_atomic, expect_map, integer, zip_singleton};
use crate::consts::MAP_NS;
use crate::engine::runtime::{Error, FunctionRegistry};
use crate::engine::sequence::{Sequence, SharedSequence};
use crate::model::XdmNode;
use crate::xdm::{AtomicValue, MapValue, Value};

fn map_and_key<N: XdmNode>(firsts: Vec<Option<Value<N>>>) -> Result<(MapValue<N>, AtomicValue), Error> {
    let [map, key] = <[Option<Value<N>>; 2]>::try_from(firsts).map_err(|_| Error::internal("arity"))?;
    Ok((expect_map(map)?, expect_atomic(key)?))
}

pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    reg.register(MAP_NS, "size", &["map(*)"], "xs:integer", |_, args| {
        Ok(zip_singleton(args, |mut firsts| Ok(integer(expect_map(firsts.pop().flatten())?.len()))))
    });
    reg.register(MAP_NS, "keys", &["map(*)"], "xs:anyAtomicType*", |_, args| {
        Ok(zip_singleton(args, |mut firsts| {
            let map = expect_map(firsts.pop().flatten())?;
            Ok(Sequence::from_vec(map.keys().cloned().map(Value::Atomic).collect()))
        }))
    });
    reg.register(MAP_NS, "contains", &["map(*)", "xs:anyAtomicType"], "xs:boolean", |_, args| {
        Ok(zip_singleton(args, |firsts| {
            let (map, key) = map_and_key(firsts)?;
            Ok(Sequence::singleton(boolean_value(map.contains_key(&key))))
        }))
    });
    reg.register(MAP_NS, "get", &["map(*)", "xs:anyAtomicType"], "item()*", |_, args| {
        Ok(zip_singleton(args, |firsts| {
            let (map, key) = map_and_key(firsts)?;
            Ok(map.get(&key).map_or_else(Sequence::empty, SharedSequence::reader))
        }))
    });
}
