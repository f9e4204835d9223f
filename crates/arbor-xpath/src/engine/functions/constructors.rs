use super::{expect_atomic, take_args, zip_singleton};
use crate::consts::XS;
use crate::engine::casting::cast_with;
use crate::engine::runtime::FunctionRegistry;
use crate::engine::sequence::Sequence;
use crate::model::XdmNode;
use crate::xdm::types::concrete_atomic_types;
use crate::xdm::Value;
use std::rc::Rc;

/// `xs:T($arg as xs:anyAtomicType?) as T?` for every concrete atomic type.
pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    for target in concrete_atomic_types() {
        let Some(local) = target.strip_prefix("xs:") else {
            continue;
        };
        let returns = format!("{target}?");
        reg.register(XS, local, &["xs:anyAtomicType?"], &returns, move |ctx, args| {
            let [arg] = take_args::<1, N>(args)?;
            let static_ctx = Rc::clone(&ctx.static_ctx);
            Ok(zip_singleton(vec![arg], move |mut firsts| match firsts.pop().flatten() {
                None => Ok(Sequence::empty()),
                value => {
                    let cast = cast_with(&expect_atomic(value)?, target, &*static_ctx)?;
                    Ok(Sequence::singleton(Value::Atomic(cast)))
                }
            }))
        });
    }
}
