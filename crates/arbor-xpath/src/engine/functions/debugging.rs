use super::{take_args, zip_singleton};
use crate::consts::FNS;
use crate::engine::runtime::{Error, FunctionRegistry};
use crate::engine::sequence::Sequence;
use crate::model::XdmNode;
use crate::xdm::Value;
use itertools::Itertools;

fn render<N: XdmNode>(item: &Value<N>) -> String {
    match item {
        Value::Atomic(a) => a.string_value(),
        Value::Node(n) => match n.name() {
            Some(name) => format!("{}[{name}]", n.kind().type_name()),
            None => n.kind().type_name().to_string(),
        },
        other => other.type_name().to_string(),
    }
}

/// Passes `items` through unchanged after logging them.
fn trace<N: XdmNode>(items: Sequence<N>, label: Option<String>) -> Sequence<N> {
    items.map_all(move |items| {
        let rendered = items.iter().map(render).join(", ");
        tracing::info!(target: "arbor_xpath::trace", label = label.as_deref().unwrap_or(""), items = %rendered, "fn:trace");
        Ok(Sequence::from_vec(items))
    })
}

pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    reg.register(FNS, "trace", &["item()*"], "item()*", |_, args| {
        let [items] = take_args::<1, N>(args)?;
        Ok(trace(items, None))
    });
    reg.register(FNS, "trace", &["item()*", "xs:string"], "item()*", |_, args| {
        let [items, label] = take_args::<2, N>(args)?;
        Ok(zip_singleton(vec![label], move |mut firsts| {
            let label = match firsts.pop().flatten() {
                Some(Value::Atomic(a)) => a.string_value(),
                _ => return Err(Error::type_error("fn:trace expects an xs:string label")),
            };
            Ok(trace(items, Some(label)))
        }))
    });
}
