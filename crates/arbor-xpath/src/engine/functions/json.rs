use super::{expect_atomic, zip_singleton};
use crate::consts::FNS;
use crate::engine::runtime::{Error, FunctionRegistry};
use crate::engine::sequence::{Sequence, SharedSequence};
use crate::model::XdmNode;
use crate::xdm::{ArrayValue, AtomicValue, MapValue, Value};
use serde_json::Value as Json;

/// JSON `null` maps to the empty sequence, numbers to `xs:double`.
fn to_sequence<N: XdmNode>(json: Json) -> Result<Sequence<N>, Error> {
    let value = match json {
        Json::Null => return Ok(Sequence::empty()),
        Json::Bool(b) => Value::Atomic(AtomicValue::boolean(b)),
        Json::Number(n) => Value::Atomic(AtomicValue::double(n.as_f64().unwrap_or(f64::NAN))),
        Json::String(s) => Value::Atomic(AtomicValue::string(s)),
        Json::Array(members) => Value::Array(ArrayValue::new(
            members.into_iter().map(|m| to_sequence(m).map(SharedSequence::new)).collect::<Result<_, _>>()?,
        )),
        Json::Object(entries) => Value::Map(MapValue::new(
            entries
                .into_iter()
                .map(|(k, v)| Ok((AtomicValue::string(k), SharedSequence::new(to_sequence(v)?))))
                .collect::<Result<_, Error>>()?,
        )?),
    };
    Ok(Sequence::singleton(value))
}

pub(crate) fn parse_json<N: XdmNode>(text: &str) -> Result<Sequence<N>, Error> {
    let json: Json = serde_json::from_str(text)?;
    to_sequence(json)
}

pub(super) fn register<N: XdmNode>(reg: &mut FunctionRegistry<N>) {
    reg.register(FNS, "parse-json", &["xs:string?"], "item()?", |_, args| {
        Ok(zip_singleton(args, |mut firsts| match firsts.pop().flatten() {
            None => Ok(Sequence::empty()),
            text => parse_json(&expect_atomic(text)?.string_value()),
        }))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::ErrorCode;
    use crate::engine::sequence::Step;
    use crate::model::simple::SimpleNode;
    use crate::xdm::Scalar;

    fn single(text: &str) -> Option<Value<SimpleNode>> {
        match parse_json::<SimpleNode>(text).unwrap().next().unwrap() {
            Step::Item(v) => Some(v),
            _ => None,
        }
    }

    #[test]
    fn null_is_empty() {
        assert!(single("null").is_none());
    }

    #[test]
    fn numbers_are_doubles() {
        let Some(Value::Atomic(a)) = single("12") else { panic!("expected an atomic value") };
        assert_eq!(a.type_name().as_str(), "xs:double");
        assert!(matches!(a.value(), Scalar::Double(d) if (*d - 12.0).abs() < f64::EPSILON));
    }

    #[test]
    fn objects_become_maps() {
        let Some(Value::Map(m)) = single(r#"{"a": [1, true], "b": null}"#) else { panic!("expected a map") };
        assert_eq!(m.len(), 2);
        let Some(a) = m.get(&AtomicValue::string("a")) else { panic!("missing key") };
        let mut a = a.reader();
        assert!(matches!(a.next().unwrap(), Step::Item(Value::Array(arr)) if arr.len() == 2));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let err = parse_json::<SimpleNode>("{").err().unwrap();
        assert_eq!(err.code, ErrorCode::FOJS0001);
    }
}
