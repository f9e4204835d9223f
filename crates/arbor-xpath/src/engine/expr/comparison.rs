use super::{sum_specificity, ExprRef, Expression, ExpressionBase, ResultOrder};
use crate::engine::casting::cast;
use crate::engine::runtime::{DynamicContext, Error, ExecutionParameters};
use crate::engine::sequence::Sequence;
use crate::model::XdmNode;
use crate::xdm::types::primitive_type;
use crate::xdm::{AtomicValue, Scalar, Value};
use rust_decimal::Decimal;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::Ne => ordering != Ordering::Equal,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::Le => ordering != Ordering::Greater,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::Ge => ordering != Ordering::Less,
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, ComparisonOp::Eq | ComparisonOp::Ne)
    }
}

/// `=`, `!=`, `<`, ... : true if any pair of atomized operand items compares.
#[derive(Debug)]
pub struct GeneralComparison<N> {
    base: ExpressionBase<N>,
    op: ComparisonOp,
}

impl<N: XdmNode> GeneralComparison<N> {
    pub fn new(op: ComparisonOp, left: ExprRef<N>, right: ExprRef<N>) -> Self {
        let operands = vec![left, right];
        let is_static = operands.iter().all(|o| o.can_be_statically_evaluated());
        let base = ExpressionBase::new(sum_specificity(&operands), operands)
            .statically_evaluable(is_static)
            .ordered(ResultOrder::Unsorted);
        Self { base, op }
    }
}

/// Bring an untypedAtomic operand to the type it is compared against.
fn harmonize(a: &AtomicValue, b: &AtomicValue) -> Result<(AtomicValue, AtomicValue), Error> {
    let untyped = |v: &AtomicValue| v.is_instance_of("xs:untypedAtomic");
    let target = |other: &AtomicValue| -> &'static str {
        if untyped(other) || other.is_instance_of("xs:string") || other.is_instance_of("xs:anyURI") {
            "xs:string"
        } else if other.is_numeric() {
            "xs:double"
        } else {
            primitive_type(other.type_name().as_str()).unwrap_or("xs:string")
        }
    };
    Ok(match (untyped(a), untyped(b)) {
        (true, true) => (cast(a, "xs:string")?, cast(b, "xs:string")?),
        (true, false) => (cast(a, target(b))?, b.clone()),
        (false, true) => (a.clone(), cast(b, target(a))?),
        (false, false) => (a.clone(), b.clone()),
    })
}

fn incomparable(a: &AtomicValue, b: &AtomicValue) -> Error {
    Error::type_error(format!("{} and {} cannot be compared", a.type_name(), b.type_name()))
}

/// `None` when the values are unordered (NaN).
pub(crate) fn compare_atomic(a: &AtomicValue, b: &AtomicValue, equality_only: bool) -> Result<Option<Ordering>, Error> {
    if a.is_numeric() && b.is_numeric() {
        let exact = |v: &AtomicValue| match v.value() {
            Scalar::Integer(i) => Some(Decimal::from(*i)),
            Scalar::Decimal(d) => Some(*d),
            _ => None,
        };
        if let (Some(x), Some(y)) = (exact(a), exact(b)) {
            return Ok(Some(x.cmp(&y)));
        }
        return Ok(a.as_f64().zip(b.as_f64()).and_then(|(x, y)| x.partial_cmp(&y)));
    }
    let string_like = |v: &AtomicValue| v.is_instance_of("xs:string") || v.is_instance_of("xs:anyURI");
    if string_like(a) && string_like(b) {
        return Ok(a.as_str().zip(b.as_str()).map(|(x, y)| x.cmp(y)));
    }
    match (a.value(), b.value()) {
        (Scalar::Boolean(x), Scalar::Boolean(y)) => Ok(Some(x.cmp(y))),
        (Scalar::Temporal(x), Scalar::Temporal(y))
            if primitive_type(a.type_name().as_str()) == primitive_type(b.type_name().as_str()) =>
        {
            Ok(Some(x.instant().cmp(&y.instant())))
        }
        (Scalar::Duration(x), Scalar::Duration(y)) => {
            let same_subtype = a.type_name() == b.type_name() && !a.type_name().as_str().eq("xs:duration");
            if equality_only || same_subtype {
                Ok(Some(x.months.cmp(&y.months).then(x.seconds.cmp(&y.seconds))))
            } else {
                Err(incomparable(a, b))
            }
        }
        (Scalar::QName(x), Scalar::QName(y)) if equality_only => {
            Ok(Some(if x.same_name(y) { Ordering::Equal } else { Ordering::Less }))
        }
        (Scalar::Binary(x), Scalar::Binary(y)) if equality_only && a.type_name() == b.type_name() => Ok(Some(x.cmp(y))),
        _ => Err(incomparable(a, b)),
    }
}

fn general_compare(op: ComparisonOp, left: &[AtomicValue], right: &[AtomicValue]) -> Result<bool, Error> {
    for a in left {
        for b in right {
            let (x, y) = harmonize(a, b)?;
            if compare_atomic(&x, &y, op.is_equality())?.is_some_and(|o| op.holds(o)) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn atomics<N>(items: Vec<Value<N>>) -> Vec<AtomicValue> {
    items
        .into_iter()
        .filter_map(|v| match v {
            Value::Atomic(a) => Some(a),
            _ => None,
        })
        .collect()
}

impl<N: XdmNode> Expression<N> for GeneralComparison<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let op = self.op;
        let right = self.base.children[1].clone();
        let (ctx, params) = (ctx.clone(), params.clone());
        let left = self.base.children[0].evaluate_maybe_statically(&ctx, &params)?.atomize(&params);
        Ok(left.map_all(move |left_items| {
            let left_items = atomics(left_items);
            Ok(right.evaluate_maybe_statically(&ctx, &params)?.atomize(&params).map_all(move |right_items| {
                let verdict = general_compare(op, &left_items, &atomics(right_items))?;
                Ok(Sequence::singleton(Value::Atomic(AtomicValue::boolean(verdict))))
            }))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ComparisonOp::Eq, vec![AtomicValue::integer(1), AtomicValue::integer(2)], vec![AtomicValue::double(2.0)], true)]
    #[case(ComparisonOp::Eq, vec![AtomicValue::untyped("2")], vec![AtomicValue::integer(2)], true)]
    #[case(ComparisonOp::Lt, vec![AtomicValue::string("a")], vec![AtomicValue::untyped("b")], true)]
    #[case(ComparisonOp::Ne, vec![], vec![AtomicValue::integer(1)], false)]
    #[case(ComparisonOp::Eq, vec![AtomicValue::double(f64::NAN)], vec![AtomicValue::double(f64::NAN)], false)]
    fn existential_comparison(
        #[case] op: ComparisonOp,
        #[case] left: Vec<AtomicValue>,
        #[case] right: Vec<AtomicValue>,
        #[case] expected: bool,
    ) {
        assert_eq!(general_compare(op, &left, &right).unwrap(), expected);
    }

    #[test]
    fn mismatched_types_are_type_errors() {
        let err = general_compare(ComparisonOp::Eq, &[AtomicValue::string("1")], &[AtomicValue::integer(1)]).unwrap_err();
        assert_eq!(err.code, crate::engine::runtime::ErrorCode::XPTY0004);
    }
}
