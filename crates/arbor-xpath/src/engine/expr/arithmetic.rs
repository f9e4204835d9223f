use super::{sum_specificity, ExprRef, Expression, ExpressionBase, ResultOrder};
use crate::engine::casting::cast;
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, ExecutionParameters};
use crate::engine::sequence::Sequence;
use crate::model::XdmNode;
use crate::xdm::{AtomicValue, Scalar, Value};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// `+x` and `-x`.
#[derive(Debug)]
pub struct Unary<N> {
    base: ExpressionBase<N>,
    op: UnaryOp,
}

impl<N: XdmNode> Unary<N> {
    pub fn new(op: UnaryOp, operand: ExprRef<N>) -> Self {
        let base = ExpressionBase::new(operand.specificity(), vec![operand]).ordered(ResultOrder::Unsorted);
        Self { base, op }
    }
}

fn single_operand<N: XdmNode>(mut items: Vec<Value<N>>, operator: &str) -> Result<Option<AtomicValue>, Error> {
    match items.len() {
        0 => Ok(None),
        1 => match items.pop() {
            Some(Value::Atomic(a)) => Ok(Some(a)),
            _ => Err(Error::type_error(format!("the operand of {operator} did not atomize"))),
        },
        n => Err(Error::type_error(format!(
            "the operands of the {operator} operator must be xs:anyAtomicType?, got a sequence of {n} items"
        ))),
    }
}

fn apply_unary(op: UnaryOp, value: AtomicValue) -> Result<AtomicValue, Error> {
    if value.is_instance_of("xs:untypedAtomic") {
        let d = cast(&value, "xs:double")?.as_f64().unwrap_or(f64::NAN);
        return Ok(AtomicValue::double(if op == UnaryOp::Minus { -d } else { d }));
    }
    if op == UnaryOp::Plus {
        return Ok(if value.is_numeric() { value } else { AtomicValue::double(f64::NAN) });
    }
    Ok(match value.value() {
        Scalar::Integer(i) => AtomicValue::integer(
            i.checked_neg().ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "integer negation overflows"))?,
        ),
        Scalar::Decimal(d) => AtomicValue::decimal(-*d),
        Scalar::Double(d) => AtomicValue::double(-*d),
        Scalar::Float(f) => AtomicValue::float(-*f),
        _ => AtomicValue::double(f64::NAN),
    })
}

impl<N: XdmNode> Expression<N> for Unary<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let op = self.op;
        let operand = &self.base.children[0];
        Ok(operand.evaluate_maybe_statically(ctx, params)?.atomize(params).map_all(move |items| {
            Ok(match single_operand(items, "unary")? {
                Some(v) => Sequence::singleton(Value::Atomic(apply_unary(op, v)?)),
                None => Sequence::empty(),
            })
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "div",
            ArithmeticOp::IntegerDivide => "idiv",
            ArithmeticOp::Modulo => "mod",
        })
    }
}

/// `a + b`, `a div b` and friends over `xs:numeric?` operands.
#[derive(Debug)]
pub struct BinaryNumeric<N> {
    base: ExpressionBase<N>,
    op: ArithmeticOp,
}

impl<N: XdmNode> BinaryNumeric<N> {
    pub fn new(op: ArithmeticOp, left: ExprRef<N>, right: ExprRef<N>) -> Self {
        let operands = vec![left, right];
        let is_static = operands.iter().all(|o| o.can_be_statically_evaluated());
        let base = ExpressionBase::new(sum_specificity(&operands), operands)
            .statically_evaluable(is_static)
            .ordered(ResultOrder::Unsorted);
        Self { base, op }
    }
}

fn numeric_operand(value: AtomicValue, op: ArithmeticOp) -> Result<AtomicValue, Error> {
    let value = if value.is_instance_of("xs:untypedAtomic") { cast(&value, "xs:double")? } else { value };
    if value.is_numeric() {
        Ok(value)
    } else {
        Err(Error::type_error(format!("the operands of the \"{op}\" operator should be of type xs:numeric?, got {}", value.type_name())))
    }
}

fn division_by_zero() -> Error {
    Error::from_code(ErrorCode::FOAR0001, "division by zero")
}

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "numeric operation overflows")
}

fn decimal_of(v: &AtomicValue) -> Option<Decimal> {
    match v.value() {
        Scalar::Integer(i) => Some(Decimal::from(*i)),
        Scalar::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn float_idiv(a: f64, b: f64) -> Result<AtomicValue, Error> {
    if b == 0.0 {
        return Err(division_by_zero());
    }
    let q = (a / b).trunc();
    if !q.is_finite() {
        return Err(overflow());
    }
    q.to_i64().map(AtomicValue::integer).ok_or_else(overflow)
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn arithmetic(op: ArithmeticOp, a: &AtomicValue, b: &AtomicValue) -> Result<AtomicValue, Error> {
    use ArithmeticOp::*;
    let either = |t: &str| a.is_instance_of(t) || b.is_instance_of(t);
    if either("xs:double") || either("xs:float") {
        let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
        if op == IntegerDivide {
            return float_idiv(x, y);
        }
        let r = match op {
            Add => x + y,
            Subtract => x - y,
            Multiply => x * y,
            Divide => x / y,
            _ => x % y,
        };
        return Ok(if either("xs:double") { AtomicValue::double(r) } else { AtomicValue::float(r as f32) });
    }
    if let (Scalar::Integer(x), Scalar::Integer(y)) = (a.value(), b.value()) {
        let (x, y) = (*x, *y);
        let r = match op {
            Add => x.checked_add(y),
            Subtract => x.checked_sub(y),
            Multiply => x.checked_mul(y),
            IntegerDivide | Modulo if y == 0 => return Err(division_by_zero()),
            IntegerDivide => x.checked_div(y),
            Modulo => x.checked_rem(y),
            Divide => None,
        };
        if op != Divide {
            return r.map(AtomicValue::integer).ok_or_else(overflow);
        }
    }
    let (Some(x), Some(y)) = (decimal_of(a), decimal_of(b)) else {
        return Err(Error::type_error(format!("cannot apply \"{op}\" to {} and {}", a.type_name(), b.type_name())));
    };
    if y.is_zero() && matches!(op, Divide | IntegerDivide | Modulo) {
        return Err(division_by_zero());
    }
    let r = match op {
        Add => x.checked_add(y),
        Subtract => x.checked_sub(y),
        Multiply => x.checked_mul(y),
        Divide => x.checked_div(y),
        IntegerDivide => {
            return x.checked_div(y).and_then(|q| q.trunc().to_i64()).map(AtomicValue::integer).ok_or_else(overflow);
        }
        Modulo => x.checked_rem(y),
    };
    r.map(AtomicValue::decimal).ok_or_else(overflow)
}

impl<N: XdmNode> Expression<N> for BinaryNumeric<N> {
    fn base(&self) -> &ExpressionBase<N> {
        &self.base
    }

    fn evaluate(&self, ctx: &DynamicContext<N>, params: &ExecutionParameters<N>) -> Result<Sequence<N>, Error> {
        let op = self.op;
        let right: ExprRef<N> = self.base.children[1].clone();
        let (ctx, params) = (ctx.clone(), params.clone());
        let left = self.base.children[0].evaluate_maybe_statically(&ctx, &params)?.atomize(&params);
        Ok(left.map_all(move |left_items| {
            let operator = op.to_string();
            let Some(a) = single_operand(left_items, &operator)? else {
                // The right operand is not evaluated.
                return Ok(Sequence::empty());
            };
            let a = numeric_operand(a, op)?;
            Ok(right.evaluate_maybe_statically(&ctx, &params)?.atomize(&params).map_all(move |right_items| {
                Ok(match single_operand(right_items, &operator)? {
                    Some(b) => Sequence::singleton(Value::Atomic(arithmetic(op, &a, &numeric_operand(b, op)?)?)),
                    None => Sequence::empty(),
                })
            }))
        }))
    }
}
