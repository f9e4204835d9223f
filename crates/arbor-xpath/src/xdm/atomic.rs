use super::temporal::{format_duration, format_temporal, Duration, Temporal};
use super::types::{is_known_type, TypeName};
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::QName;
use base64::Engine as _;
use rust_decimal::Decimal;
use std::fmt;

/// Raw payload of an atomic value. The type name decides how it is read.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Float(f32),
    Double(f64),
    /// Every string-like type, `xs:anyURI` and `xs:untypedAtomic`.
    String(String),
    QName(QName),
    Temporal(Temporal),
    Duration(Duration),
    Binary(Vec<u8>),
}

/// A scalar tagged with a type name from the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicValue {
    type_name: TypeName,
    value: Scalar,
}

impl AtomicValue {
    /// Checked constructor: the type must be a known, concrete atomic type whose
    /// family matches the payload.
    pub fn new(type_name: &str, value: Scalar) -> Result<Self, Error> {
        if !is_known_type(type_name) {
            return Err(Error::from_code(ErrorCode::XPTY0004, format!("unknown atomic type {type_name}")));
        }
        let type_name = TypeName::new(type_name);
        let fits = match &value {
            Scalar::Boolean(_) => type_name.as_str() == "xs:boolean",
            Scalar::Integer(_) => type_name.is_subtype_of("xs:integer"),
            Scalar::Decimal(_) => type_name.as_str() == "xs:decimal",
            Scalar::Float(_) => type_name.as_str() == "xs:float",
            Scalar::Double(_) => type_name.as_str() == "xs:double",
            Scalar::String(_) => {
                type_name.is_subtype_of("xs:string")
                    || matches!(type_name.as_str(), "xs:untypedAtomic" | "xs:anyURI" | "xs:NOTATION")
            }
            Scalar::QName(_) => type_name.as_str() == "xs:QName",
            Scalar::Temporal(_) => matches!(
                type_name.as_str(),
                "xs:dateTime"
                    | "xs:dateTimeStamp"
                    | "xs:date"
                    | "xs:time"
                    | "xs:gYear"
                    | "xs:gYearMonth"
                    | "xs:gMonth"
                    | "xs:gMonthDay"
                    | "xs:gDay"
            ),
            Scalar::Duration(_) => type_name.is_subtype_of("xs:duration"),
            Scalar::Binary(_) => matches!(type_name.as_str(), "xs:hexBinary" | "xs:base64Binary"),
        };
        if !fits {
            return Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("cannot create a value of type {type_name} from {value:?}"),
            ));
        }
        Ok(Self { type_name, value })
    }

    fn builtin(type_name: &str, value: Scalar) -> Self {
        Self { type_name: TypeName::new(type_name), value }
    }

    pub fn boolean(b: bool) -> Self {
        Self::builtin("xs:boolean", Scalar::Boolean(b))
    }

    pub fn integer(i: i64) -> Self {
        Self::builtin("xs:integer", Scalar::Integer(i))
    }

    pub fn decimal(d: Decimal) -> Self {
        Self::builtin("xs:decimal", Scalar::Decimal(d))
    }

    pub fn double(d: f64) -> Self {
        Self::builtin("xs:double", Scalar::Double(d))
    }

    pub fn float(f: f32) -> Self {
        Self::builtin("xs:float", Scalar::Float(f))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::builtin("xs:string", Scalar::String(s.into()))
    }

    pub fn untyped(s: impl Into<String>) -> Self {
        Self::builtin("xs:untypedAtomic", Scalar::String(s.into()))
    }

    pub fn any_uri(s: impl Into<String>) -> Self {
        Self::builtin("xs:anyURI", Scalar::String(s.into()))
    }

    pub fn qname(q: QName) -> Self {
        Self::builtin("xs:QName", Scalar::QName(q))
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    pub fn value(&self) -> &Scalar {
        &self.value
    }

    pub fn into_value(self) -> Scalar {
        self.value
    }

    pub fn is_instance_of(&self, ancestor: &str) -> bool {
        self.type_name.is_subtype_of(ancestor)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.value, Scalar::Integer(_) | Scalar::Decimal(_) | Scalar::Float(_) | Scalar::Double(_))
    }

    /// String, untypedAtomic, anyURI and their subtypes.
    pub fn is_string_like(&self) -> bool {
        matches!(self.value, Scalar::String(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        match &self.value {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Decimal(d) => d.to_f64(),
            Scalar::Float(f) => Some(f64::from(*f)),
            Scalar::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical lexical form.
    pub fn string_value(&self) -> String {
        let t = self.type_name.as_str();
        match &self.value {
            Scalar::Boolean(b) => b.to_string(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Decimal(d) => format_decimal(*d),
            Scalar::Float(f) => format_float(*f),
            Scalar::Double(d) => format_double(*d),
            Scalar::String(s) => s.clone(),
            Scalar::QName(q) => q.to_string(),
            Scalar::Temporal(v) => format_temporal(t, v),
            Scalar::Duration(d) => format_duration(t, d),
            Scalar::Binary(bytes) if t == "xs:base64Binary" => base64::engine::general_purpose::STANDARD.encode(bytes),
            Scalar::Binary(bytes) => bytes.iter().map(|b| format!("{b:02X}")).collect(),
        }
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string_value())
    }
}

pub(crate) fn format_decimal(d: Decimal) -> String {
    let n = d.normalize();
    if n.is_zero() { "0".to_string() } else { n.to_string() }
}

fn with_exponent_mantissa(s: String) -> String {
    // Rust prints `1E7`; the canonical form is `1.0E7`.
    match s.split_once('E') {
        Some((mantissa, exp)) if !mantissa.contains('.') => format!("{mantissa}.0E{exp}"),
        _ => s,
    }
}

pub(crate) fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF".to_string() } else { "-INF".to_string() };
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }
    let abs = d.abs();
    if (1e-6..1e6).contains(&abs) { format!("{d}") } else { with_exponent_mantissa(format!("{d:E}")) }
}

pub(crate) fn format_float(f: f32) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF".to_string() } else { "-INF".to_string() };
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }
    let abs = f.abs();
    if (1e-6..1e6).contains(&abs) { format!("{f}") } else { with_exponent_mantissa(format!("{f:E}")) }
}
