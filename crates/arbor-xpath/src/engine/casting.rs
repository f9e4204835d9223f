//! Casting between atomic types.
//!
//! Values whose source is string-like are re-parsed from their lexical form;
//! everything else converts value to value. Casting to the value's own type
//! is the identity.

use crate::engine::runtime::{Error, ErrorCode, NamespaceResolver, NoNamespaces};
use crate::model::QName;
use crate::xdm::temporal::{parse_duration, parse_temporal, Duration, Temporal};
use crate::xdm::types::{is_known_type, is_subtype_of, primitive_type};
use crate::xdm::{AtomicValue, Scalar};
use base64::Engine as _;
use chrono::{Datelike, NaiveDate, NaiveTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Cast without namespace bindings (QName targets resolve only `xml`).
pub fn cast(value: &AtomicValue, target: &str) -> Result<AtomicValue, Error> {
    cast_with(value, target, &NoNamespaces)
}

pub fn cast_with(value: &AtomicValue, target: &str, ns: &dyn NamespaceResolver) -> Result<AtomicValue, Error> {
    if !is_known_type(target) || !is_subtype_of(target, "xs:anyAtomicType") {
        return Err(Error::type_error(format!("{target} is not an atomic type")));
    }
    if matches!(target, "xs:anyAtomicType" | "xs:numeric" | "xs:NOTATION") {
        return Err(Error::type_error(format!("cannot cast to abstract type {target}")));
    }
    let source = value.type_name().as_str();
    if source == target {
        return Ok(value.clone());
    }
    if target == "xs:untypedAtomic" {
        return Ok(AtomicValue::untyped(value.string_value()));
    }
    if target == "xs:string" {
        return Ok(AtomicValue::string(value.string_value()));
    }
    if value.is_string_like() {
        return from_lexical(&value.string_value(), target, ns);
    }
    if is_subtype_of(target, "xs:string") || target == "xs:anyURI" {
        return Err(not_castable(source, target));
    }
    convert(value, target)
}

fn not_castable(source: &str, target: &str) -> Error {
    Error::type_error(format!("casting from {source} to {target} is not supported"))
}

fn invalid(target: &str, s: &str) -> Error {
    Error::from_code(ErrorCode::FORG0001, format!("cannot cast '{s}' to {target}"))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}'))
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.split(':').all(|part| part.is_empty() || is_ncname(part)) && !s.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.')
}

fn is_nmtoken(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '\u{B7}'))
}

fn is_language(s: &str) -> bool {
    let mut parts = s.split('-');
    let first_ok = parts.next().is_some_and(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
    first_ok && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn is_decimal_lexical(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    (!int.is_empty() || !frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

fn is_integer_lexical(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit())
}

fn is_float_lexical(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
        None => (s, None),
    };
    is_decimal_lexical(mantissa) && exponent.is_none_or(is_integer_lexical)
}

fn parse_ieee(s: &str) -> Option<f64> {
    match s {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ if is_float_lexical(s) => s.parse().ok(),
        _ => None,
    }
}

/// Range facet of the derived integer types.
fn integer_in_range(target: &str, i: i64) -> bool {
    match target {
        "xs:int" => i32::try_from(i).is_ok(),
        "xs:short" => i16::try_from(i).is_ok(),
        "xs:byte" => i8::try_from(i).is_ok(),
        "xs:nonPositiveInteger" => i <= 0,
        "xs:negativeInteger" => i < 0,
        "xs:nonNegativeInteger" | "xs:unsignedLong" => i >= 0,
        "xs:positiveInteger" => i > 0,
        "xs:unsignedInt" => u32::try_from(i).is_ok(),
        "xs:unsignedShort" => u16::try_from(i).is_ok(),
        "xs:unsignedByte" => u8::try_from(i).is_ok(),
        _ => true,
    }
}

fn make_integer(target: &str, i: i64) -> Result<AtomicValue, Error> {
    if !integer_in_range(target, i) {
        return Err(invalid(target, &i.to_string()));
    }
    AtomicValue::new(target, Scalar::Integer(i))
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok()).collect()
}

/// Build a value of type `target` from a lexical form.
fn from_lexical(raw: &str, target: &str, ns: &dyn NamespaceResolver) -> Result<AtomicValue, Error> {
    let s = raw.trim();
    let Some(primitive) = primitive_type(target) else {
        return Err(not_castable("xs:string", target));
    };
    match primitive {
        "xs:string" => {
            let value = match target {
                "xs:normalizedString" => raw.replace(['\t', '\n', '\r'], " "),
                "xs:token" => collapse_whitespace(raw),
                "xs:language" if is_language(s) => s.to_string(),
                "xs:NMTOKEN" if is_nmtoken(s) => s.to_string(),
                "xs:Name" if is_name(s) => s.to_string(),
                "xs:NCName" | "xs:ID" | "xs:IDREF" | "xs:ENTITY" if is_ncname(s) => s.to_string(),
                "xs:language" | "xs:NMTOKEN" | "xs:Name" | "xs:NCName" | "xs:ID" | "xs:IDREF" | "xs:ENTITY" => {
                    return Err(invalid(target, raw));
                }
                _ => raw.to_string(),
            };
            AtomicValue::new(target, Scalar::String(value))
        }
        "xs:anyURI" => Ok(AtomicValue::any_uri(s)),
        "xs:boolean" => match s {
            "true" | "1" => Ok(AtomicValue::boolean(true)),
            "false" | "0" => Ok(AtomicValue::boolean(false)),
            _ => Err(invalid(target, raw)),
        },
        "xs:decimal" => {
            if !is_decimal_lexical(s) {
                return Err(invalid(target, raw));
            }
            Decimal::from_str(s.strip_prefix('+').unwrap_or(s))
                .map(AtomicValue::decimal)
                .map_err(|_| invalid(target, raw))
        }
        "xs:integer" => {
            if !is_integer_lexical(s) {
                return Err(invalid(target, raw));
            }
            let i: i64 = s.strip_prefix('+').unwrap_or(s).parse().map_err(|_| invalid(target, raw))?;
            make_integer(target, i)
        }
        "xs:double" => parse_ieee(s).map(AtomicValue::double).ok_or_else(|| invalid(target, raw)),
        "xs:float" => parse_ieee(s).map(|d| AtomicValue::float(d as f32)).ok_or_else(|| invalid(target, raw)),
        "xs:QName" => resolve_qname(s, ns).map(AtomicValue::qname),
        "xs:duration" => {
            let d = parse_duration(target, s)?;
            AtomicValue::new(target, Scalar::Duration(d))
        }
        "xs:hexBinary" => parse_hex(s)
            .map(|b| AtomicValue::new(target, Scalar::Binary(b)))
            .ok_or_else(|| invalid(target, raw))?,
        "xs:base64Binary" => {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|_| invalid(target, raw))
                .and_then(|b| AtomicValue::new(target, Scalar::Binary(b)))
        }
        _ => {
            let t = parse_temporal(target, s)?;
            AtomicValue::new(target, Scalar::Temporal(t))
        }
    }
}

/// Resolve a lexical QName: `prefix:local` through the resolver, an unprefixed
/// name in the empty-prefix namespace.
pub fn resolve_qname(lexical: &str, ns: &dyn NamespaceResolver) -> Result<QName, Error> {
    let s = collapse_whitespace(lexical);
    let (prefix, local) = match s.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, s.as_str()),
    };
    if !is_ncname(local) || prefix.is_some_and(|p| !is_ncname(p)) {
        return Err(Error::from_code(ErrorCode::FORG0001, format!("invalid QName '{lexical}'")));
    }
    let ns_uri = match prefix {
        None => ns.resolve_namespace(""),
        Some(p) => Some(ns.resolve_namespace(p).ok_or_else(|| {
            Error::from_code(ErrorCode::FONS0004, format!("no namespace is bound to prefix '{p}'"))
        })?),
    };
    Ok(QName { prefix: prefix.map(str::to_string), local: local.to_string(), ns_uri })
}

fn non_finite(target: &str, d: f64) -> Error {
    Error::from_code(ErrorCode::FOCA0002, format!("cannot cast {d} to {target}"))
}

fn to_decimal(value: &AtomicValue, target: &str) -> Result<Decimal, Error> {
    match value.value() {
        Scalar::Integer(i) => Ok(Decimal::from(*i)),
        Scalar::Decimal(d) => Ok(*d),
        Scalar::Boolean(b) => Ok(Decimal::from(u8::from(*b))),
        Scalar::Float(_) | Scalar::Double(_) => {
            let d = value.as_f64().unwrap_or(f64::NAN);
            if !d.is_finite() {
                return Err(non_finite(target, d));
            }
            Decimal::from_f64(d).ok_or_else(|| non_finite(target, d))
        }
        _ => Err(not_castable(value.type_name().as_str(), target)),
    }
}

/// Value-to-value conversion for non-string sources.
fn convert(value: &AtomicValue, target: &str) -> Result<AtomicValue, Error> {
    let source = value.type_name().as_str();
    let Some(primitive) = primitive_type(target) else {
        return Err(not_castable(source, target));
    };
    let numeric_or_bool = value.is_numeric() || matches!(value.value(), Scalar::Boolean(_));
    match (primitive, value.value()) {
        ("xs:boolean", Scalar::Integer(i)) => Ok(AtomicValue::boolean(*i != 0)),
        ("xs:boolean", Scalar::Decimal(d)) => Ok(AtomicValue::boolean(!d.is_zero())),
        ("xs:boolean", Scalar::Float(_) | Scalar::Double(_)) => {
            let d = value.as_f64().unwrap_or(f64::NAN);
            Ok(AtomicValue::boolean(d != 0.0 && !d.is_nan()))
        }
        ("xs:double", _) if numeric_or_bool => Ok(AtomicValue::double(match value.value() {
            Scalar::Boolean(b) => f64::from(u8::from(*b)),
            _ => value.as_f64().unwrap_or(f64::NAN),
        })),
        ("xs:float", _) if numeric_or_bool => {
            let d = match value.value() {
                Scalar::Boolean(b) => f64::from(u8::from(*b)),
                _ => value.as_f64().unwrap_or(f64::NAN),
            };
            Ok(AtomicValue::float(d as f32))
        }
        ("xs:decimal", _) if numeric_or_bool => to_decimal(value, target).map(AtomicValue::decimal),
        ("xs:integer", Scalar::Integer(i)) => make_integer(target, *i),
        ("xs:integer", _) if numeric_or_bool => {
            let d = to_decimal(value, target)?.trunc();
            let i = d.to_i64().ok_or_else(|| Error::from_code(ErrorCode::FOCA0002, format!("{d} is out of range for {target}")))?;
            make_integer(target, i)
        }
        ("xs:duration", Scalar::Duration(d)) => {
            let d = match target {
                "xs:yearMonthDuration" => Duration { months: d.months, seconds: Decimal::ZERO },
                "xs:dayTimeDuration" => Duration { months: 0, seconds: d.seconds },
                _ => *d,
            };
            AtomicValue::new(target, Scalar::Duration(d))
        }
        ("xs:hexBinary" | "xs:base64Binary", Scalar::Binary(b)) => AtomicValue::new(target, Scalar::Binary(b.clone())),
        (_, Scalar::Temporal(t)) => convert_temporal(source, target, t),
        _ => Err(not_castable(source, target)),
    }
}

fn convert_temporal(source: &str, target: &str, t: &Temporal) -> Result<AtomicValue, Error> {
    let date = t.date_time.date();
    let at_midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN);
    let reference = |m: u32, d: u32| NaiveDate::from_ymd_opt(1972, m, d).map(at_midnight);
    let has_date = matches!(source, "xs:dateTime" | "xs:dateTimeStamp" | "xs:date");
    let date_time = match target {
        "xs:dateTime" if source == "xs:date" => Some(t.date_time),
        "xs:dateTime" if source == "xs:dateTimeStamp" => Some(t.date_time),
        "xs:dateTimeStamp" if source == "xs:dateTime" && t.tz.is_some() => Some(t.date_time),
        "xs:date" if has_date => Some(at_midnight(date)),
        "xs:time" if matches!(source, "xs:dateTime" | "xs:dateTimeStamp") => {
            NaiveDate::from_ymd_opt(1972, 12, 31).map(|d| d.and_time(t.date_time.time()))
        }
        "xs:gYear" if has_date => NaiveDate::from_ymd_opt(date.year(), 1, 1).map(at_midnight),
        "xs:gYearMonth" if has_date => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).map(at_midnight),
        "xs:gMonth" if has_date => reference(date.month(), 1),
        "xs:gMonthDay" if has_date => reference(date.month(), date.day()),
        "xs:gDay" if has_date => reference(12, date.day()),
        _ => None,
    };
    let date_time = date_time.ok_or_else(|| not_castable(source, target))?;
    AtomicValue::new(target, Scalar::Temporal(Temporal { date_time, tz: t.tz }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("xs:double", " INF ", "INF")]
    #[case("xs:double", "1e3", "1000")]
    #[case("xs:decimal", "+001.500", "1.5")]
    #[case("xs:integer", "-0042", "-42")]
    #[case("xs:boolean", "1", "true")]
    #[case("xs:hexBinary", "0aff", "0AFF")]
    #[case("xs:date", "2024-02-29Z", "2024-02-29Z")]
    fn untyped_casts(#[case] target: &str, #[case] input: &str, #[case] expected: &str) {
        let v = cast(&AtomicValue::untyped(input), target).unwrap();
        assert_eq!(v.type_name().as_str(), target);
        assert_eq!(v.string_value(), expected);
    }

    #[rstest]
    #[case("xs:decimal", "INF")]
    #[case("xs:integer", "1.5")]
    #[case("xs:double", "inf")]
    #[case("xs:unsignedByte", "256")]
    #[case("xs:NCName", "1abc")]
    fn malformed_lexical_forms(#[case] target: &str, #[case] input: &str) {
        let err = cast(&AtomicValue::string(input), target).unwrap_err();
        assert_eq!(err.code, ErrorCode::FORG0001);
    }

    #[test]
    fn numeric_conversions() {
        let d = cast(&AtomicValue::double(-2.7), "xs:integer").unwrap();
        assert_eq!(d.value(), &Scalar::Integer(-2));
        let err = cast(&AtomicValue::double(f64::NAN), "xs:decimal").unwrap_err();
        assert_eq!(err.code, ErrorCode::FOCA0002);
        let b = cast(&AtomicValue::integer(0), "xs:boolean").unwrap();
        assert_eq!(b.value(), &Scalar::Boolean(false));
    }

    #[test]
    fn date_time_projections() {
        let dt = cast(&AtomicValue::string("2024-05-06T07:08:09+01:00"), "xs:dateTime").unwrap();
        assert_eq!(cast(&dt, "xs:date").unwrap().string_value(), "2024-05-06+01:00");
        assert_eq!(cast(&dt, "xs:gMonthDay").unwrap().string_value(), "--05-06+01:00");
        assert_eq!(cast(&dt, "xs:time").unwrap().string_value(), "07:08:09+01:00");
    }

    #[test]
    fn qname_prefix_resolution() {
        let err = resolve_qname("foo:bar", &NoNamespaces).unwrap_err();
        assert_eq!(err.code, ErrorCode::FONS0004);
        let err = resolve_qname("1bar", &NoNamespaces).unwrap_err();
        assert_eq!(err.code, ErrorCode::FORG0001);
        let q = resolve_qname("  xml:lang ", &NoNamespaces).unwrap();
        assert_eq!(q.ns_uri.as_deref(), Some(crate::consts::XML_URI));
    }
}
