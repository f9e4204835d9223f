//! Lexical forms of the date/time and duration types.
//!
//! All date/time types share one representation: a naive date-time plus an
//! optional timezone. Types without a date or time part fill the gaps from
//! the reference date 1972-12-31 so that equal values compare equal.

use crate::engine::runtime::{Error, ErrorCode};
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

const REFERENCE_YEAR: i32 = 1972;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temporal {
    pub date_time: NaiveDateTime,
    pub tz: Option<FixedOffset>,
}

impl Temporal {
    /// The UTC instant; values without timezone are taken as UTC.
    pub fn instant(&self) -> NaiveDateTime {
        match self.tz {
            Some(tz) => self.date_time - chrono::Duration::seconds(i64::from(tz.local_minus_utc())),
            None => self.date_time,
        }
    }

    pub fn calendar_eq(&self, other: &Temporal) -> bool {
        self.instant() == other.instant()
    }
}

/// Months and seconds; the sign applies to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duration {
    pub months: i64,
    pub seconds: Decimal,
}

fn invalid(type_name: &str, s: &str) -> Error {
    Error::from_code(ErrorCode::FORG0001, format!("invalid lexical value for {type_name}: '{s}'"))
}

fn digits(s: &str, len: usize) -> Option<u32> {
    (s.len() == len && s.bytes().all(|b| b.is_ascii_digit())).then(|| s.parse().ok()).flatten()
}

fn split_tz(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = s.strip_suffix('Z') {
        return Some((body, FixedOffset::east_opt(0)));
    }
    let bytes = s.as_bytes();
    if s.len() >= 6 && matches!(bytes[s.len() - 6], b'+' | b'-') && bytes[s.len() - 3] == b':' {
        let sign = if bytes[s.len() - 6] == b'-' { -1 } else { 1 };
        let hours = digits(&s[s.len() - 5..s.len() - 3], 2)?;
        let minutes = digits(&s[s.len() - 2..], 2)?;
        if hours > 14 || minutes > 59 || (hours == 14 && minutes > 0) {
            return None;
        }
        let offset = FixedOffset::east_opt(sign * i32::try_from(hours * 3600 + minutes * 60).ok()?)?;
        return Some((&s[..s.len() - 6], Some(offset)));
    }
    Some((s, None))
}

fn parse_year(s: &str) -> Option<i32> {
    let body = s.strip_prefix('-').unwrap_or(s);
    if body.len() < 4 || !body.bytes().all(|b| b.is_ascii_digit()) || (body.len() > 4 && body.starts_with('0')) {
        return None;
    }
    let year: i32 = body.parse().ok()?;
    Some(if s.starts_with('-') { -year } else { year })
}

/// Split `[-]YYYY-MM[-DD]` into parts, keeping a leading minus on the year.
fn split_date(s: &str) -> Vec<&str> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let mut parts: Vec<&str> = body.split('-').collect();
    if neg {
        if let Some(first) = parts.first_mut() {
            *first = &s[..=first.len()];
        }
    }
    parts
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    match split_date(s).as_slice() {
        [y, m, d] => NaiveDate::from_ymd_opt(parse_year(y)?, digits(m, 2)?, digits(d, 2)?),
        _ => None,
    }
}

/// Returns the time and whether it was `24:00:00` (end of day).
fn parse_time(s: &str) -> Option<(NaiveTime, bool)> {
    let mut parts = s.split(':');
    let (h, m, sec) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let (whole, frac) = match sec.split_once('.') {
        Some((w, f)) if !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()) => (w, f),
        Some(_) => return None,
        None => (sec, ""),
    };
    let (h, m, whole) = (digits(h, 2)?, digits(m, 2)?, digits(whole, 2)?);
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        let padded: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
        padded.parse().ok()?
    };
    if h == 24 {
        return (m == 0 && whole == 0 && nanos == 0).then(|| (NaiveTime::MIN, true));
    }
    NaiveTime::from_hms_nano_opt(h, m, whole, nanos).map(|t| (t, false))
}

fn reference_date(month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(REFERENCE_YEAR, month, day)
}

/// Parse a date/time family value of type `type_name`.
pub fn parse_temporal(type_name: &str, lexical: &str) -> Result<Temporal, Error> {
    let s = lexical.trim();
    let parsed = split_tz(s).and_then(|(body, tz)| {
        let date_time = match type_name {
            "xs:dateTime" | "xs:dateTimeStamp" => {
                let (d, t) = body.split_once('T')?;
                let (time, end_of_day) = parse_time(t)?;
                let date = parse_date(d)?;
                let date = if end_of_day { date.succ_opt()? } else { date };
                date.and_time(time)
            }
            "xs:date" => parse_date(body)?.and_time(NaiveTime::MIN),
            "xs:time" => reference_date(12, 31)?.and_time(parse_time(body)?.0),
            "xs:gYear" => NaiveDate::from_ymd_opt(parse_year(body)?, 1, 1)?.and_time(NaiveTime::MIN),
            "xs:gYearMonth" => match split_date(body).as_slice() {
                [y, m] => NaiveDate::from_ymd_opt(parse_year(y)?, digits(m, 2)?, 1)?.and_time(NaiveTime::MIN),
                _ => return None,
            },
            "xs:gMonth" => reference_date(digits(body.strip_prefix("--")?, 2)?, 1)?.and_time(NaiveTime::MIN),
            "xs:gMonthDay" => {
                let (m, d) = body.strip_prefix("--")?.split_once('-')?;
                reference_date(digits(m, 2)?, digits(d, 2)?)?.and_time(NaiveTime::MIN)
            }
            "xs:gDay" => reference_date(12, digits(body.strip_prefix("---")?, 2)?)?.and_time(NaiveTime::MIN),
            _ => return None,
        };
        if type_name == "xs:dateTimeStamp" && tz.is_none() {
            return None;
        }
        Some(Temporal { date_time, tz })
    });
    parsed.ok_or_else(|| invalid(type_name, lexical))
}

fn format_year(year: i32) -> String {
    if year < 0 { format!("-{:04}", year.unsigned_abs()) } else { format!("{year:04}") }
}

fn format_tz(tz: Option<FixedOffset>) -> String {
    let Some(tz) = tz else {
        return String::new();
    };
    let secs = tz.local_minus_utc();
    if secs == 0 {
        return "Z".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}

fn format_time(t: NaiveTime) -> String {
    let mut out = format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second());
    if t.nanosecond() > 0 {
        let frac = format!("{:09}", t.nanosecond());
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

/// Canonical lexical form.
pub fn format_temporal(type_name: &str, value: &Temporal) -> String {
    let dt = value.date_time;
    let body = match type_name {
        "xs:date" => format!("{}-{:02}-{:02}", format_year(dt.year()), dt.month(), dt.day()),
        "xs:time" => format_time(dt.time()),
        "xs:gYear" => format_year(dt.year()),
        "xs:gYearMonth" => format!("{}-{:02}", format_year(dt.year()), dt.month()),
        "xs:gMonth" => format!("--{:02}", dt.month()),
        "xs:gMonthDay" => format!("--{:02}-{:02}", dt.month(), dt.day()),
        "xs:gDay" => format!("---{:02}", dt.day()),
        _ => format!("{}-{:02}-{:02}T{}", format_year(dt.year()), dt.month(), dt.day(), format_time(dt.time())),
    };
    body + &format_tz(value.tz)
}

fn take_component<'a>(s: &'a str, designator: char) -> Option<(Option<&'a str>, &'a str)> {
    match s.find(designator) {
        Some(idx) => {
            let number = &s[..idx];
            let valid = !number.is_empty()
                && number.bytes().all(|b| b.is_ascii_digit() || b == b'.')
                && number.matches('.').count() <= usize::from(designator == 'S')
                && !number.starts_with('.')
                && !number.ends_with('.');
            valid.then_some((Some(number), &s[idx + 1..]))
        }
        None => Some((None, s)),
    }
}

/// Parse `xs:duration`, `xs:yearMonthDuration` or `xs:dayTimeDuration`.
pub fn parse_duration(type_name: &str, lexical: &str) -> Result<Duration, Error> {
    let s = lexical.trim();
    let parsed = (|| {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let body = body.strip_prefix('P')?;
        let (date_part, time_part) = match body.split_once('T') {
            Some((d, t)) if !t.is_empty() => (d, Some(t)),
            Some(_) => return None,
            None => (body, None),
        };
        let (years, rest) = take_component(date_part, 'Y')?;
        let (months, rest) = take_component(rest, 'M')?;
        let (days, rest) = take_component(rest, 'D')?;
        if !rest.is_empty() {
            return None;
        }
        let (mut hours, mut minutes, mut secs) = (None, None, None);
        if let Some(t) = time_part {
            let (h, rest) = take_component(t, 'H')?;
            let (m, rest) = take_component(rest, 'M')?;
            let (sec, rest) = take_component(rest, 'S')?;
            if !rest.is_empty() || (h.is_none() && m.is_none() && sec.is_none()) {
                return None;
            }
            (hours, minutes, secs) = (h, m, sec);
        }
        let components = [years, months, days, hours, minutes, secs];
        if components.iter().all(Option::is_none) {
            return None;
        }
        let has_day_time = days.is_some() || time_part.is_some();
        let has_year_month = years.is_some() || months.is_some();
        match type_name {
            "xs:yearMonthDuration" if has_day_time => return None,
            "xs:dayTimeDuration" if has_year_month => return None,
            _ => {}
        }
        let int = |v: Option<&str>| -> Option<i64> { v.map_or(Some(0), |s| s.parse().ok()) };
        let dec = |v: Option<&str>| -> Option<Decimal> { v.map_or(Some(Decimal::ZERO), |s| Decimal::from_str(s).ok()) };
        let total_months = int(years)?.checked_mul(12)?.checked_add(int(months)?)?;
        let total_seconds = Decimal::from(int(days)?) * Decimal::from(86_400)
            + Decimal::from(int(hours)?) * Decimal::from(3_600)
            + Decimal::from(int(minutes)?) * Decimal::from(60)
            + dec(secs)?;
        Some(if negative {
            Duration { months: -total_months, seconds: -total_seconds }
        } else {
            Duration { months: total_months, seconds: total_seconds }
        })
    })();
    parsed.ok_or_else(|| invalid(type_name, lexical))
}

/// Canonical lexical form.
pub fn format_duration(type_name: &str, d: &Duration) -> String {
    let negative = d.months < 0 || (d.seconds.is_sign_negative() && !d.seconds.is_zero());
    let months = d.months.unsigned_abs();
    let seconds = d.seconds.abs();
    if months == 0 && seconds.is_zero() {
        return if type_name == "xs:yearMonthDuration" { "P0M".to_string() } else { "PT0S".to_string() };
    }
    let mut out = String::from(if negative { "-P" } else { "P" });
    let (years, months) = (months / 12, months % 12);
    if years > 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months > 0 {
        out.push_str(&format!("{months}M"));
    }
    let day_secs = Decimal::from(86_400);
    let days = (seconds / day_secs).trunc();
    let rest = seconds - days * day_secs;
    let hours = (rest / Decimal::from(3_600)).trunc();
    let rest = rest - hours * Decimal::from(3_600);
    let minutes = (rest / Decimal::from(60)).trunc();
    let secs = (rest - minutes * Decimal::from(60)).normalize();
    if !days.is_zero() {
        out.push_str(&format!("{}D", days.to_i64().unwrap_or_default()));
    }
    if !(hours.is_zero() && minutes.is_zero() && secs.is_zero()) {
        out.push('T');
        if !hours.is_zero() {
            out.push_str(&format!("{}H", hours.to_i64().unwrap_or_default()));
        }
        if !minutes.is_zero() {
            out.push_str(&format!("{}M", minutes.to_i64().unwrap_or_default()));
        }
        if !secs.is_zero() {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_time_with_timezone() {
        let a = parse_temporal("xs:dateTime", "2024-03-01T12:00:00+02:00").unwrap();
        let b = parse_temporal("xs:dateTime", "2024-03-01T10:00:00Z").unwrap();
        assert!(a.calendar_eq(&b));
        assert_eq!(format_temporal("xs:dateTime", &a), "2024-03-01T12:00:00+02:00");
    }

    #[test]
    fn end_of_day_rolls_over() {
        let t = parse_temporal("xs:dateTime", "2024-12-31T24:00:00").unwrap();
        assert_eq!(format_temporal("xs:dateTime", &t), "2025-01-01T00:00:00");
    }

    #[test]
    fn g_types() {
        let md = parse_temporal("xs:gMonthDay", "--02-29").unwrap();
        assert_eq!(format_temporal("xs:gMonthDay", &md), "--02-29");
        assert!(parse_temporal("xs:gDay", "--01").is_err());
        assert_eq!(format_temporal("xs:gYear", &parse_temporal("xs:gYear", "-0044").unwrap()), "-0044");
    }

    #[test]
    fn durations() {
        let d = parse_duration("xs:duration", "P1Y2M3DT4H5M6.5S").unwrap();
        assert_eq!(d.months, 14);
        assert_eq!(format_duration("xs:duration", &d), "P1Y2M3DT4H5M6.5S");
        assert!(parse_duration("xs:dayTimeDuration", "P1Y").is_err());
        assert!(parse_duration("xs:duration", "PT").is_err());
        assert_eq!(format_duration("xs:dayTimeDuration", &parse_duration("xs:dayTimeDuration", "PT90M").unwrap()), "PT1H30M");
        assert_eq!(format_duration("xs:yearMonthDuration", &Duration { months: 0, seconds: Decimal::ZERO }), "P0M");
    }
}
