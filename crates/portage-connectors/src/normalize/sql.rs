//! Normalization for the row-cursor SQL engines
//!
//! Postgres, Redshift, ClickHouse, and Snowflake all retrieve rows through a
//! cursor-shaped protocol; their connectors decode driver values into
//! [`SqlValue`] at the I/O edge, and [`normalize`] maps that union into the
//! canonical model.

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use portage_common::types::CanonicalValue;

/// A native value as decoded by a cursor-engine driver.
///
/// `Other` is the escape hatch for native types outside the mapping table;
/// it carries the driver's best-effort textual rendering so normalization
/// can fall back to the `string` kind instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    /// Absolute instant with a UTC offset
    Timestamp(DateTime<FixedOffset>),
    /// Civil date
    Date(NaiveDate),
    /// Civil time of day
    Time(NaiveTime),
    /// Civil date-time, no timezone
    DateTime(NaiveDateTime),
    /// Arbitrary-precision numeric
    Numeric(BigDecimal),
    /// Native type outside the mapping table, rendered as text
    Other(String),
}

/// Map one native value to its canonical kind.
///
/// Deterministic and total: every [`SqlValue`] maps to exactly one
/// [`CanonicalValue`] kind. Bytes are decoded as UTF-8 text, lossily for
/// non-text payloads. Temporal kinds serialize to their canonical textual
/// forms; decimals keep their exact representation.
pub fn normalize(value: SqlValue) -> CanonicalValue {
    match value {
        SqlValue::Null => CanonicalValue::Null,
        SqlValue::Int(v) => CanonicalValue::Integer(v),
        SqlValue::Float(v) => CanonicalValue::Float(v),
        SqlValue::Bool(v) => CanonicalValue::Boolean(v),
        SqlValue::Text(v) => CanonicalValue::String(v),
        SqlValue::Bytes(v) => CanonicalValue::Binary(String::from_utf8_lossy(&v).into_owned()),
        SqlValue::Timestamp(v) => CanonicalValue::Timestamp(v.to_rfc3339()),
        SqlValue::Date(v) => CanonicalValue::Date(v.format("%Y-%m-%d").to_string()),
        SqlValue::Time(v) => CanonicalValue::Time(v.format("%H:%M:%S%.f").to_string()),
        SqlValue::DateTime(v) => {
            CanonicalValue::DateTime(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        },
        SqlValue::Numeric(v) => CanonicalValue::Decimal(v.to_string()),
        SqlValue::Other(v) => CanonicalValue::String(v),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn maps_every_native_kind_to_exactly_one_canonical_kind() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap();
        let time = NaiveTime::from_hms_opt(12, 30, 45).unwrap();
        let instant = DateTime::parse_from_rfc3339("2024-01-18T12:30:45+02:00").unwrap();

        let cases: Vec<(SqlValue, CanonicalValue)> = vec![
            (SqlValue::Null, CanonicalValue::Null),
            (SqlValue::Int(-7), CanonicalValue::Integer(-7)),
            (SqlValue::Float(2.5), CanonicalValue::Float(2.5)),
            (SqlValue::Bool(false), CanonicalValue::Boolean(false)),
            (
                SqlValue::Text("hello".to_string()),
                CanonicalValue::String("hello".to_string()),
            ),
            (
                SqlValue::Timestamp(instant),
                CanonicalValue::Timestamp("2024-01-18T12:30:45+02:00".to_string()),
            ),
            (
                SqlValue::Date(date),
                CanonicalValue::Date("2024-01-18".to_string()),
            ),
            (
                SqlValue::Time(time),
                CanonicalValue::Time("12:30:45".to_string()),
            ),
            (
                SqlValue::DateTime(date.and_time(time)),
                CanonicalValue::DateTime("2024-01-18T12:30:45".to_string()),
            ),
            (
                SqlValue::Numeric(BigDecimal::from_str("3.140000001").unwrap()),
                CanonicalValue::Decimal("3.140000001".to_string()),
            ),
            (
                SqlValue::Other("POINT(1 2)".to_string()),
                CanonicalValue::String("POINT(1 2)".to_string()),
            ),
        ];

        for (native, expected) in cases {
            assert_eq!(normalize(native), expected);
        }
    }

    #[test]
    fn bytes_decode_as_text() {
        assert_eq!(
            normalize(SqlValue::Bytes(b"abc".to_vec())),
            CanonicalValue::Binary("abc".to_string())
        );
    }

    #[test]
    fn non_utf8_bytes_decode_lossily() {
        let value = normalize(SqlValue::Bytes(vec![0x66, 0xff, 0x6f]));
        match value {
            CanonicalValue::Binary(text) => assert!(text.contains('\u{fffd}')),
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn decimal_keeps_its_exact_form() {
        let exact = "123456789012345678901234567890.000000001";
        assert_eq!(
            normalize(SqlValue::Numeric(BigDecimal::from_str(exact).unwrap())),
            CanonicalValue::Decimal(exact.to_string())
        );
    }

    #[test]
    fn fractional_seconds_survive() {
        let time = NaiveTime::from_hms_micro_opt(1, 2, 3, 123_456).unwrap();
        assert_eq!(
            normalize(SqlValue::Time(time)),
            CanonicalValue::Time("01:02:03.123456".to_string())
        );
    }
}
