//! Canonical tagged values
//!
//! Every native value any supported engine can produce maps to exactly one
//! of these kinds. Temporal and decimal kinds carry their canonical textual
//! representation so no precision is lost crossing engine boundaries.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A warehouse-agnostic value.
///
/// Wire form is `{"type": "<kind>", "value": <json>}`. The `binary` kind
/// carries the byte sequence decoded as text, which is lossy for non-text
/// payloads; this is a documented limitation of the canonical model, not
/// something connectors should work around.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CanonicalValue {
    /// Absent / SQL NULL
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    Boolean(bool),
    String(String),
    /// Raw bytes, decoded as text (lossy for non-text payloads)
    Binary(String),
    /// Absolute instant, RFC 3339 with UTC offset
    Timestamp(String),
    /// Civil date, `YYYY-MM-DD`
    Date(String),
    /// Civil time of day, `HH:MM:SS[.fff]`
    Time(String),
    /// Civil date-time without timezone
    DateTime(String),
    /// Arbitrary-precision decimal, exact textual form
    Decimal(String),
}

impl CanonicalValue {
    /// The kind tag used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalValue::Null => "null",
            CanonicalValue::Integer(_) => "integer",
            CanonicalValue::Float(_) => "float",
            CanonicalValue::Boolean(_) => "boolean",
            CanonicalValue::String(_) => "string",
            CanonicalValue::Binary(_) => "binary",
            CanonicalValue::Timestamp(_) => "timestamp",
            CanonicalValue::Date(_) => "date",
            CanonicalValue::Time(_) => "time",
            CanonicalValue::DateTime(_) => "datetime",
            CanonicalValue::Decimal(_) => "decimal",
        }
    }

    /// True for the `null` kind.
    pub fn is_null(&self) -> bool {
        matches!(self, CanonicalValue::Null)
    }
}

// Hand-written so the `null` kind still carries an explicit `"value": null`
// on the wire, which the derived adjacently-tagged form would omit.
impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("CanonicalValue", 2)?;
        out.serialize_field("type", self.kind())?;
        match self {
            CanonicalValue::Null => out.serialize_field("value", &serde_json::Value::Null)?,
            CanonicalValue::Integer(v) => out.serialize_field("value", v)?,
            CanonicalValue::Float(v) => out.serialize_field("value", v)?,
            CanonicalValue::Boolean(v) => out.serialize_field("value", v)?,
            CanonicalValue::String(v)
            | CanonicalValue::Binary(v)
            | CanonicalValue::Timestamp(v)
            | CanonicalValue::Date(v)
            | CanonicalValue::Time(v)
            | CanonicalValue::DateTime(v)
            | CanonicalValue::Decimal(v) => out.serialize_field("value", v)?,
        }
        out.end()
    }
}
