//! Normalization for the BigQuery analytical service
//!
//! The REST API returns every cell as JSON alongside a schema-declared
//! field type, with scalars mostly string-encoded: integers and floats as
//! decimal strings, timestamps as fractional epoch seconds, bytes as
//! base64. [`normalize_cell`] maps a (field type, cell) pair into the
//! canonical model.

use base64::Engine as _;
use chrono::DateTime;
use portage_common::types::CanonicalValue;
use serde_json::Value;

/// Map one BigQuery result cell to its canonical kind.
///
/// Total: a cell whose field type is outside the mapping table, or whose
/// payload does not parse as that type claims, degrades to the `string`
/// kind carrying the cell's textual form. Never an error.
pub fn normalize_cell(field_type: &str, cell: &Value) -> CanonicalValue {
    if cell.is_null() {
        return CanonicalValue::Null;
    }
    match field_type {
        "INTEGER" | "INT64" => match cell_text(cell).parse::<i64>() {
            Ok(v) => CanonicalValue::Integer(v),
            Err(_) => fallback(cell),
        },
        "FLOAT" | "FLOAT64" => match cell_text(cell).parse::<f64>() {
            Ok(v) => CanonicalValue::Float(v),
            Err(_) => fallback(cell),
        },
        "BOOLEAN" | "BOOL" => match cell_text(cell).as_str() {
            "true" => CanonicalValue::Boolean(true),
            "false" => CanonicalValue::Boolean(false),
            _ => fallback(cell),
        },
        "STRING" => CanonicalValue::String(cell_text(cell)),
        "BYTES" => {
            let text = cell_text(cell);
            match base64::engine::general_purpose::STANDARD.decode(text.as_bytes()) {
                Ok(bytes) => CanonicalValue::Binary(String::from_utf8_lossy(&bytes).into_owned()),
                Err(_) => CanonicalValue::Binary(text),
            }
        },
        "TIMESTAMP" => match epoch_to_rfc3339(&cell_text(cell)) {
            Some(v) => CanonicalValue::Timestamp(v),
            None => fallback(cell),
        },
        "NUMERIC" | "BIGNUMERIC" => CanonicalValue::Decimal(cell_text(cell)),
        "DATE" => CanonicalValue::Date(cell_text(cell)),
        "TIME" => CanonicalValue::Time(cell_text(cell)),
        "DATETIME" => CanonicalValue::DateTime(cell_text(cell)),
        // Engine-specific types (GEOGRAPHY, JSON, STRUCT, ...) keep their
        // textual form.
        _ => fallback(cell),
    }
}

/// Textual payload of a cell. Scalars arrive as JSON strings; anything else
/// is rendered as compact JSON.
fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn fallback(cell: &Value) -> CanonicalValue {
    CanonicalValue::String(cell_text(cell))
}

/// Fractional epoch seconds ("1705581045.5" or "1.705581045E9") to an
/// RFC 3339 instant at UTC.
fn epoch_to_rfc3339(raw: &str) -> Option<String> {
    let seconds: f64 = raw.parse().ok()?;
    let secs = seconds.floor() as i64;
    let nanos = ((seconds - seconds.floor()) * 1e9).round() as u32;
    let instant = DateTime::from_timestamp(secs, nanos)?;
    Some(instant.fixed_offset().to_rfc3339())
}
