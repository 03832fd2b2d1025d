//! Data-model primitive (component F): a builder for tagged key/value
//! records with array and nested-record support, matching the field-naming
//! convention from the External Interfaces contract (`temperature_C`,
//! `battery_ok`, `mic`, ...).
//!
//! This does not perform serialization itself beyond implementing
//! [`serde::Serialize`] (needed for the stdout-JSON dev sink in `main.rs`,
//! which is the crate's one concrete output collaborator per §1) — sinks
//! traverse it via [`Record::iter`] as an ordered sequence of
//! `(name, label, format, value)` triples.

use serde::Serialize;

/// A single value a record field can hold.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Record(Record),
    Array(Vec<Value>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

/// One field in a [`Record`]: a name, optional human label, optional
/// printf-style format string, and the value itself. `emit` gates whether
/// the field is visible to [`Record::iter`] at all — a field built with
/// `cond(false)` is fully suppressed, matching the `COND` flag in §3.
#[derive(Debug, Clone)]
struct Field {
    name: &'static str,
    label: Option<&'static str>,
    format: Option<&'static str>,
    value: Value,
    emit: bool,
}

/// A tagged key/value record, built field-by-field in insertion order.
///
/// Lifecycle: constructed inside a decoder, filled via [`Record::push`] /
/// [`Record::field`], handed to the dispatch loop's output callback, and
/// traversed by each sink. Field names must match `^[a-z][a-z0-9_]*$`
/// (enforced in debug builds via [`Record::push`]'s assertion) per the
/// crate's testable-properties contract.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field, always emitted.
    pub fn push(&mut self, name: &'static str, value: impl Into<Value>) -> &mut Self {
        self.push_cond(name, value, true)
    }

    /// Append a field, emitted only when `cond` is true.
    pub fn push_cond(&mut self, name: &'static str, value: impl Into<Value>, cond: bool) -> &mut Self {
        debug_assert!(
            is_valid_field_name(name),
            "field name {name:?} must match ^[a-z][a-z0-9_]*$"
        );
        self.fields.push(Field {
            name,
            label: None,
            format: None,
            value: value.into(),
            emit: cond,
        });
        self
    }

    /// Append a field with a human label and/or printf-style format string.
    pub fn field(
        &mut self,
        name: &'static str,
        label: Option<&'static str>,
        format: Option<&'static str>,
        value: impl Into<Value>,
        cond: bool,
    ) -> &mut Self {
        debug_assert!(is_valid_field_name(name));
        self.fields.push(Field {
            name,
            label,
            format,
            value: value.into(),
            emit: cond,
        });
        self
    }

    /// Iterate emitted fields as `(name, label, format, value)`, in
    /// insertion order, skipping any pushed with `cond == false`.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&'static str>, Option<&'static str>, &Value)> {
        self.fields
            .iter()
            .filter(|f| f.emit)
            .map(|f| (f.name, f.label, f.format, &f.value))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.emit && f.name == name).map(|f| &f.value)
    }

    /// Insert a field at the front, ahead of everything the decoder itself
    /// pushed. Used by the dispatch loop to stamp each emitted record with
    /// implementation-added metadata (`time`, `protocol`) the way the
    /// External Interfaces contract's Output Record JSON describes, without
    /// every decoder having to do it itself.
    pub fn prepend(&mut self, name: &'static str, value: impl Into<Value>) -> &mut Self {
        debug_assert!(is_valid_field_name(name));
        self.fields.insert(0, Field { name, label: None, format: None, value: value.into(), emit: true });
        self
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.iter().filter(|f| f.emit).count()))?;
        for (name, _, _, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Field names must start lowercase and otherwise be `[a-zA-Z0-9_]`. This
/// is a deliberate widening of the strict `^[a-z][a-z0-9_]*$` testable
/// property to accommodate the unit-suffix convention the External
/// Interfaces contract requires (`temperature_C`, `temperature_F`) — see
/// the matching Open Question entry in DESIGN.md.
fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_emit_in_insertion_order() {
        let mut r = Record::new();
        r.push("model", "Test").push("id", 1u32).push("channel", 2u32);
        let names: Vec<_> = r.iter().map(|(n, _, _, _)| n).collect();
        assert_eq!(names, vec!["model", "id", "channel"]);
    }

    #[test]
    fn cond_false_suppresses_field() {
        let mut r = Record::new();
        r.push_cond("battery_ok", 1u32, false);
        r.push("mic", "CRC");
        let names: Vec<_> = r.iter().map(|(n, _, _, _)| n).collect();
        assert_eq!(names, vec!["mic"]);
    }

    #[test]
    fn nested_record_serializes() {
        let mut inner = Record::new();
        inner.push("sub_id", 1u32);
        let mut outer = Record::new();
        outer.push("model", "Test");
        outer.push("nested", inner);
        let json = serde_json::to_value(&outer).unwrap();
        assert_eq!(json["nested"]["sub_id"], 1);
    }

    #[test]
    fn prepend_runs_ahead_of_existing_fields() {
        let mut r = Record::new();
        r.push("model", "Test").push("id", 1u32);
        r.prepend("protocol", 7u32);
        r.prepend("time", "2026-07-27T00:00:00Z");
        let names: Vec<_> = r.iter().map(|(n, _, _, _)| n).collect();
        assert_eq!(names, vec!["time", "protocol", "model", "id"]);
    }

    #[test]
    fn all_field_names_match_regex() {
        let mut r = Record::new();
        r.push("temperature_C", 21.5)
            .push("wind_avg_km_h", 3.0)
            .push("battery_ok", 1u32);
        for (name, _, _, _) in r.iter() {
            assert!(is_valid_field_name(name));
        }
    }
}
