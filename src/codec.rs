//! Conversion between raw cell edits, canonical stored values, and display text.
//!
//! Every function here is pure and dispatches on [`FieldType`] with an
//! exhaustive match, so a new field type cannot be added without deciding how
//! it normalizes, formats, and counts as missing.

use std::collections::HashMap;

use serde_json::{json, Map, Number, Value};

use crate::{
    model::{Field, FieldType, RecordData},
    AppError, AppResult,
};

pub const CODEC_INVALID_NUMBER: &str = "CODEC/INVALID_NUMBER";
pub const CODEC_INVALID_BOOLEAN: &str = "CODEC/INVALID_BOOLEAN";
pub const CODEC_UNRESOLVED_LABEL: &str = "CODEC/UNRESOLVED_LABEL";
pub const CODEC_AMBIGUOUS_LABEL: &str = "CODEC/AMBIGUOUS_LABEL";
pub const CODEC_LOOKUP_MISSING: &str = "CODEC/LOOKUP_MISSING";

pub const DATE_RANGE_START: &str = "StartDate";
pub const DATE_RANGE_END: &str = "EndDate";
/// Display word for an open-ended date range.
pub const OPEN_RANGE_END: &str = "Current";

const RANGE_SEPARATORS: &[&str] = &[" to ", " - "];
const CURRENCY_SYMBOLS: &[char] = &['$', '£', '€', '¥'];
const TRUE_WORDS: &[&str] = &["yes", "true", "1", "y", "on"];
const FALSE_WORDS: &[&str] = &["no", "false", "0", "n", "off"];
/// Largest magnitude stored as an integer rather than a float.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A value as it arrives from an editor, before type rules are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Range {
        start: Option<String>,
        end: Option<String>,
    },
    List(Vec<String>),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(value: Vec<String>) -> Self {
        RawValue::List(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelMatch {
    Unique(String),
    Ambiguous,
}

#[derive(Debug)]
enum Resolution {
    Unresolved(String),
    Ambiguous(String),
}

/// Id ⇄ label table for one relational target (a dropdown, the people list,
/// or the records of a linked category).
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: Vec<(String, String)>,
    labels: HashMap<String, String>,
    by_label: HashMap<String, LabelMatch>,
}

impl LookupTable {
    pub fn from_entries<I, K, L>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: Into<String>,
    {
        let mut table = LookupTable::default();
        for (id, label) in entries {
            let id = id.into();
            let label = label.into();
            let folded = label.trim().to_lowercase();
            table
                .by_label
                .entry(folded)
                .and_modify(|existing| {
                    if *existing != LabelMatch::Unique(id.clone()) {
                        *existing = LabelMatch::Ambiguous;
                    }
                })
                .or_insert_with(|| LabelMatch::Unique(id.clone()));
            table.labels.insert(id.clone(), label.clone());
            table.entries.push((id, label));
        }
        table
    }

    /// Add entries that still display but never take a label from a live
    /// entry or make it ambiguous.
    pub fn with_retired<I, K, L>(mut self, retired: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: Into<String>,
    {
        for (id, label) in retired {
            let id = id.into();
            let label = label.into();
            self.by_label
                .entry(label.trim().to_lowercase())
                .or_insert_with(|| LabelMatch::Unique(id.clone()));
            self.labels.insert(id.clone(), label.clone());
            self.entries.push((id, label));
        }
        self
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// Ordered `(id, label)` pairs, as supplied.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve(&self, token: &str) -> Result<String, Resolution> {
        if self.labels.contains_key(token) {
            return Ok(token.to_string());
        }
        match self.by_label.get(&token.to_lowercase()) {
            Some(LabelMatch::Unique(id)) => Ok(id.clone()),
            Some(LabelMatch::Ambiguous) => Err(Resolution::Ambiguous(token.to_string())),
            None => Err(Resolution::Unresolved(token.to_string())),
        }
    }
}

/// Lookup tables for every relational target a schema can reference.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    dropdowns: HashMap<String, LookupTable>,
    people: LookupTable,
    records: HashMap<String, LookupTable>,
}

impl Lookups {
    pub fn set_dropdown(&mut self, dropdown_id: impl Into<String>, table: LookupTable) {
        self.dropdowns.insert(dropdown_id.into(), table);
    }

    pub fn set_people(&mut self, table: LookupTable) {
        self.people = table;
    }

    pub fn set_records(&mut self, category_id: impl Into<String>, table: LookupTable) {
        self.records.insert(category_id.into(), table);
    }

    pub fn table_for(&self, field: &Field) -> Option<&LookupTable> {
        match field.field_type {
            FieldType::Dropdown => field
                .dropdown_id
                .as_deref()
                .and_then(|id| self.dropdowns.get(id)),
            FieldType::Person => Some(&self.people),
            FieldType::RecordLink => field
                .linked_category_id
                .as_deref()
                .and_then(|id| self.records.get(id)),
            FieldType::Text
            | FieldType::LongText
            | FieldType::Number
            | FieldType::Currency
            | FieldType::Date
            | FieldType::DateRange
            | FieldType::Boolean => None,
        }
    }
}

/// Render a stored value as display text.
pub fn format(field: &Field, value: Option<&Value>, lookups: &Lookups) -> String {
    let value = match value {
        None | Some(Value::Null) => return String::new(),
        Some(value) => value,
    };

    match field.field_type {
        FieldType::Text | FieldType::LongText | FieldType::Date => plain_text(value),
        FieldType::Number | FieldType::Currency => match value {
            Value::Number(number) => format_number(number),
            other => plain_text(other),
        },
        FieldType::Boolean => match value {
            Value::Bool(true) => "Yes".to_string(),
            Value::Bool(false) => "No".to_string(),
            other => plain_text(other),
        },
        FieldType::DateRange => match value {
            Value::Object(map) => {
                let start = range_side(map, DATE_RANGE_START);
                let end = range_side(map, DATE_RANGE_END);
                match (start, end) {
                    (Some(start), Some(end)) => format!("{start} to {end}"),
                    (Some(start), None) => format!("{start} to {OPEN_RANGE_END}"),
                    (None, Some(end)) => end.to_string(),
                    (None, None) => String::new(),
                }
            }
            other => plain_text(other),
        },
        FieldType::Dropdown | FieldType::Person | FieldType::RecordLink => {
            let table = lookups.table_for(field);
            let resolve = |id: &Value| {
                let id = plain_text(id);
                table
                    .and_then(|table| table.label(&id))
                    .map(str::to_string)
                    .unwrap_or(id)
            };
            match value {
                Value::Array(items) => items.iter().map(resolve).collect::<Vec<_>>().join(", "),
                other => resolve(other),
            }
        }
    }
}

/// Convert a raw edit into the canonical stored value. `Ok(None)` means the
/// field is empty and its key must be absent from the record data.
pub fn normalize(field: &Field, raw: &RawValue, lookups: &Lookups) -> AppResult<Option<Value>> {
    if matches!(raw, RawValue::Empty) {
        return Ok(None);
    }

    match field.field_type {
        FieldType::Text | FieldType::LongText => Ok(raw_text(raw)
            .filter(|text| !text.trim().is_empty())
            .map(Value::String)),
        FieldType::Date => Ok(raw_text(raw)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .map(Value::String)),
        FieldType::Number | FieldType::Currency => normalize_number(field, raw),
        FieldType::Boolean => normalize_boolean(field, raw),
        FieldType::DateRange => Ok(normalize_date_range(raw)),
        FieldType::Dropdown | FieldType::Person | FieldType::RecordLink => {
            normalize_relational(field, raw, lookups)
        }
    }
}

/// True when a required field would be considered unset.
pub fn is_missing_required(field: &Field, value: Option<&Value>) -> bool {
    match field.field_type {
        FieldType::DateRange => match value {
            Some(Value::Object(map)) => range_side(map, DATE_RANGE_START).is_none(),
            Some(Value::String(text)) => text.trim().is_empty(),
            _ => true,
        },
        FieldType::Text
        | FieldType::LongText
        | FieldType::Number
        | FieldType::Currency
        | FieldType::Date
        | FieldType::Dropdown
        | FieldType::Person
        | FieldType::RecordLink
        | FieldType::Boolean => is_empty_value(value),
    }
}

/// Required fields of `fields` that `data` does not satisfy, in schema order.
pub fn missing_required<'a>(fields: &'a [Field], data: &RecordData) -> Vec<&'a Field> {
    fields
        .iter()
        .filter(|field| field.is_required && is_missing_required(field, data.get(&field.key)))
        .collect()
}

/// Write a normalized value into `data`, removing the key when the value is empty.
pub fn apply_value(data: &mut RecordData, key: &str, value: Option<Value>) {
    match value {
        Some(value) if !is_empty_value(Some(&value)) => {
            data.insert(key.to_string(), value);
        }
        _ => {
            data.remove(key);
        }
    }
}

/// Drop every key whose value is empty.
pub fn prune_empty(data: &mut RecordData) {
    data.retain(|_, value| !is_empty_value(Some(value)));
}

/// Type-aware comparison used to decide whether an edit is a material change.
pub fn values_equal(field_type: FieldType, a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.filter(|value| !is_empty_value(Some(value)));
    let b = b.filter(|value| !is_empty_value(Some(value)));
    let (a, b) = match (a, b) {
        (None, None) => return true,
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };

    match field_type {
        FieldType::Number | FieldType::Currency => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => plain_text(a) == plain_text(b),
        },
        FieldType::Text | FieldType::LongText | FieldType::Date => {
            plain_text(a).trim() == plain_text(b).trim()
        }
        FieldType::Boolean => a.as_bool() == b.as_bool(),
        FieldType::DateRange => match (a, b) {
            (Value::Object(x), Value::Object(y)) => {
                range_side(x, DATE_RANGE_START) == range_side(y, DATE_RANGE_START)
                    && range_side(x, DATE_RANGE_END) == range_side(y, DATE_RANGE_END)
            }
            _ => a == b,
        },
        FieldType::Dropdown | FieldType::Person | FieldType::RecordLink => {
            id_list(a) == id_list(b)
        }
    }
}

fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => {
            range_side(map, DATE_RANGE_START).is_none() && range_side(map, DATE_RANGE_END).is_none()
        }
        Some(_) => false,
    }
}

fn range_side<'a>(map: &'a Map<String, Value>, side: &str) -> Option<&'a str> {
    map.get(side)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(number) => format_number(number),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

fn format_number(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER => {
            (float as i64).to_string()
        }
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}

fn number_value(float: f64) -> Option<Value> {
    if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER {
        Some(Value::from(float as i64))
    } else {
        Number::from_f64(float).map(Value::Number)
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn id_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(plain_text).collect(),
        other => vec![plain_text(other)],
    }
}

fn raw_text(raw: &RawValue) -> Option<String> {
    match raw {
        RawValue::Empty => None,
        RawValue::Text(text) => Some(text.clone()),
        RawValue::Number(number) => Some(match number_value(*number) {
            Some(Value::Number(n)) => format_number(&n),
            _ => number.to_string(),
        }),
        RawValue::Bool(flag) => Some(if *flag { "Yes" } else { "No" }.to_string()),
        RawValue::Range { start, end } => {
            let start = start.as_deref().unwrap_or("").trim();
            let end = end.as_deref().unwrap_or("").trim();
            match (start.is_empty(), end.is_empty()) {
                (true, true) => None,
                (false, true) => Some(start.to_string()),
                (true, false) => Some(end.to_string()),
                (false, false) => Some(format!("{start} to {end}")),
            }
        }
        RawValue::List(items) => Some(items.join(", ")),
    }
}

fn invalid(code: &str, message: String, field: &Field, input: &str) -> AppError {
    AppError::new(code, message)
        .with_context("field", field.key.clone())
        .with_context("input", input.to_string())
}

fn normalize_number(field: &Field, raw: &RawValue) -> AppResult<Option<Value>> {
    let parsed = match raw {
        RawValue::Number(number) => *number,
        other => {
            let text = match raw_text(other) {
                Some(text) => text,
                None => return Ok(None),
            };
            let mut cleaned = text.trim().to_string();
            if cleaned.is_empty() {
                return Ok(None);
            }
            if field.field_type == FieldType::Currency {
                cleaned = cleaned
                    .chars()
                    .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
                    .collect();
            }
            cleaned.parse::<f64>().map_err(|_| {
                invalid(
                    CODEC_INVALID_NUMBER,
                    format!("\"{}\" is not a number for {}", text.trim(), field.name),
                    field,
                    &text,
                )
            })?
        }
    };

    if !parsed.is_finite() {
        return Err(invalid(
            CODEC_INVALID_NUMBER,
            format!("{} must be a finite number", field.name),
            field,
            &parsed.to_string(),
        ));
    }
    Ok(number_value(parsed))
}

fn normalize_boolean(field: &Field, raw: &RawValue) -> AppResult<Option<Value>> {
    match raw {
        RawValue::Bool(flag) => Ok(Some(Value::Bool(*flag))),
        RawValue::Number(number) => Ok(Some(Value::Bool(*number != 0.0))),
        other => {
            let text = match raw_text(other) {
                Some(text) => text,
                None => return Ok(None),
            };
            let folded = text.trim().to_lowercase();
            if folded.is_empty() {
                Ok(None)
            } else if TRUE_WORDS.contains(&folded.as_str()) {
                Ok(Some(Value::Bool(true)))
            } else if FALSE_WORDS.contains(&folded.as_str()) {
                Ok(Some(Value::Bool(false)))
            } else {
                Err(invalid(
                    CODEC_INVALID_BOOLEAN,
                    format!("\"{}\" is not Yes or No for {}", text.trim(), field.name),
                    field,
                    &text,
                ))
            }
        }
    }
}

fn clean_range_side(side: Option<&str>) -> Option<String> {
    side.map(str::trim)
        .filter(|text| !text.is_empty() && !text.eq_ignore_ascii_case(OPEN_RANGE_END))
        .map(str::to_string)
}

fn split_range(text: &str) -> (Option<String>, Option<String>) {
    for separator in RANGE_SEPARATORS {
        if let Some((start, end)) = text.split_once(separator) {
            return (clean_range_side(Some(start)), clean_range_side(Some(end)));
        }
    }
    (clean_range_side(Some(text)), None)
}

fn normalize_date_range(raw: &RawValue) -> Option<Value> {
    let (start, end) = match raw {
        RawValue::Range { start, end } => (
            clean_range_side(start.as_deref()),
            clean_range_side(end.as_deref()),
        ),
        other => match raw_text(other) {
            Some(text) => split_range(&text),
            None => (None, None),
        },
    };

    if start.is_none() && end.is_none() {
        return None;
    }
    Some(json!({
        DATE_RANGE_START: start,
        DATE_RANGE_END: end,
    }))
}

fn relational_tokens(raw: &RawValue) -> Vec<String> {
    let tokens: Vec<String> = match raw {
        RawValue::List(items) => items.clone(),
        RawValue::Text(text) => text.split(',').map(str::to_string).collect(),
        other => raw_text(other).into_iter().collect(),
    };
    tokens
        .into_iter()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

fn normalize_relational(
    field: &Field,
    raw: &RawValue,
    lookups: &Lookups,
) -> AppResult<Option<Value>> {
    let tokens = relational_tokens(raw);
    if tokens.is_empty() {
        return Ok(None);
    }

    let table = lookups.table_for(field).ok_or_else(|| {
        AppError::new(
            CODEC_LOOKUP_MISSING,
            format!("No choices are available for {}", field.name),
        )
        .with_context("field", field.key.clone())
    })?;

    let mut resolved = Vec::with_capacity(tokens.len());
    let mut unresolved = Vec::new();
    let mut ambiguous = Vec::new();
    for token in &tokens {
        match table.resolve(token) {
            Ok(id) => resolved.push(id),
            Err(Resolution::Unresolved(token)) => unresolved.push(token),
            Err(Resolution::Ambiguous(token)) => ambiguous.push(token),
        }
    }

    if !unresolved.is_empty() {
        return Err(AppError::new(
            CODEC_UNRESOLVED_LABEL,
            format!(
                "{} has no choice named {}",
                field.name,
                quoted_list(&unresolved)
            ),
        )
        .with_context("field", field.key.clone())
        .with_context("unresolved", unresolved.join(",")));
    }
    if !ambiguous.is_empty() {
        return Err(AppError::new(
            CODEC_AMBIGUOUS_LABEL,
            format!(
                "More than one {} choice is named {}; pick it by Id",
                field.name,
                quoted_list(&ambiguous)
            ),
        )
        .with_context("field", field.key.clone())
        .with_context("ambiguous", ambiguous.join(",")));
    }

    if field.is_multi {
        Ok(Some(Value::Array(
            resolved.into_iter().map(Value::String).collect(),
        )))
    } else {
        Ok(resolved.into_iter().next().map(Value::String))
    }
}

fn quoted_list(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
