//! Display rows, sorting and filtering over the loaded records.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::{
    codec::{self, Lookups},
    model::{Field, Record, RecordData},
    schema::FieldSchema,
};

/// Sort key meaning "the records' own ordering".
pub const NATURAL_SORT_KEY: &str = "sort_order";

/// Accepted display values per column key.
pub type ColumnFilters = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SortSpec {
    pub key: String,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::natural()
    }
}

impl SortSpec {
    pub fn natural() -> Self {
        Self {
            key: NATURAL_SORT_KEY.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn by(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    pub fn is_natural(&self) -> bool {
        self.key == NATURAL_SORT_KEY
    }

    pub fn is_natural_ascending(&self) -> bool {
        self.is_natural() && self.direction == SortDirection::Asc
    }

    /// Next sort after a header click. The natural column only toggles
    /// direction; other columns go ascending, descending, then back to natural.
    pub fn cycle(&self, clicked: &str) -> SortSpec {
        if clicked == NATURAL_SORT_KEY {
            return if self.is_natural() {
                SortSpec::by(NATURAL_SORT_KEY, self.direction.flip())
            } else {
                SortSpec::natural()
            };
        }
        if self.key != clicked {
            return SortSpec::by(clicked, SortDirection::Asc);
        }
        match self.direction {
            SortDirection::Asc => SortSpec::by(clicked, SortDirection::Desc),
            SortDirection::Desc => SortSpec::natural(),
        }
    }
}

/// One record rendered for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub id: String,
    pub sort_order: i64,
    pub cells: HashMap<String, String>,
    pub data: RecordData,
}

impl DisplayRow {
    pub fn cell(&self, key: &str) -> &str {
        self.cells.get(key).map(String::as_str).unwrap_or("")
    }
}

pub fn build_row(record: &Record, schema: &FieldSchema, lookups: &Lookups) -> DisplayRow {
    let cells = schema
        .fields()
        .iter()
        .map(|field| {
            (
                field.key.clone(),
                codec::format(field, record.data.get(&field.key), lookups),
            )
        })
        .collect();
    DisplayRow {
        id: record.id.clone(),
        sort_order: record.sort_order,
        cells,
        data: record.data.clone(),
    }
}

pub fn build_rows(records: &[Record], schema: &FieldSchema, lookups: &Lookups) -> Vec<DisplayRow> {
    records
        .iter()
        .map(|record| build_row(record, schema, lookups))
        .collect()
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Orders defined values by `direction`; undefined values always go last.
fn compare_defined<T>(
    a: Option<T>,
    b: Option<T>,
    direction: SortDirection,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => cmp(&a, &b),
            SortDirection::Desc => cmp(&b, &a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare_rows(
    a: &DisplayRow,
    b: &DisplayRow,
    field: Option<&Field>,
    spec: &SortSpec,
) -> Ordering {
    if spec.is_natural() {
        return compare_defined(
            Some(a.sort_order),
            Some(b.sort_order),
            spec.direction,
            Ord::cmp,
        );
    }
    match field {
        Some(field) if field.field_type.is_numeric() => compare_defined(
            numeric(a.data.get(&field.key)),
            numeric(b.data.get(&field.key)),
            spec.direction,
            |x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal),
        ),
        _ => {
            let defined = |row: &DisplayRow| {
                let text = row.cell(&spec.key).trim().to_string();
                (!text.is_empty()).then_some(text)
            };
            compare_defined(defined(a), defined(b), spec.direction, |x, y| {
                compare_text(x, y)
            })
        }
    }
}

/// Stable sort by `spec`.
pub fn sort_rows(rows: &mut [DisplayRow], spec: &SortSpec, schema: &FieldSchema) {
    let field = schema.get(&spec.key);
    rows.sort_by(|a, b| compare_rows(a, b, field, spec));
}

/// AND across columns, OR within a column; an empty set accepts everything.
pub fn matches_filters(row: &DisplayRow, filters: &ColumnFilters) -> bool {
    filters
        .iter()
        .filter(|(_, accepted)| !accepted.is_empty())
        .all(|(key, accepted)| accepted.contains(row.cell(key)))
}

pub fn matches_search(row: &DisplayRow, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    row.cells
        .values()
        .any(|text| text.to_lowercase().contains(&needle))
}

pub fn has_active_filters(filters: &ColumnFilters) -> bool {
    filters.values().any(|accepted| !accepted.is_empty())
}

/// Filter, search, then sort.
pub fn visible_rows(
    rows: Vec<DisplayRow>,
    schema: &FieldSchema,
    spec: &SortSpec,
    filters: &ColumnFilters,
    search: &str,
) -> Vec<DisplayRow> {
    let mut rows: Vec<DisplayRow> = rows
        .into_iter()
        .filter(|row| matches_filters(row, filters) && matches_search(row, search))
        .collect();
    sort_rows(&mut rows, spec, schema);
    rows
}

/// Distinct non-empty display values of `key`, for a filter menu.
pub fn filter_options(rows: &[DisplayRow], key: &str) -> Vec<String> {
    let mut values: Vec<String> = rows
        .iter()
        .map(|row| row.cell(key))
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    values.sort_by(|a, b| compare_text(a, b));
    values
}
