//! Field schema for a category: key derivation, definition checks and record titles.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::{
    model::{Field, FieldInput, FieldType, RecordData},
    view::NATURAL_SORT_KEY,
    AppError, AppResult,
};

pub const UNTITLED: &str = "Untitled";
const FALLBACK_KEY: &str = "field";

static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static key pattern compiles"));

/// Lower-case, accent-free, underscore-separated identifier derived from a display name.
pub fn derive_field_key(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    let key = NON_ALNUM_RUN.replace_all(&folded, "_");
    let key = key.trim_matches('_');
    if key.is_empty() {
        FALLBACK_KEY.to_string()
    } else {
        key.to_string()
    }
}

/// Derive a key from `source` and suffix `_2`, `_3`, ... until it is neither in
/// `existing` nor the natural-order sort key.
pub fn unique_field_key<'a, I>(source: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken: HashSet<&str> = existing.into_iter().collect();
    taken.insert(NATURAL_SORT_KEY);
    let base = derive_field_key(source);
    if !taken.contains(base.as_str()) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or(base)
}

/// Trimmed, non-empty display name.
pub fn clean_name(name: &str, what: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::new(
            "VALIDATION/NAME_REQUIRED",
            format!("{what} name is required"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Check a field definition and clear attributes that do not apply to its type.
pub fn prepare_field_input(mut input: FieldInput) -> AppResult<FieldInput> {
    input.name = clean_name(&input.name, "Field")?;
    let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());

    match input.field_type {
        FieldType::Dropdown => {
            if blank(&input.dropdown_id) {
                return Err(AppError::new(
                    "VALIDATION/DROPDOWN_REQUIRED",
                    "Dropdown fields need a dropdown to pick from",
                )
                .with_context("field", input.name.clone()));
            }
            input.linked_category_id = None;
        }
        FieldType::RecordLink => {
            if blank(&input.linked_category_id) {
                return Err(AppError::new(
                    "VALIDATION/LINKED_CATEGORY_REQUIRED",
                    "Record link fields need a category to link to",
                )
                .with_context("field", input.name.clone()));
            }
            input.dropdown_id = None;
        }
        FieldType::Person => {
            input.dropdown_id = None;
            input.linked_category_id = None;
        }
        FieldType::Text
        | FieldType::LongText
        | FieldType::Number
        | FieldType::Currency
        | FieldType::Date
        | FieldType::DateRange
        | FieldType::Boolean => {
            input.dropdown_id = None;
            input.linked_category_id = None;
            input.is_multi = false;
        }
    }
    Ok(input)
}

/// Ordered field definitions of one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    fields: Vec<Field>,
}

impl FieldSchema {
    pub fn new(mut fields: Vec<Field>) -> Self {
        fields.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.key.as_str())
    }

    pub fn required(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.is_required)
    }

    /// First text field; its value names the record in lookups.
    pub fn title_field(&self) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.field_type == FieldType::Text)
    }

    pub fn title_of(&self, data: &RecordData) -> String {
        self.title_field()
            .and_then(|field| data.get(&field.key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNTITLED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(key: &str, field_type: FieldType, sort_order: i64) -> Field {
        Field {
            id: format!("id-{key}"),
            category_id: "cat".into(),
            name: key.into(),
            key: key.into(),
            field_type,
            is_required: false,
            is_multi: false,
            sort_order,
            dropdown_id: None,
            linked_category_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn keys_are_folded_and_underscored() {
        assert_eq!(derive_field_key("Renewal Date"), "renewal_date");
        assert_eq!(derive_field_key("  Café   Owner! "), "cafe_owner");
        assert_eq!(derive_field_key("Policy #"), "policy");
        assert_eq!(derive_field_key("--"), "field");
    }

    #[test]
    fn duplicate_keys_get_numeric_suffix() {
        let existing = ["item", "item_2"];
        assert_eq!(unique_field_key("Item", existing), "item_3");
        assert_eq!(unique_field_key("Expires", existing), "expires");
        assert_eq!(unique_field_key("Sort Order", []), "sort_order_2");
    }

    #[test]
    fn dropdown_field_requires_target_and_drops_link() {
        let input = FieldInput::new("Status", FieldType::Dropdown);
        let err = prepare_field_input(input).unwrap_err();
        assert_eq!(err.code(), "VALIDATION/DROPDOWN_REQUIRED");

        let input = FieldInput::new(" Status ", FieldType::Dropdown)
            .with_dropdown("dd")
            .with_linked_category("cat");
        let prepared = prepare_field_input(input).unwrap();
        assert_eq!(prepared.name, "Status");
        assert_eq!(prepared.linked_category_id, None);
    }

    #[test]
    fn scalar_fields_cannot_be_multi() {
        let input = FieldInput::new("Notes", FieldType::LongText).multi();
        assert!(!prepare_field_input(input).unwrap().is_multi);
    }

    #[test]
    fn blank_names_are_rejected() {
        let err = clean_name("   ", "Category").unwrap_err();
        assert_eq!(err.code(), "VALIDATION/NAME_REQUIRED");
    }

    #[test]
    fn schema_orders_fields_and_picks_title() {
        let schema = FieldSchema::new(vec![
            field("expires", FieldType::Date, 2),
            field("provider", FieldType::Text, 1),
            field("amount", FieldType::Number, 0),
        ]);
        let keys: Vec<&str> = schema.keys().collect();
        assert_eq!(keys, vec!["amount", "provider", "expires"]);

        let mut data = RecordData::new();
        assert_eq!(schema.title_of(&data), UNTITLED);
        data.insert("provider".into(), json!("Aviva"));
        assert_eq!(schema.title_of(&data), "Aviva");
    }
}
