use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::{AppError, AppResult};

/// Sparse attribute map of a record, keyed by field key.
pub type RecordData = Map<String, Value>;

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum FieldType {
    Text,
    LongText,
    Number,
    Currency,
    Date,
    DateRange,
    Dropdown,
    Person,
    RecordLink,
    Boolean,
}

impl FieldType {
    pub const ALL: [FieldType; 10] = [
        FieldType::Text,
        FieldType::LongText,
        FieldType::Number,
        FieldType::Currency,
        FieldType::Date,
        FieldType::DateRange,
        FieldType::Dropdown,
        FieldType::Person,
        FieldType::RecordLink,
        FieldType::Boolean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::LongText => "long_text",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Date => "date",
            FieldType::DateRange => "date_range",
            FieldType::Dropdown => "dropdown",
            FieldType::Person => "person",
            FieldType::RecordLink => "record_link",
            FieldType::Boolean => "boolean",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == raw)
            .ok_or_else(|| {
                AppError::new("FIELD/DECODE", "Unknown field type")
                    .with_context("field_type", raw.to_string())
            })
    }

    /// Columns of these types sort numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Currency)
    }

    /// Types whose values are foreign Ids resolved through a lookup.
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            FieldType::Dropdown | FieldType::Person | FieldType::RecordLink
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    #[ts(type = "number")]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Field {
    pub id: String,
    pub category_id: String,
    /// Display label.
    pub name: String,
    /// Stable attribute identifier used as the record data key.
    pub key: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub is_multi: bool,
    #[ts(type = "number")]
    pub sort_order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub dropdown_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub linked_category_id: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Dropdown {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DropdownOption {
    pub id: String,
    pub dropdown_id: String,
    pub label: String,
    pub value: String,
    #[ts(type = "number")]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/", rename = "CategoryRecord")]
pub struct Record {
    pub id: String,
    pub category_id: String,
    #[ts(type = "number")]
    pub sort_order: i64,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub data: RecordData,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

/// Cross-category lookup entry used by record-link columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RecordTitle {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    #[ts(optional)]
    pub description: Option<String>,
    /// `None` appends on create and keeps the current position on update.
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub sort_order: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl CategoryInput {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            sort_order: None,
            is_active: true,
        }
    }
}

impl From<&Category> for CategoryInput {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            description: category.description.clone(),
            sort_order: Some(category.sort_order),
            is_active: category.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FieldInput {
    pub name: String,
    /// Only honoured on create; derived from `name` when absent.
    #[serde(default)]
    #[ts(optional)]
    pub key: Option<String>,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_multi: bool,
    #[serde(default)]
    #[ts(optional)]
    pub dropdown_id: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub linked_category_id: Option<String>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub sort_order: Option<i64>,
}

impl FieldInput {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            key: None,
            field_type,
            is_required: false,
            is_multi: false,
            dropdown_id: None,
            linked_category_id: None,
            sort_order: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn multi(mut self) -> Self {
        self.is_multi = true;
        self
    }

    pub fn with_dropdown(mut self, dropdown_id: impl Into<String>) -> Self {
        self.dropdown_id = Some(dropdown_id.into());
        self
    }

    pub fn with_linked_category(mut self, category_id: impl Into<String>) -> Self {
        self.linked_category_id = Some(category_id.into());
        self
    }
}

impl From<&Field> for FieldInput {
    fn from(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            key: Some(field.key.clone()),
            field_type: field.field_type,
            is_required: field.is_required,
            is_multi: field.is_multi,
            dropdown_id: field.dropdown_id.clone(),
            linked_category_id: field.linked_category_id.clone(),
            sort_order: Some(field.sort_order),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DropdownInput {
    pub name: String,
    #[serde(default)]
    #[ts(optional)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OptionInput {
    pub label: String,
    /// Defaults to the label when absent.
    #[serde(default)]
    #[ts(optional)]
    pub value: Option<String>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub sort_order: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl OptionInput {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
            sort_order: None,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PersonInput {
    pub name: String,
    #[serde(default)]
    #[ts(optional)]
    pub user_id: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub notes: Option<String>,
}
