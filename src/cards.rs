//! Mobile surface: records as cards with an add/edit form per card.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    codec::{self, Lookups, RawValue},
    confirm::Confirm,
    model::{Field, Record, RecordData},
    records::{Deletion, VALIDATION_REQUIRED, VALIDATION_UNKNOWN_FIELD},
    remote::RemoteStore,
    schema::FieldSchema,
    session::CategorySession,
    status::SavingFlag,
    AppError, AppResult, LOG_TARGET,
};

pub const VALIDATION_NOTHING_TO_SAVE: &str = "VALIDATION/NOTHING_TO_SAVE";
pub const VALIDATION_INVALID_INPUT: &str = "VALIDATION/INVALID_INPUT";
pub const VALIDATION_NO_CARD: &str = "VALIDATION/NO_CARD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardMode {
    Add,
    Edit { record_id: String },
}

/// Form state of one open card.
#[derive(Debug, Clone)]
pub struct Card {
    mode: CardMode,
    baseline: RecordData,
    working: RecordData,
    errors: BTreeMap<String, AppError>,
}

impl Card {
    pub fn add() -> Self {
        Self {
            mode: CardMode::Add,
            baseline: RecordData::new(),
            working: RecordData::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn edit(record: &Record) -> Self {
        Self {
            mode: CardMode::Edit {
                record_id: record.id.clone(),
            },
            baseline: record.data.clone(),
            working: record.data.clone(),
            errors: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> &CardMode {
        &self.mode
    }

    pub fn record_id(&self) -> Option<&str> {
        match &self.mode {
            CardMode::Add => None,
            CardMode::Edit { record_id } => Some(record_id),
        }
    }

    pub fn working(&self) -> &RecordData {
        &self.working
    }

    pub fn baseline(&self) -> &RecordData {
        &self.baseline
    }

    pub fn error(&self, key: &str) -> Option<&AppError> {
        self.errors.get(key)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Normalize an input into the working data. A failure is kept on the card
    /// and leaves the previous working value in place.
    pub fn set_field(&mut self, field: &Field, raw: &RawValue, lookups: &Lookups) -> AppResult<()> {
        match codec::normalize(field, raw, lookups) {
            Ok(value) => {
                codec::apply_value(&mut self.working, &field.key, value);
                self.errors.remove(&field.key);
                Ok(())
            }
            Err(err) => {
                self.errors.insert(field.key.clone(), err.clone());
                Err(err)
            }
        }
    }

    /// True when any field differs materially from the last saved state.
    pub fn is_dirty(&self, schema: &FieldSchema) -> bool {
        schema.fields().iter().any(|field| {
            !codec::values_equal(
                field.field_type,
                self.baseline.get(&field.key),
                self.working.get(&field.key),
            )
        })
    }

    pub fn missing(&self, schema: &FieldSchema) -> Vec<String> {
        codec::missing_required(schema.fields(), &self.working)
            .into_iter()
            .map(|field| field.key.clone())
            .collect()
    }

    pub fn can_save(&self, schema: &FieldSchema) -> bool {
        !self.has_errors() && self.is_dirty(schema) && self.missing(schema).is_empty()
    }

    /// Why Save is disabled, if it is.
    pub fn save_blocker(&self, schema: &FieldSchema) -> Option<AppError> {
        if let Some((key, _)) = self.errors.iter().next() {
            return Some(
                AppError::new(VALIDATION_INVALID_INPUT, "Fix the highlighted fields first")
                    .with_context("key", key.clone()),
            );
        }
        let missing = self.missing(schema);
        if !missing.is_empty() {
            return Some(
                AppError::new(VALIDATION_REQUIRED, "Fill in the required fields")
                    .with_context("fields", missing.join(",")),
            );
        }
        if !self.is_dirty(schema) {
            return Some(AppError::new(VALIDATION_NOTHING_TO_SAVE, "No changes to save"));
        }
        None
    }

    /// Adopt the saved record as the new baseline.
    pub fn rebase(&mut self, record: &Record) {
        self.mode = CardMode::Edit {
            record_id: record.id.clone(),
        };
        self.baseline = record.data.clone();
        self.working = record.data.clone();
        self.errors.clear();
    }
}

/// A record rendered for the card list.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordCard {
    pub id: String,
    pub title: String,
    /// `(field name, display text)` for every non-empty value, in schema order.
    pub lines: Vec<(String, String)>,
}

pub struct CardSurface {
    session: CategorySession,
    open: Option<Card>,
}

impl CardSurface {
    pub async fn open(
        remote: Arc<dyn RemoteStore>,
        category_id: &str,
        saving: SavingFlag,
    ) -> AppResult<Self> {
        let session = CategorySession::open(remote, category_id, saving).await?;
        Ok(Self::from_session(session))
    }

    pub fn from_session(session: CategorySession) -> Self {
        Self {
            session,
            open: None,
        }
    }

    pub fn session(&self) -> &CategorySession {
        &self.session
    }

    pub fn cards(&self) -> Vec<RecordCard> {
        let schema = self.session.schema();
        self.session
            .records()
            .records()
            .iter()
            .map(|record| RecordCard {
                id: record.id.clone(),
                title: schema.title_of(&record.data),
                lines: schema
                    .fields()
                    .iter()
                    .map(|field| {
                        (
                            field.name.clone(),
                            codec::format(field, record.data.get(&field.key), self.session.lookups()),
                        )
                    })
                    .filter(|(_, text)| !text.is_empty())
                    .collect(),
            })
            .collect()
    }

    pub fn card(&self) -> Option<&Card> {
        self.open.as_ref()
    }

    pub fn begin_add(&mut self) {
        self.open = Some(Card::add());
    }

    pub fn begin_edit(&mut self, record_id: &str) -> AppResult<()> {
        let record = self.session.records().record(record_id).ok_or_else(|| {
            AppError::new("RECORDS/NOT_FOUND", "Record not found")
                .with_context("id", record_id.to_string())
        })?;
        self.open = Some(Card::edit(record));
        Ok(())
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    fn open_card(&mut self) -> AppResult<&mut Card> {
        self.open
            .as_mut()
            .ok_or_else(|| AppError::new(VALIDATION_NO_CARD, "No card is open"))
    }

    pub fn set_field(&mut self, key: &str, raw: impl Into<RawValue>) -> AppResult<()> {
        let raw = raw.into();
        let field = self.session.field(key).cloned().ok_or_else(|| {
            AppError::new(VALIDATION_UNKNOWN_FIELD, "This field no longer exists")
                .with_context("key", key.to_string())
        })?;
        let lookups = self.session.lookups().clone();
        self.open_card()?.set_field(&field, &raw, &lookups)
    }

    /// Display text of the open card's working value for `key`.
    pub fn display(&self, key: &str) -> String {
        match (self.open.as_ref(), self.session.field(key)) {
            (Some(card), Some(field)) => {
                codec::format(field, card.working.get(key), self.session.lookups())
            }
            _ => String::new(),
        }
    }

    pub fn choices(&self, key: &str) -> Vec<(String, String)> {
        self.session.choices(key)
    }

    pub fn can_save(&self) -> bool {
        self.open
            .as_ref()
            .map_or(false, |card| card.can_save(self.session.schema()))
    }

    /// Create or update from the open card, then rebase it on the saved record.
    pub async fn save(&mut self) -> AppResult<Record> {
        let card = self
            .open
            .as_ref()
            .ok_or_else(|| AppError::new(VALIDATION_NO_CARD, "No card is open"))?;
        if let Some(blocker) = card.save_blocker(self.session.schema()) {
            debug!(target: LOG_TARGET, event = "card_save_blocked", code = %blocker.code());
            return Err(blocker);
        }
        let data = card.working.clone();
        let saved = match card.record_id().map(str::to_string) {
            None => self.session.records_mut().create_record(data).await?,
            Some(record_id) => {
                self.session
                    .records_mut()
                    .update_record_data(&record_id, data)
                    .await?
            }
        };
        if let Some(card) = self.open.as_mut() {
            card.rebase(&saved);
        }
        Ok(saved)
    }

    pub async fn delete_open(&mut self, confirm: &dyn Confirm) -> AppResult<Deletion> {
        let record_id = self
            .open
            .as_ref()
            .and_then(Card::record_id)
            .map(str::to_string)
            .ok_or_else(|| AppError::new(VALIDATION_NO_CARD, "No saved card is open"))?;
        let outcome = self
            .session
            .records_mut()
            .delete_records(&[record_id], confirm)
            .await?;
        if outcome != Deletion::Cancelled {
            self.open = None;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;
    use serde_json::json;

    fn field(key: &str, field_type: FieldType, required: bool, sort_order: i64) -> Field {
        Field {
            id: key.into(),
            category_id: "c".into(),
            name: key.into(),
            key: key.into(),
            field_type,
            is_required: required,
            is_multi: false,
            sort_order,
            dropdown_id: None,
            linked_category_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            field("item", FieldType::Text, true, 0),
            field("cost", FieldType::Currency, false, 1),
        ])
    }

    fn saved() -> Record {
        Record {
            id: "r1".into(),
            category_id: "c".into(),
            sort_order: 0,
            data: json!({ "item": "Kettle", "cost": 30 })
                .as_object()
                .cloned()
                .unwrap(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn equivalent_edits_do_not_enable_save() {
        let schema = schema();
        let lookups = Lookups::default();
        let mut card = Card::edit(&saved());
        assert!(!card.can_save(&schema));

        card.set_field(&schema.fields()[1], &RawValue::from("30.0"), &lookups)
            .unwrap();
        assert!(!card.is_dirty(&schema));

        card.set_field(&schema.fields()[1], &RawValue::from("$31"), &lookups)
            .unwrap();
        assert!(card.can_save(&schema));
    }

    #[test]
    fn invalid_input_blocks_save_until_fixed() {
        let schema = schema();
        let lookups = Lookups::default();
        let mut card = Card::edit(&saved());
        card.set_field(&schema.fields()[0], &RawValue::from("Toaster"), &lookups)
            .unwrap();
        assert!(card
            .set_field(&schema.fields()[1], &RawValue::from("lots"), &lookups)
            .is_err());
        assert_eq!(card.working().get("cost"), Some(&json!(30)));
        assert_eq!(
            card.save_blocker(&schema).map(|e| e.code().to_string()),
            Some(VALIDATION_INVALID_INPUT.to_string())
        );
        card.set_field(&schema.fields()[1], &RawValue::Empty, &lookups)
            .unwrap();
        assert!(card.can_save(&schema));
    }

    #[test]
    fn add_card_needs_required_fields() {
        let schema = schema();
        let lookups = Lookups::default();
        let mut card = Card::add();
        card.set_field(&schema.fields()[1], &RawValue::from("12"), &lookups)
            .unwrap();
        let blocker = card.save_blocker(&schema).unwrap();
        assert_eq!(blocker.code(), VALIDATION_REQUIRED);

        card.set_field(&schema.fields()[0], &RawValue::from("Drill"), &lookups)
            .unwrap();
        assert!(card.can_save(&schema));

        card.rebase(&saved());
        assert_eq!(card.record_id(), Some("r1"));
        assert!(!card.is_dirty(&schema));
    }
}
