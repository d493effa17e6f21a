//! Records of the active category, plus the in-place draft row.

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::{
    codec::{self, Lookups, RawValue},
    confirm::{delete_records_prompt, Confirm},
    model::{Field, Record, RecordData},
    remote::RemoteStore,
    schema::FieldSchema,
    status::{ActionKind, LoadTicket, LoadTickets, RemoteCall, SavingFlag, StatusBoard},
    AppError, AppResult, LOG_TARGET,
};

pub const VALIDATION_REQUIRED: &str = "VALIDATION/REQUIRED";
pub const VALIDATION_UNKNOWN_FIELD: &str = "VALIDATION/UNKNOWN_FIELD";
pub const VALIDATION_NO_DRAFT: &str = "VALIDATION/NO_DRAFT";

/// The single unsaved row a surface may hold.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RowState {
    #[default]
    None,
    Draft(RecordData),
}

impl RowState {
    pub fn is_draft(&self) -> bool {
        matches!(self, RowState::Draft(_))
    }

    pub fn data(&self) -> Option<&RecordData> {
        match self {
            RowState::None => None,
            RowState::Draft(data) => Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftOutcome {
    /// Still waiting on these field keys.
    Pending { missing: Vec<String> },
    Created(Record),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Cancelled,
    Deleted(usize),
}

fn required_error(missing: &[&Field]) -> AppError {
    let names: Vec<&str> = missing.iter().map(|f| f.name.as_str()).collect();
    AppError::new(
        VALIDATION_REQUIRED,
        format!("Fill in the required fields: {}", names.join(", ")),
    )
    .with_context("fields", names.join(","))
}

fn not_cached(id: &str) -> AppError {
    AppError::new("RECORDS/NOT_FOUND", "Record not found").with_context("id", id.to_string())
}

pub struct RecordStore {
    remote: Arc<dyn RemoteStore>,
    category_id: String,
    schema: FieldSchema,
    records: Vec<Record>,
    draft: RowState,
    tickets: LoadTickets,
    saving: SavingFlag,
    status: StatusBoard,
}

impl RecordStore {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        category_id: impl Into<String>,
        schema: FieldSchema,
        saving: SavingFlag,
    ) -> Self {
        Self {
            remote,
            category_id: category_id.into(),
            schema,
            records: Vec::new(),
            draft: RowState::None,
            tickets: LoadTickets::default(),
            saving,
            status: StatusBoard::default(),
        }
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn set_schema(&mut self, schema: FieldSchema) {
        self.schema = schema;
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn draft(&self) -> &RowState {
        &self.draft
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn saving(&self) -> &SavingFlag {
        &self.saving
    }

    pub fn begin_load(&self) -> LoadTicket {
        self.tickets.issue()
    }

    /// Apply a load response unless a newer load was issued. Returns whether it applied.
    pub fn apply_load(&mut self, ticket: LoadTicket, result: AppResult<Vec<Record>>) -> bool {
        if !self.tickets.is_current(ticket) {
            debug!(
                target: LOG_TARGET,
                event = "records_load_stale",
                category_id = %self.category_id,
                ticket = ?ticket
            );
            return false;
        }
        match result {
            Ok(mut records) => {
                records.sort_by(|a, b| {
                    a.sort_order
                        .cmp(&b.sort_order)
                        .then_with(|| a.created_at.cmp(&b.created_at))
                });
                self.records = records;
                self.status.succeed(ActionKind::Load);
            }
            Err(err) => self.status.fail(ActionKind::Load, &err),
        }
        true
    }

    pub async fn load(&mut self) -> AppResult<()> {
        let ticket = self.begin_load();
        let call = RemoteCall::enter("list_records", Some(&self.category_id));
        let result = call.finish(
            self.remote.list_records(&self.category_id).await,
            |records| records.len(),
        );
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        self.apply_load(ticket, result);
        outcome
    }

    fn field(&self, key: &str) -> AppResult<Field> {
        self.schema.get(key).cloned().ok_or_else(|| {
            AppError::new(VALIDATION_UNKNOWN_FIELD, "This column no longer exists")
                .with_context("key", key.to_string())
        })
    }

    /// Normalize an edit to a persisted row and save the full resulting data.
    /// Returns `None` when the edit leaves the record unchanged.
    pub async fn edit_cell(
        &mut self,
        record_id: &str,
        key: &str,
        raw: &RawValue,
        lookups: &Lookups,
    ) -> AppResult<Option<Record>> {
        let prepared = self.prepare_cell_edit(record_id, key, raw, lookups);
        let data = match self.status.track(ActionKind::Update, prepared)? {
            Some(data) => data,
            None => return Ok(None),
        };
        self.update_record_data(record_id, data).await.map(Some)
    }

    fn prepare_cell_edit(
        &self,
        record_id: &str,
        key: &str,
        raw: &RawValue,
        lookups: &Lookups,
    ) -> AppResult<Option<RecordData>> {
        let field = self.field(key)?;
        let record = self.record(record_id).ok_or_else(|| not_cached(record_id))?;
        let value = codec::normalize(&field, raw, lookups)
            .map_err(|err| err.with_context("record_id", record_id.to_string()))?;
        let mut data = record.data.clone();
        codec::apply_value(&mut data, key, value);
        if data == record.data {
            debug!(target: LOG_TARGET, event = "cell_edit_unchanged", record_id, key);
            return Ok(None);
        }
        Ok(Some(data))
    }

    /// Replace a record's data. The cache changes only when the store accepts it.
    pub async fn update_record_data(&mut self, record_id: &str, data: RecordData) -> AppResult<Record> {
        let result = self.try_update(record_id, data).await;
        self.status.track(ActionKind::Update, result)
    }

    async fn try_update(&mut self, record_id: &str, data: RecordData) -> AppResult<Record> {
        let _guard = self.saving.begin("update")?;
        let call = RemoteCall::enter("update_record", Some(&self.category_id));
        let updated = call.finish(self.remote.update_record(record_id, data).await, |_| 1)?;
        if let Some(slot) = self.records.iter_mut().find(|r| r.id == updated.id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    /// Start a draft row. No-op (returns `false`) while one already exists.
    pub fn append_draft(&mut self) -> bool {
        if self.draft.is_draft() {
            return false;
        }
        self.draft = RowState::Draft(RecordData::new());
        debug!(target: LOG_TARGET, event = "draft_started", category_id = %self.category_id);
        true
    }

    pub fn discard_draft(&mut self) {
        if self.draft.is_draft() {
            debug!(target: LOG_TARGET, event = "draft_discarded", category_id = %self.category_id);
        }
        self.draft = RowState::None;
    }

    /// Merge an edit into the draft and create the record once nothing required is missing.
    pub async fn edit_draft(
        &mut self,
        key: &str,
        raw: &RawValue,
        lookups: &Lookups,
    ) -> AppResult<DraftOutcome> {
        let merged = self.merge_draft(key, raw, lookups);
        let data = self.status.track(ActionKind::Create, merged)?;

        let missing: Vec<String> = codec::missing_required(self.schema.fields(), &data)
            .into_iter()
            .map(|f| f.key.clone())
            .collect();
        if !missing.is_empty() {
            return Ok(DraftOutcome::Pending { missing });
        }

        let created = self.try_create(data).await;
        let created = self.status.track(ActionKind::Create, created)?;
        self.draft = RowState::None;
        let _ = self.load().await;
        Ok(DraftOutcome::Created(created))
    }

    fn merge_draft(&mut self, key: &str, raw: &RawValue, lookups: &Lookups) -> AppResult<RecordData> {
        let field = self.field(key)?;
        let value = codec::normalize(&field, raw, lookups)?;
        match &mut self.draft {
            RowState::Draft(data) => {
                codec::apply_value(data, key, value);
                Ok(data.clone())
            }
            RowState::None => Err(AppError::new(
                VALIDATION_NO_DRAFT,
                "There is no new row to edit",
            )),
        }
    }

    /// Create a record from a complete form. Required fields are checked first.
    pub async fn create_record(&mut self, mut data: RecordData) -> AppResult<Record> {
        codec::prune_empty(&mut data);
        let missing = codec::missing_required(self.schema.fields(), &data);
        if !missing.is_empty() {
            let err = required_error(&missing);
            self.status.fail(ActionKind::Create, &err);
            return Err(err);
        }
        let created = self.try_create(data).await;
        let created = self.status.track(ActionKind::Create, created)?;
        let _ = self.load().await;
        Ok(created)
    }

    async fn try_create(&mut self, data: RecordData) -> AppResult<Record> {
        let _guard = self.saving.begin("create")?;
        let call = RemoteCall::enter("create_record", Some(&self.category_id));
        call.finish(
            self.remote.create_record(&self.category_id, data).await,
            |_| 1,
        )
    }

    /// Delete after confirmation. Bulk deletes run concurrently, then the list reloads.
    pub async fn delete_records(
        &mut self,
        ids: &[String],
        confirm: &dyn Confirm,
    ) -> AppResult<Deletion> {
        if ids.is_empty() {
            return Ok(Deletion::Deleted(0));
        }
        if !confirm.confirm(&delete_records_prompt(ids.len())) {
            debug!(target: LOG_TARGET, event = "delete_cancelled", count = ids.len());
            return Ok(Deletion::Cancelled);
        }
        let result = self.try_delete(ids).await;
        let _ = self.load().await;
        self.status.track(ActionKind::Delete, result)
    }

    async fn try_delete(&mut self, ids: &[String]) -> AppResult<Deletion> {
        let _guard = self.saving.begin("delete")?;
        let call = RemoteCall::enter("delete_records", Some(&self.category_id));
        let remote = self.remote.clone();
        let results = join_all(ids.iter().map(|id| remote.delete_record(id))).await;
        let deleted = results.iter().filter(|r| r.is_ok()).count();
        let first_error = results.into_iter().find_map(Result::err);
        let outcome = match first_error {
            Some(err) => Err(err.with_context("deleted", deleted.to_string())),
            None => Ok(Deletion::Deleted(deleted)),
        };
        call.finish(outcome, |_| deleted)
    }

    /// Persist a full ordering of this category's records, then reload.
    pub async fn reorder(&mut self, ordered_ids: Vec<String>) -> AppResult<()> {
        let result = self.try_reorder(&ordered_ids).await;
        let result = self.status.track(ActionKind::Reorder, result);
        let _ = self.load().await;
        result
    }

    async fn try_reorder(&mut self, ordered_ids: &[String]) -> AppResult<()> {
        let _guard = self.saving.begin("reorder")?;
        let call = RemoteCall::enter("reorder_records", Some(&self.category_id));
        call.finish(
            self.remote
                .reorder_records(&self.category_id, ordered_ids)
                .await,
            |_| ordered_ids.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_state_exposes_draft_data() {
        let mut data = RecordData::new();
        data.insert("item".into(), serde_json::json!("Kettle"));
        let state = RowState::Draft(data.clone());
        assert!(state.is_draft());
        assert_eq!(state.data(), Some(&data));
        assert_eq!(RowState::default().data(), None);
    }

    #[test]
    fn required_error_names_every_missing_field() {
        let field = |name: &str| Field {
            id: name.into(),
            category_id: "c".into(),
            name: name.into(),
            key: name.to_lowercase(),
            field_type: crate::model::FieldType::Text,
            is_required: true,
            is_multi: false,
            sort_order: 0,
            dropdown_id: None,
            linked_category_id: None,
            created_at: 0,
            updated_at: 0,
        };
        let item = field("Item");
        let owner = field("Owner");
        let err = required_error(&[&item, &owner]);
        assert_eq!(err.code(), VALIDATION_REQUIRED);
        assert!(err.message().contains("Item, Owner"));
        assert!(err.is_validation());
    }
}
