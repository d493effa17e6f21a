//! Desktop editing surface: columns from the schema, rows through the codec,
//! view preferences, the draft row, selection and drag reordering.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::{
    codec::{self, RawValue},
    confirm::Confirm,
    model::{FieldType, Record},
    prefs::{PrefsHandle, ViewPrefs},
    records::{Deletion, DraftOutcome, VALIDATION_UNKNOWN_FIELD},
    remote::RemoteStore,
    reorder,
    session::CategorySession,
    status::{ActionKind, SavingFlag, StatusBoard},
    view::{self, DisplayRow, NATURAL_SORT_KEY},
    AppError, AppResult, LOG_TARGET,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub name: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub visible: bool,
    pub width: u32,
}

pub struct Grid {
    session: CategorySession,
    prefs_store: PrefsHandle,
    prefs: ViewPrefs,
    default_width: u32,
    search: String,
    selection: BTreeSet<String>,
    status: StatusBoard,
}

impl Grid {
    pub async fn open(
        remote: Arc<dyn RemoteStore>,
        prefs_store: PrefsHandle,
        category_id: &str,
        default_width: u32,
        saving: SavingFlag,
    ) -> AppResult<Self> {
        let session = CategorySession::open(remote, category_id, saving).await?;
        Self::from_session(session, prefs_store, default_width)
    }

    pub fn from_session(
        session: CategorySession,
        prefs_store: PrefsHandle,
        default_width: u32,
    ) -> AppResult<Self> {
        let prefs = prefs_store.load_merged(session.category_id(), session.schema(), default_width)?;
        Ok(Self {
            session,
            prefs_store,
            prefs,
            default_width,
            search: String::new(),
            selection: BTreeSet::new(),
            status: StatusBoard::default(),
        })
    }

    pub fn session(&self) -> &CategorySession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CategorySession {
        &mut self.session
    }

    pub fn prefs(&self) -> &ViewPrefs {
        &self.prefs
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Latest failure of `kind` on this surface.
    pub fn message(&self, kind: ActionKind) -> Option<&str> {
        self.status
            .message(kind)
            .or_else(|| self.session.records().status().message(kind))
    }

    pub fn columns(&self) -> Vec<Column> {
        self.session
            .schema()
            .fields()
            .iter()
            .map(|field| Column {
                key: field.key.clone(),
                name: field.name.clone(),
                field_type: field.field_type,
                is_required: field.is_required,
                visible: self.prefs.is_visible(&field.key),
                width: self.prefs.width(&field.key, self.default_width),
            })
            .collect()
    }

    pub fn visible_columns(&self) -> Vec<Column> {
        self.columns().into_iter().filter(|c| c.visible).collect()
    }

    /// Rows after filters, search and sort.
    pub fn rows(&self) -> Vec<DisplayRow> {
        view::visible_rows(
            self.session.rows(),
            self.session.schema(),
            &self.prefs.sort,
            &self.prefs.filters,
            &self.search,
        )
    }

    /// Display text of the draft row, if one is open.
    pub fn draft_cells(&self) -> Option<HashMap<String, String>> {
        let data = self.session.records().draft().data()?;
        Some(
            self.session
                .schema()
                .fields()
                .iter()
                .map(|field| {
                    (
                        field.key.clone(),
                        codec::format(field, data.get(&field.key), self.session.lookups()),
                    )
                })
                .collect(),
        )
    }

    fn known_column(&self, key: &str) -> AppResult<()> {
        if self.session.field(key).is_some() {
            Ok(())
        } else {
            Err(AppError::new(VALIDATION_UNKNOWN_FIELD, "This column no longer exists")
                .with_context("key", key.to_string()))
        }
    }

    fn persist_prefs(&mut self) -> AppResult<()> {
        let result = self
            .prefs_store
            .save(self.session.category_id(), &self.prefs);
        self.status.track(ActionKind::Preferences, result)
    }

    pub fn click_header(&mut self, key: &str) -> AppResult<()> {
        if key != NATURAL_SORT_KEY {
            self.known_column(key)?;
        }
        self.prefs.sort = self.prefs.sort.cycle(key);
        debug!(
            target: LOG_TARGET,
            event = "sort_changed",
            key = %self.prefs.sort.key,
            direction = ?self.prefs.sort.direction
        );
        self.persist_prefs()
    }

    /// Accept only `values` in the column; an empty set removes the filter.
    pub fn set_filter(&mut self, key: &str, values: BTreeSet<String>) -> AppResult<()> {
        self.known_column(key)?;
        if values.is_empty() {
            self.prefs.filters.remove(key);
        } else {
            self.prefs.filters.insert(key.to_string(), values);
        }
        self.persist_prefs()
    }

    pub fn clear_filters(&mut self) -> AppResult<()> {
        self.prefs.filters.clear();
        self.persist_prefs()
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn set_visible(&mut self, key: &str, visible: bool) -> AppResult<()> {
        self.known_column(key)?;
        self.prefs.visibility.insert(key.to_string(), visible);
        self.persist_prefs()
    }

    pub fn set_width(&mut self, key: &str, width: u32) -> AppResult<()> {
        self.known_column(key)?;
        self.prefs.widths.insert(key.to_string(), width.max(1));
        self.persist_prefs()
    }

    /// Distinct display values of a column across all loaded rows.
    pub fn filter_options(&self, key: &str) -> Vec<String> {
        view::filter_options(&self.session.rows(), key)
    }

    pub async fn edit_cell(
        &mut self,
        record_id: &str,
        key: &str,
        raw: impl Into<RawValue>,
    ) -> AppResult<Option<Record>> {
        let raw = raw.into();
        let (records, lookups) = self.session.records_and_lookups();
        records.edit_cell(record_id, key, &raw, lookups).await
    }

    pub fn append_row(&mut self) -> bool {
        self.session.records_mut().append_draft()
    }

    pub async fn edit_draft(&mut self, key: &str, raw: impl Into<RawValue>) -> AppResult<DraftOutcome> {
        let raw = raw.into();
        let (records, lookups) = self.session.records_and_lookups();
        records.edit_draft(key, &raw, lookups).await
    }

    pub fn discard_draft(&mut self) {
        self.session.records_mut().discard_draft();
    }

    pub fn select(&mut self, record_id: &str, selected: bool) {
        if selected {
            self.selection.insert(record_id.to_string());
        } else {
            self.selection.remove(record_id);
        }
    }

    /// Select every row currently visible.
    pub fn select_visible(&mut self) {
        self.selection = self.rows().into_iter().map(|row| row.id).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub async fn delete_selected(&mut self, confirm: &dyn Confirm) -> AppResult<Deletion> {
        let ids: Vec<String> = self.selection.iter().cloned().collect();
        let outcome = self
            .session
            .records_mut()
            .delete_records(&ids, confirm)
            .await?;
        if let Deletion::Deleted(_) = outcome {
            let remaining: BTreeSet<String> = self.session.records().ids().into_iter().collect();
            self.selection.retain(|id| remaining.contains(id));
        }
        Ok(outcome)
    }

    pub async fn delete_row(&mut self, record_id: &str, confirm: &dyn Confirm) -> AppResult<Deletion> {
        let outcome = self
            .session
            .records_mut()
            .delete_records(&[record_id.to_string()], confirm)
            .await?;
        self.selection.remove(record_id);
        Ok(outcome)
    }

    pub fn reorder_enabled(&self) -> bool {
        reorder::reorder_enabled(&self.prefs.sort, &self.prefs.filters, &self.search)
    }

    /// Drag the row at `from` to `to` in the natural view.
    pub async fn move_row(&mut self, from: usize, to: usize) -> AppResult<()> {
        let result = reorder::move_row(
            self.session.records_mut(),
            &self.prefs.sort,
            &self.prefs.filters,
            &self.search,
            from,
            to,
        )
        .await;
        self.status.track(ActionKind::Reorder, result)
    }

    /// Reload everything and re-merge preferences over the current schema.
    pub async fn reload(&mut self) -> AppResult<()> {
        let result = self.session.reload().await;
        self.status.track(ActionKind::Load, result)?;
        let prefs = self.prefs_store.load_merged(
            self.session.category_id(),
            self.session.schema(),
            self.default_width,
        );
        self.prefs = self.status.track(ActionKind::Preferences, prefs)?;
        Ok(())
    }
}
