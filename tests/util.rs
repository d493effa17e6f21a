#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use homeledger_lib::{
    model::{
        Category, CategoryInput, Dropdown, DropdownInput, DropdownOption, Field, FieldInput,
        FieldType, OptionInput, Person, PersonInput, Record, RecordData, RecordTitle,
    },
    remote::RemoteStore,
    AppError, AppResult, SqliteStore,
};
use serde_json::Value;

pub async fn memory_store() -> SqliteStore {
    SqliteStore::in_memory()
        .await
        .expect("open migrated sqlite::memory:")
}

pub fn data(value: Value) -> RecordData {
    value.as_object().cloned().expect("object literal")
}

/// "Warranties" with a required Item (text) and an optional Expires (date).
pub async fn warranties(store: &dyn RemoteStore) -> (Category, Field, Field) {
    let category = store
        .create_category(CategoryInput::named("Warranties"))
        .await
        .unwrap();
    let item = store
        .create_field(&category.id, FieldInput::new("Item", FieldType::Text).required())
        .await
        .unwrap();
    let expires = store
        .create_field(&category.id, FieldInput::new("Expires", FieldType::Date))
        .await
        .unwrap();
    (category, item, expires)
}

/// Wraps a store, counts mutating calls and can be told to fail them.
pub struct FlakyStore {
    inner: SqliteStore,
    pub fail_writes: AtomicBool,
    writes: AtomicUsize,
    loads: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn record_loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn write(&self) -> AppResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::new("SQLX/ERROR", ""));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        self.write()?;
        self.inner.create_category(input).await
    }

    async fn update_category(&self, id: &str, input: CategoryInput) -> AppResult<Category> {
        self.write()?;
        self.inner.update_category(id, input).await
    }

    async fn delete_category(&self, id: &str) -> AppResult<()> {
        self.write()?;
        self.inner.delete_category(id).await
    }

    async fn list_dropdowns(&self) -> AppResult<Vec<Dropdown>> {
        self.inner.list_dropdowns().await
    }

    async fn create_dropdown(&self, input: DropdownInput) -> AppResult<Dropdown> {
        self.write()?;
        self.inner.create_dropdown(input).await
    }

    async fn update_dropdown(&self, id: &str, input: DropdownInput) -> AppResult<Dropdown> {
        self.write()?;
        self.inner.update_dropdown(id, input).await
    }

    async fn list_options(&self, dropdown_id: &str) -> AppResult<Vec<DropdownOption>> {
        self.inner.list_options(dropdown_id).await
    }

    async fn create_option(
        &self,
        dropdown_id: &str,
        input: OptionInput,
    ) -> AppResult<DropdownOption> {
        self.write()?;
        self.inner.create_option(dropdown_id, input).await
    }

    async fn update_option(&self, id: &str, input: OptionInput) -> AppResult<DropdownOption> {
        self.write()?;
        self.inner.update_option(id, input).await
    }

    async fn list_people(&self) -> AppResult<Vec<Person>> {
        self.inner.list_people().await
    }

    async fn create_person(&self, input: PersonInput) -> AppResult<Person> {
        self.write()?;
        self.inner.create_person(input).await
    }

    async fn update_person(&self, id: &str, input: PersonInput) -> AppResult<Person> {
        self.write()?;
        self.inner.update_person(id, input).await
    }

    async fn list_fields(&self, category_id: &str) -> AppResult<Vec<Field>> {
        self.inner.list_fields(category_id).await
    }

    async fn create_field(&self, category_id: &str, input: FieldInput) -> AppResult<Field> {
        self.write()?;
        self.inner.create_field(category_id, input).await
    }

    async fn update_field(&self, id: &str, input: FieldInput) -> AppResult<Field> {
        self.write()?;
        self.inner.update_field(id, input).await
    }

    async fn delete_field(&self, id: &str) -> AppResult<()> {
        self.write()?;
        self.inner.delete_field(id).await
    }

    async fn list_records(&self, category_id: &str) -> AppResult<Vec<Record>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_records(category_id).await
    }

    async fn create_record(&self, category_id: &str, data: RecordData) -> AppResult<Record> {
        self.write()?;
        self.inner.create_record(category_id, data).await
    }

    async fn update_record(&self, id: &str, data: RecordData) -> AppResult<Record> {
        self.write()?;
        self.inner.update_record(id, data).await
    }

    async fn delete_record(&self, id: &str) -> AppResult<()> {
        self.write()?;
        self.inner.delete_record(id).await
    }

    async fn reorder_records(&self, category_id: &str, ordered_ids: &[String]) -> AppResult<()> {
        self.write()?;
        self.inner.reorder_records(category_id, ordered_ids).await
    }

    async fn lookup_records(&self, category_id: &str) -> AppResult<Vec<RecordTitle>> {
        self.inner.lookup_records(category_id).await
    }
}
