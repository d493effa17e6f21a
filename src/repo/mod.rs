//! SQLite implementation of [`RemoteStore`].

use std::path::Path;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{
    db, migrate,
    model::{
        Category, CategoryInput, Dropdown, DropdownInput, DropdownOption, Field, FieldInput,
        OptionInput, Person, PersonInput, Record, RecordData, RecordTitle,
    },
    remote::RemoteStore,
    AppError, AppResult,
};

mod catalog;
mod fields;
mod records;

fn not_found(code: &str, what: &str, id: &str) -> AppError {
    AppError::new(code, format!("{what} not found")).with_context("id", id.to_string())
}

fn db_error(err: sqlx::Error, operation: &str, table: &str) -> AppError {
    AppError::from(err)
        .with_context("operation", operation.to_string())
        .with_context("table", table.to_string())
}

fn flag(row: &sqlx::sqlite::SqliteRow, column: &str) -> AppResult<bool> {
    use sqlx::Row;
    row.try_get::<i64, _>(column)
        .map(|value| value != 0)
        .map_err(AppError::from)
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) and migrate the database at `path`.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::open_sqlite_pool(path).await?;
        migrate::apply_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = db::open_memory_pool().await?;
        migrate::apply_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        catalog::list_categories(&self.pool).await
    }

    async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        catalog::create_category(&self.pool, input).await
    }

    async fn update_category(&self, id: &str, input: CategoryInput) -> AppResult<Category> {
        catalog::update_category(&self.pool, id, input).await
    }

    async fn delete_category(&self, id: &str) -> AppResult<()> {
        catalog::delete_category(&self.pool, id).await
    }

    async fn list_dropdowns(&self) -> AppResult<Vec<Dropdown>> {
        catalog::list_dropdowns(&self.pool).await
    }

    async fn create_dropdown(&self, input: DropdownInput) -> AppResult<Dropdown> {
        catalog::create_dropdown(&self.pool, input).await
    }

    async fn update_dropdown(&self, id: &str, input: DropdownInput) -> AppResult<Dropdown> {
        catalog::update_dropdown(&self.pool, id, input).await
    }

    async fn list_options(&self, dropdown_id: &str) -> AppResult<Vec<DropdownOption>> {
        catalog::list_options(&self.pool, dropdown_id).await
    }

    async fn create_option(
        &self,
        dropdown_id: &str,
        input: OptionInput,
    ) -> AppResult<DropdownOption> {
        catalog::create_option(&self.pool, dropdown_id, input).await
    }

    async fn update_option(&self, id: &str, input: OptionInput) -> AppResult<DropdownOption> {
        catalog::update_option(&self.pool, id, input).await
    }

    async fn list_people(&self) -> AppResult<Vec<Person>> {
        catalog::list_people(&self.pool).await
    }

    async fn create_person(&self, input: PersonInput) -> AppResult<Person> {
        catalog::create_person(&self.pool, input).await
    }

    async fn update_person(&self, id: &str, input: PersonInput) -> AppResult<Person> {
        catalog::update_person(&self.pool, id, input).await
    }

    async fn list_fields(&self, category_id: &str) -> AppResult<Vec<Field>> {
        fields::list_fields(&self.pool, category_id).await
    }

    async fn create_field(&self, category_id: &str, input: FieldInput) -> AppResult<Field> {
        fields::create_field(&self.pool, category_id, input).await
    }

    async fn update_field(&self, id: &str, input: FieldInput) -> AppResult<Field> {
        fields::update_field(&self.pool, id, input).await
    }

    async fn delete_field(&self, id: &str) -> AppResult<()> {
        fields::delete_field(&self.pool, id).await
    }

    async fn list_records(&self, category_id: &str) -> AppResult<Vec<Record>> {
        records::list_records(&self.pool, category_id).await
    }

    async fn create_record(&self, category_id: &str, data: RecordData) -> AppResult<Record> {
        records::create_record(&self.pool, category_id, data).await
    }

    async fn update_record(&self, id: &str, data: RecordData) -> AppResult<Record> {
        records::update_record(&self.pool, id, data).await
    }

    async fn delete_record(&self, id: &str) -> AppResult<()> {
        records::delete_record(&self.pool, id).await
    }

    async fn reorder_records(&self, category_id: &str, ordered_ids: &[String]) -> AppResult<()> {
        records::reorder_records(&self.pool, category_id, ordered_ids).await
    }

    async fn lookup_records(&self, category_id: &str) -> AppResult<Vec<RecordTitle>> {
        records::lookup_records(&self.pool, category_id).await
    }
}
