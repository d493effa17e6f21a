//! Contract between the engine and whatever persists categories, schema and records.

use async_trait::async_trait;

use crate::{
    model::{
        Category, CategoryInput, Dropdown, DropdownInput, DropdownOption, Field, FieldInput,
        OptionInput, Person, PersonInput, Record, RecordData, RecordTitle,
    },
    AppResult,
};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn create_category(&self, input: CategoryInput) -> AppResult<Category>;
    async fn update_category(&self, id: &str, input: CategoryInput) -> AppResult<Category>;
    /// Removes the category together with its fields and records.
    async fn delete_category(&self, id: &str) -> AppResult<()>;

    async fn list_dropdowns(&self) -> AppResult<Vec<Dropdown>>;
    async fn create_dropdown(&self, input: DropdownInput) -> AppResult<Dropdown>;
    async fn update_dropdown(&self, id: &str, input: DropdownInput) -> AppResult<Dropdown>;
    async fn list_options(&self, dropdown_id: &str) -> AppResult<Vec<DropdownOption>>;
    async fn create_option(&self, dropdown_id: &str, input: OptionInput)
        -> AppResult<DropdownOption>;
    async fn update_option(&self, id: &str, input: OptionInput) -> AppResult<DropdownOption>;

    async fn list_people(&self) -> AppResult<Vec<Person>>;
    async fn create_person(&self, input: PersonInput) -> AppResult<Person>;
    async fn update_person(&self, id: &str, input: PersonInput) -> AppResult<Person>;

    async fn list_fields(&self, category_id: &str) -> AppResult<Vec<Field>>;
    async fn create_field(&self, category_id: &str, input: FieldInput) -> AppResult<Field>;
    async fn update_field(&self, id: &str, input: FieldInput) -> AppResult<Field>;
    async fn delete_field(&self, id: &str) -> AppResult<()>;

    async fn list_records(&self, category_id: &str) -> AppResult<Vec<Record>>;
    async fn create_record(&self, category_id: &str, data: RecordData) -> AppResult<Record>;
    /// Replaces the record's data wholesale.
    async fn update_record(&self, id: &str, data: RecordData) -> AppResult<Record>;
    async fn delete_record(&self, id: &str) -> AppResult<()>;
    async fn reorder_records(&self, category_id: &str, ordered_ids: &[String]) -> AppResult<()>;

    /// `{id, title}` pairs for every record of a category, in natural order.
    async fn lookup_records(&self, category_id: &str) -> AppResult<Vec<RecordTitle>>;
}
