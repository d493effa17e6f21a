use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use super::{db_error, flag, not_found};
use crate::{
    id::new_uuid_v7,
    model::{
        Category, CategoryInput, Dropdown, DropdownInput, DropdownOption, OptionInput, Person,
        PersonInput,
    },
    schema::clean_name,
    time::now_ms,
    AppError, AppResult, LOG_TARGET,
};

const CATEGORY_NOT_FOUND: &str = "CATEGORY/NOT_FOUND";
const DROPDOWN_NOT_FOUND: &str = "DROPDOWN/NOT_FOUND";
const OPTION_NOT_FOUND: &str = "OPTION/NOT_FOUND";
const PERSON_NOT_FOUND: &str = "PERSON/NOT_FOUND";

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl TryFrom<&SqliteRow> for Category {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            description: row.try_get("description").map_err(AppError::from)?,
            sort_order: row.try_get("sort_order").map_err(AppError::from)?,
            is_active: flag(row, "is_active")?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

impl TryFrom<&SqliteRow> for Dropdown {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            description: row.try_get("description").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

impl TryFrom<&SqliteRow> for DropdownOption {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            dropdown_id: row.try_get("dropdown_id").map_err(AppError::from)?,
            label: row.try_get("label").map_err(AppError::from)?,
            value: row.try_get("value").map_err(AppError::from)?,
            sort_order: row.try_get("sort_order").map_err(AppError::from)?,
            is_active: flag(row, "is_active")?,
        })
    }
}

impl TryFrom<&SqliteRow> for Person {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            user_id: row.try_get("user_id").map_err(AppError::from)?,
            notes: row.try_get("notes").map_err(AppError::from)?,
        })
    }
}

pub(super) async fn list_categories(pool: &SqlitePool) -> AppResult<Vec<Category>> {
    let rows = sqlx::query(
        "SELECT id, name, description, sort_order, is_active, created_at, updated_at \
         FROM categories ORDER BY sort_order, name",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| db_error(err, "list", "categories"))?;
    rows.iter().map(Category::try_from).collect()
}

pub(super) async fn get_category(pool: &SqlitePool, id: &str) -> AppResult<Category> {
    let row = sqlx::query(
        "SELECT id, name, description, sort_order, is_active, created_at, updated_at \
         FROM categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_error(err, "get", "categories").with_context("id", id.to_string()))?;
    row.as_ref()
        .map(Category::try_from)
        .transpose()?
        .ok_or_else(|| not_found(CATEGORY_NOT_FOUND, "Category", id))
}

pub(super) async fn create_category(pool: &SqlitePool, input: CategoryInput) -> AppResult<Category> {
    let name = clean_name(&input.name, "Category")?;
    let sort_order = match input.sort_order {
        Some(order) => order,
        None => sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM categories",
        )
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "create", "categories"))?,
    };
    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO categories (id, name, description, sort_order, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&name)
    .bind(optional_text(input.description))
    .bind(sort_order)
    .bind(input.is_active as i64)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| db_error(err, "create", "categories"))?;

    info!(target: LOG_TARGET, event = "category_created", id = %id);
    get_category(pool, &id).await
}

pub(super) async fn update_category(
    pool: &SqlitePool,
    id: &str,
    input: CategoryInput,
) -> AppResult<Category> {
    let name = clean_name(&input.name, "Category")?;
    let result = sqlx::query(
        "UPDATE categories SET name = ?, description = ?, sort_order = COALESCE(?, sort_order), \
         is_active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(optional_text(input.description))
    .bind(input.sort_order)
    .bind(input.is_active as i64)
    .bind(now_ms())
    .bind(id)
    .execute(pool)
    .await
    .map_err(|err| db_error(err, "update", "categories").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(CATEGORY_NOT_FOUND, "Category", id));
    }
    get_category(pool, id).await
}

pub(super) async fn delete_category(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|err| db_error(err, "delete", "categories").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(CATEGORY_NOT_FOUND, "Category", id));
    }
    info!(target: LOG_TARGET, event = "category_deleted", id = %id);
    Ok(())
}

pub(super) async fn list_dropdowns(pool: &SqlitePool) -> AppResult<Vec<Dropdown>> {
    let rows = sqlx::query(
        "SELECT id, name, description, created_at, updated_at FROM dropdowns ORDER BY name, id",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| db_error(err, "list", "dropdowns"))?;
    rows.iter().map(Dropdown::try_from).collect()
}

async fn get_dropdown(pool: &SqlitePool, id: &str) -> AppResult<Dropdown> {
    let row = sqlx::query(
        "SELECT id, name, description, created_at, updated_at FROM dropdowns WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_error(err, "get", "dropdowns").with_context("id", id.to_string()))?;
    row.as_ref()
        .map(Dropdown::try_from)
        .transpose()?
        .ok_or_else(|| not_found(DROPDOWN_NOT_FOUND, "Dropdown", id))
}

pub(super) async fn create_dropdown(pool: &SqlitePool, input: DropdownInput) -> AppResult<Dropdown> {
    let name = clean_name(&input.name, "Dropdown")?;
    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO dropdowns (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&name)
    .bind(optional_text(input.description))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| db_error(err, "create", "dropdowns"))?;
    get_dropdown(pool, &id).await
}

pub(super) async fn update_dropdown(
    pool: &SqlitePool,
    id: &str,
    input: DropdownInput,
) -> AppResult<Dropdown> {
    let name = clean_name(&input.name, "Dropdown")?;
    let result =
        sqlx::query("UPDATE dropdowns SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(optional_text(input.description))
            .bind(now_ms())
            .bind(id)
            .execute(pool)
            .await
            .map_err(|err| {
                db_error(err, "update", "dropdowns").with_context("id", id.to_string())
            })?;
    if result.rows_affected() == 0 {
        return Err(not_found(DROPDOWN_NOT_FOUND, "Dropdown", id));
    }
    get_dropdown(pool, id).await
}

pub(super) async fn list_options(
    pool: &SqlitePool,
    dropdown_id: &str,
) -> AppResult<Vec<DropdownOption>> {
    let rows = sqlx::query(
        "SELECT id, dropdown_id, label, value, sort_order, is_active FROM dropdown_options \
         WHERE dropdown_id = ? ORDER BY sort_order, label",
    )
    .bind(dropdown_id)
    .fetch_all(pool)
    .await
    .map_err(|err| {
        db_error(err, "list", "dropdown_options").with_context("dropdown_id", dropdown_id.to_string())
    })?;
    rows.iter().map(DropdownOption::try_from).collect()
}

async fn get_option(pool: &SqlitePool, id: &str) -> AppResult<DropdownOption> {
    let row = sqlx::query(
        "SELECT id, dropdown_id, label, value, sort_order, is_active FROM dropdown_options WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_error(err, "get", "dropdown_options").with_context("id", id.to_string()))?;
    row.as_ref()
        .map(DropdownOption::try_from)
        .transpose()?
        .ok_or_else(|| not_found(OPTION_NOT_FOUND, "Option", id))
}

fn option_value(input: &OptionInput, label: &str) -> String {
    input
        .value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(label)
        .to_string()
}

pub(super) async fn create_option(
    pool: &SqlitePool,
    dropdown_id: &str,
    input: OptionInput,
) -> AppResult<DropdownOption> {
    let label = clean_name(&input.label, "Option")?;
    get_dropdown(pool, dropdown_id).await?;
    let sort_order = match input.sort_order {
        Some(order) => order,
        None => sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM dropdown_options WHERE dropdown_id = ?",
        )
        .bind(dropdown_id)
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "create", "dropdown_options"))?,
    };
    let id = new_uuid_v7();
    sqlx::query(
        "INSERT INTO dropdown_options (id, dropdown_id, label, value, sort_order, is_active) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(dropdown_id)
    .bind(&label)
    .bind(option_value(&input, &label))
    .bind(sort_order)
    .bind(input.is_active as i64)
    .execute(pool)
    .await
    .map_err(|err| {
        db_error(err, "create", "dropdown_options")
            .with_context("dropdown_id", dropdown_id.to_string())
    })?;
    get_option(pool, &id).await
}

pub(super) async fn update_option(
    pool: &SqlitePool,
    id: &str,
    input: OptionInput,
) -> AppResult<DropdownOption> {
    let label = clean_name(&input.label, "Option")?;
    let result = sqlx::query(
        "UPDATE dropdown_options SET label = ?, value = ?, sort_order = COALESCE(?, sort_order), \
         is_active = ? WHERE id = ?",
    )
    .bind(&label)
    .bind(option_value(&input, &label))
    .bind(input.sort_order)
    .bind(input.is_active as i64)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|err| db_error(err, "update", "dropdown_options").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(OPTION_NOT_FOUND, "Option", id));
    }
    get_option(pool, id).await
}

pub(super) async fn list_people(pool: &SqlitePool) -> AppResult<Vec<Person>> {
    let rows = sqlx::query("SELECT id, name, user_id, notes FROM people ORDER BY name, id")
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "list", "people"))?;
    rows.iter().map(Person::try_from).collect()
}

async fn get_person(pool: &SqlitePool, id: &str) -> AppResult<Person> {
    let row = sqlx::query("SELECT id, name, user_id, notes FROM people WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "get", "people").with_context("id", id.to_string()))?;
    row.as_ref()
        .map(Person::try_from)
        .transpose()?
        .ok_or_else(|| not_found(PERSON_NOT_FOUND, "Person", id))
}

pub(super) async fn create_person(pool: &SqlitePool, input: PersonInput) -> AppResult<Person> {
    let name = clean_name(&input.name, "Person")?;
    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO people (id, name, user_id, notes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&name)
    .bind(optional_text(input.user_id))
    .bind(optional_text(input.notes))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| db_error(err, "create", "people"))?;
    get_person(pool, &id).await
}

pub(super) async fn update_person(
    pool: &SqlitePool,
    id: &str,
    input: PersonInput,
) -> AppResult<Person> {
    let name = clean_name(&input.name, "Person")?;
    let result = sqlx::query(
        "UPDATE people SET name = ?, user_id = ?, notes = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(optional_text(input.user_id))
    .bind(optional_text(input.notes))
    .bind(now_ms())
    .bind(id)
    .execute(pool)
    .await
    .map_err(|err| db_error(err, "update", "people").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(PERSON_NOT_FOUND, "Person", id));
    }
    get_person(pool, id).await
}
