use futures::FutureExt;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use super::{catalog::get_category, db_error, flag, not_found};
use crate::{
    db::run_in_tx,
    id::new_uuid_v7,
    model::{Field, FieldInput, FieldType},
    schema::{prepare_field_input, unique_field_key},
    time::now_ms,
    AppError, AppResult, LOG_TARGET,
};

const FIELD_NOT_FOUND: &str = "FIELD/NOT_FOUND";
const FIELD_COLUMNS: &str = "id, category_id, name, key, field_type, is_required, is_multi, \
     sort_order, dropdown_id, linked_category_id, created_at, updated_at";

impl TryFrom<&SqliteRow> for Field {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let field_type: String = row.try_get("field_type").map_err(AppError::from)?;
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            category_id: row.try_get("category_id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            key: row.try_get("key").map_err(AppError::from)?,
            field_type: FieldType::parse(&field_type)?,
            is_required: flag(row, "is_required")?,
            is_multi: flag(row, "is_multi")?,
            sort_order: row.try_get("sort_order").map_err(AppError::from)?,
            dropdown_id: row.try_get("dropdown_id").map_err(AppError::from)?,
            linked_category_id: row.try_get("linked_category_id").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

pub(super) async fn list_fields(pool: &SqlitePool, category_id: &str) -> AppResult<Vec<Field>> {
    let sql = format!(
        "SELECT {FIELD_COLUMNS} FROM fields WHERE category_id = ? ORDER BY sort_order, created_at, id"
    );
    let rows = sqlx::query(&sql)
        .bind(category_id)
        .fetch_all(pool)
        .await
        .map_err(|err| {
            db_error(err, "list", "fields").with_context("category_id", category_id.to_string())
        })?;
    rows.iter()
        .map(|row| {
            Field::try_from(row).map_err(|err| err.with_context("operation", "list_fields"))
        })
        .collect()
}

async fn get_field(pool: &SqlitePool, id: &str) -> AppResult<Field> {
    let sql = format!("SELECT {FIELD_COLUMNS} FROM fields WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "get", "fields").with_context("id", id.to_string()))?;
    row.as_ref()
        .map(Field::try_from)
        .transpose()?
        .ok_or_else(|| not_found(FIELD_NOT_FOUND, "Field", id))
}

/// Inserts a field, deriving a key unique within the category.
pub(super) async fn create_field(
    pool: &SqlitePool,
    category_id: &str,
    input: FieldInput,
) -> AppResult<Field> {
    let input = prepare_field_input(input)?;
    get_category(pool, category_id).await?;

    let category_id = category_id.to_string();
    let id = run_in_tx(pool, move |tx| {
        async move {
            let existing: Vec<String> =
                sqlx::query_scalar("SELECT key FROM fields WHERE category_id = ?")
                    .bind(&category_id)
                    .fetch_all(&mut **tx)
                    .await?;
            let source = input
                .key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .unwrap_or(input.name.as_str());
            let key = unique_field_key(source, existing.iter().map(String::as_str));

            let sort_order = match input.sort_order {
                Some(order) => order,
                None => {
                    sqlx::query_scalar::<_, i64>(
                        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM fields WHERE category_id = ?",
                    )
                    .bind(&category_id)
                    .fetch_one(&mut **tx)
                    .await?
                }
            };

            let id = new_uuid_v7();
            let now = now_ms();
            sqlx::query(
                "INSERT INTO fields (id, category_id, name, key, field_type, is_required, is_multi, \
                 sort_order, dropdown_id, linked_category_id, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&category_id)
            .bind(&input.name)
            .bind(&key)
            .bind(input.field_type.as_str())
            .bind(input.is_required as i64)
            .bind(input.is_multi as i64)
            .bind(sort_order)
            .bind(&input.dropdown_id)
            .bind(&input.linked_category_id)
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(|err| {
                db_error(err, "create", "fields").with_context("category_id", category_id.clone())
            })?;

            info!(
                target: LOG_TARGET,
                event = "field_created",
                id = %id,
                category_id = %category_id,
                key = %key,
                field_type = %input.field_type
            );
            Ok::<_, AppError>(id)
        }
        .boxed()
    })
    .await?;

    get_field(pool, &id).await
}

/// Updates a field in place. The stored key never changes.
pub(super) async fn update_field(pool: &SqlitePool, id: &str, input: FieldInput) -> AppResult<Field> {
    let input = prepare_field_input(input)?;
    let result = sqlx::query(
        "UPDATE fields SET name = ?, field_type = ?, is_required = ?, is_multi = ?, \
         sort_order = COALESCE(?, sort_order), dropdown_id = ?, linked_category_id = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(&input.name)
    .bind(input.field_type.as_str())
    .bind(input.is_required as i64)
    .bind(input.is_multi as i64)
    .bind(input.sort_order)
    .bind(&input.dropdown_id)
    .bind(&input.linked_category_id)
    .bind(now_ms())
    .bind(id)
    .execute(pool)
    .await
    .map_err(|err| db_error(err, "update", "fields").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(FIELD_NOT_FOUND, "Field", id));
    }
    get_field(pool, id).await
}

/// Removes the column definition; values already stored under its key stay in record data.
pub(super) async fn delete_field(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM fields WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|err| db_error(err, "delete", "fields").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(FIELD_NOT_FOUND, "Field", id));
    }
    info!(target: LOG_TARGET, event = "field_deleted", id = %id);
    Ok(())
}
