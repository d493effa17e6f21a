use std::collections::HashSet;

use futures::FutureExt;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{info, warn};

use super::{catalog::get_category, db_error, fields::list_fields, not_found};
use crate::{
    codec::prune_empty,
    db::run_in_tx,
    id::new_uuid_v7,
    model::{Record, RecordData, RecordTitle},
    schema::FieldSchema,
    time::now_ms,
    AppError, AppResult, LOG_TARGET,
};

const RECORD_NOT_FOUND: &str = "RECORDS/NOT_FOUND";
const REORDER_MISMATCH: &str = "RECORDS/REORDER_MISMATCH";

impl TryFrom<&SqliteRow> for Record {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let id: String = row.try_get("id").map_err(AppError::from)?;
        let raw: String = row.try_get("data").map_err(AppError::from)?;
        let data: RecordData = serde_json::from_str(&raw).map_err(|err| {
            AppError::new("RECORDS/DECODE", "Stored record data is not a JSON object")
                .with_context("id", id.clone())
                .with_cause(AppError::from(err))
        })?;
        Ok(Self {
            id,
            category_id: row.try_get("category_id").map_err(AppError::from)?,
            sort_order: row.try_get("sort_order").map_err(AppError::from)?,
            data,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

fn encode(data: &RecordData) -> AppResult<String> {
    serde_json::to_string(data).map_err(AppError::from)
}

pub(super) async fn list_records(pool: &SqlitePool, category_id: &str) -> AppResult<Vec<Record>> {
    let rows = sqlx::query(
        "SELECT id, category_id, sort_order, data, created_at, updated_at FROM records \
         WHERE category_id = ? ORDER BY sort_order, created_at, id",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await
    .map_err(|err| {
        db_error(err, "list", "records").with_context("category_id", category_id.to_string())
    })?;
    rows.iter().map(Record::try_from).collect()
}

async fn get_record(pool: &SqlitePool, id: &str) -> AppResult<Record> {
    let row = sqlx::query(
        "SELECT id, category_id, sort_order, data, created_at, updated_at FROM records WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_error(err, "get", "records").with_context("id", id.to_string()))?;
    row.as_ref()
        .map(Record::try_from)
        .transpose()?
        .ok_or_else(|| not_found(RECORD_NOT_FOUND, "Record", id))
}

/// Appends the record after the category's last one. Position and insert are a
/// single statement so concurrent creates never share a `sort_order`.
pub(super) async fn create_record(
    pool: &SqlitePool,
    category_id: &str,
    mut data: RecordData,
) -> AppResult<Record> {
    prune_empty(&mut data);
    get_category(pool, category_id).await?;

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO records (id, category_id, sort_order, data, created_at, updated_at) \
         SELECT ?, ?, COALESCE(MAX(sort_order), -1) + 1, ?, ?, ? FROM records WHERE category_id = ?",
    )
    .bind(&id)
    .bind(category_id)
    .bind(encode(&data)?)
    .bind(now)
    .bind(now)
    .bind(category_id)
    .execute(pool)
    .await
    .map_err(|err| {
        db_error(err, "create", "records").with_context("category_id", category_id.to_string())
    })?;

    info!(target: LOG_TARGET, event = "record_created", id = %id, category_id = %category_id);
    get_record(pool, &id).await
}

pub(super) async fn update_record(
    pool: &SqlitePool,
    id: &str,
    mut data: RecordData,
) -> AppResult<Record> {
    prune_empty(&mut data);
    let result = sqlx::query("UPDATE records SET data = ?, updated_at = ? WHERE id = ?")
        .bind(encode(&data)?)
        .bind(now_ms())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|err| db_error(err, "update", "records").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(RECORD_NOT_FOUND, "Record", id));
    }
    get_record(pool, id).await
}

pub(super) async fn delete_record(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM records WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|err| db_error(err, "delete", "records").with_context("id", id.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(not_found(RECORD_NOT_FOUND, "Record", id));
    }
    info!(target: LOG_TARGET, event = "record_deleted", id = %id);
    Ok(())
}

/// Rewrites `sort_order` so records follow `ordered_ids`, which must name every
/// record of the category exactly once.
pub(super) async fn reorder_records(
    pool: &SqlitePool,
    category_id: &str,
    ordered_ids: &[String],
) -> AppResult<()> {
    let category_id = category_id.to_string();
    let ordered_ids = ordered_ids.to_vec();
    run_in_tx(pool, move |tx| {
        async move {
            let current: Vec<String> =
                sqlx::query_scalar("SELECT id FROM records WHERE category_id = ?")
                    .bind(&category_id)
                    .fetch_all(&mut **tx)
                    .await?;
            let current: HashSet<&str> = current.iter().map(String::as_str).collect();
            let submitted: HashSet<&str> = ordered_ids.iter().map(String::as_str).collect();
            if submitted.len() != ordered_ids.len() || submitted != current {
                warn!(
                    target: LOG_TARGET,
                    event = "records_reorder_rejected",
                    category_id = %category_id,
                    expected = current.len(),
                    received = ordered_ids.len()
                );
                return Err(AppError::new(
                    REORDER_MISMATCH,
                    "The new order must list every record of the category exactly once",
                )
                .with_context("category_id", category_id.clone())
                .with_context("expected", current.len().to_string())
                .with_context("received", ordered_ids.len().to_string()));
            }

            let now = now_ms();
            for (position, id) in ordered_ids.iter().enumerate() {
                sqlx::query(
                    "UPDATE records SET sort_order = ?, updated_at = ? WHERE id = ? AND category_id = ?",
                )
                .bind(position as i64)
                .bind(now)
                .bind(id)
                .bind(&category_id)
                .execute(&mut **tx)
                .await?;
            }
            info!(
                target: LOG_TARGET,
                event = "records_reordered",
                category_id = %category_id,
                count = ordered_ids.len()
            );
            Ok(())
        }
        .boxed()
    })
    .await
}

pub(super) async fn lookup_records(
    pool: &SqlitePool,
    category_id: &str,
) -> AppResult<Vec<RecordTitle>> {
    let schema = FieldSchema::new(list_fields(pool, category_id).await?);
    let records = list_records(pool, category_id).await?;
    Ok(records
        .into_iter()
        .map(|record| RecordTitle {
            title: schema.title_of(&record.data),
            id: record.id,
        })
        .collect())
}
