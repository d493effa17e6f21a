use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use homeledger_lib::{
    confirm::{AlwaysConfirm, Decline},
    grid::Grid,
    model::{FieldInput, FieldType},
    prefs::PrefsHandle,
    records::{Deletion, VALIDATION_UNKNOWN_FIELD},
    remote::RemoteStore,
    reorder::REORDER_DISABLED,
    status::SavingFlag,
    view::{SortDirection, SortSpec},
};
use serde_json::json;
use tempfile::tempdir;

#[path = "util.rs"]
mod util;

use util::{data, memory_store, warranties};

async fn seed(remote: &dyn RemoteStore, category_id: &str, rows: &[(&str, &str)]) -> Vec<String> {
    let mut ids = Vec::new();
    for (item, expires) in rows {
        let record = remote
            .create_record(category_id, data(json!({ "item": item, "expires": expires })))
            .await
            .unwrap();
        ids.push(record.id);
    }
    ids
}

fn items(grid: &Grid) -> Vec<String> {
    grid.rows()
        .iter()
        .map(|row| row.cell("item").to_string())
        .collect()
}

#[tokio::test]
async fn preferences_survive_reopening_from_json_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("prefs.json");
    let remote: Arc<dyn RemoteStore> = Arc::new(memory_store().await);
    let (category, _, _) = warranties(remote.as_ref()).await;

    let mut grid = Grid::open(
        remote.clone(),
        PrefsHandle::json_file(&path),
        &category.id,
        120,
        SavingFlag::new(),
    )
    .await?;
    grid.click_header("expires")?;
    grid.click_header("expires")?;
    grid.set_visible("expires", false)?;
    grid.set_width("item", 300)?;
    grid.set_filter("item", BTreeSet::from(["Kettle".to_string()]))?;
    grid.set_search("kett");
    drop(grid);

    remote
        .create_field(&category.id, FieldInput::new("Serial", FieldType::Text))
        .await?;
    let grid = Grid::open(
        remote.clone(),
        PrefsHandle::json_file(&path),
        &category.id,
        120,
        SavingFlag::new(),
    )
    .await?;
    assert_eq!(grid.prefs().sort, SortSpec::by("expires", SortDirection::Desc));
    let columns = grid.columns();
    let widths: Vec<(String, u32, bool)> = columns
        .iter()
        .map(|c| (c.key.clone(), c.width, c.visible))
        .collect();
    assert_eq!(
        widths,
        vec![
            ("item".to_string(), 300, true),
            ("expires".to_string(), 120, false),
            ("serial".to_string(), 120, true),
        ]
    );
    let visible: Vec<String> = grid.visible_columns().into_iter().map(|c| c.key).collect();
    assert_eq!(visible, vec!["item", "serial"]);
    assert_eq!(
        grid.prefs().filters.get("item"),
        Some(&BTreeSet::from(["Kettle".to_string()]))
    );
    assert_eq!(grid.search(), "");
    Ok(())
}

#[tokio::test]
async fn deleted_field_drops_its_preferences() -> Result<()> {
    let remote: Arc<dyn RemoteStore> = Arc::new(memory_store().await);
    let (category, _, expires) = warranties(remote.as_ref()).await;
    let prefs = PrefsHandle::in_memory();

    let mut grid = Grid::open(remote.clone(), prefs.clone(), &category.id, 100, SavingFlag::new()).await?;
    grid.click_header("expires")?;
    grid.set_filter("expires", BTreeSet::from(["2026-01-01".to_string()]))?;

    remote.delete_field(&expires.id).await?;
    grid.reload().await?;
    assert!(grid.prefs().sort.is_natural_ascending());
    assert!(grid.prefs().filters.is_empty());
    assert!(!grid.prefs().widths.contains_key("expires"));

    let err = grid.click_header("expires").unwrap_err();
    assert_eq!(err.code(), VALIDATION_UNKNOWN_FIELD);
    Ok(())
}

#[tokio::test]
async fn filters_and_search_narrow_rows_and_block_reorder() -> Result<()> {
    let remote: Arc<dyn RemoteStore> = Arc::new(memory_store().await);
    let (category, _, _) = warranties(remote.as_ref()).await;
    seed(
        remote.as_ref(),
        &category.id,
        &[
            ("Kettle", "2026-01-01"),
            ("Toaster", "2027-03-01"),
            ("Drill", "2026-01-01"),
            ("Lamp", ""),
        ],
    )
    .await;
    let mut grid = Grid::open(remote, PrefsHandle::in_memory(), &category.id, 100, SavingFlag::new()).await?;

    assert_eq!(grid.filter_options("expires"), vec!["2026-01-01", "2027-03-01"]);

    grid.set_filter("expires", BTreeSet::from(["2026-01-01".to_string()]))?;
    assert_eq!(items(&grid), vec!["Kettle", "Drill"]);
    assert!(!grid.reorder_enabled());
    assert_eq!(grid.move_row(0, 1).await.unwrap_err().code(), REORDER_DISABLED);

    grid.set_search("DRI");
    assert_eq!(items(&grid), vec!["Drill"]);

    grid.clear_filters()?;
    assert_eq!(items(&grid), vec!["Drill"]);
    grid.set_search("  ");
    assert_eq!(items(&grid), vec!["Kettle", "Toaster", "Drill", "Lamp"]);
    assert!(grid.reorder_enabled());
    Ok(())
}

#[tokio::test]
async fn sort_cycles_and_keeps_blanks_last() -> Result<()> {
    let remote: Arc<dyn RemoteStore> = Arc::new(memory_store().await);
    let (category, _, _) = warranties(remote.as_ref()).await;
    seed(
        remote.as_ref(),
        &category.id,
        &[("Kettle", "2026-05-01"), ("Lamp", ""), ("Drill", "2025-01-01")],
    )
    .await;
    let mut grid = Grid::open(remote, PrefsHandle::in_memory(), &category.id, 100, SavingFlag::new()).await?;

    grid.click_header("expires")?;
    assert_eq!(items(&grid), vec!["Drill", "Kettle", "Lamp"]);
    grid.click_header("expires")?;
    assert_eq!(items(&grid), vec!["Kettle", "Drill", "Lamp"]);
    grid.click_header("expires")?;
    assert!(grid.prefs().sort.is_natural_ascending());
    assert_eq!(items(&grid), vec!["Kettle", "Lamp", "Drill"]);
    Ok(())
}

#[tokio::test]
async fn sort_order_named_field_sorts_by_its_values() -> Result<()> {
    let remote: Arc<dyn RemoteStore> = Arc::new(memory_store().await);
    let (category, _, _) = warranties(remote.as_ref()).await;
    let rank = remote
        .create_field(&category.id, FieldInput::new("Sort Order", FieldType::Number))
        .await?;
    assert_eq!(rank.key, "sort_order_2");
    for (item, position) in [("Kettle", 3), ("Lamp", 1), ("Drill", 2)] {
        remote
            .create_record(&category.id, data(json!({ "item": item, "sort_order_2": position })))
            .await?;
    }
    let mut grid = Grid::open(remote, PrefsHandle::in_memory(), &category.id, 100, SavingFlag::new()).await?;

    grid.click_header(&rank.key)?;
    assert_eq!(grid.prefs().sort, SortSpec::by("sort_order_2", SortDirection::Asc));
    assert!(!grid.prefs().sort.is_natural());
    assert_eq!(items(&grid), vec!["Lamp", "Drill", "Kettle"]);
    grid.click_header(&rank.key)?;
    assert_eq!(items(&grid), vec!["Kettle", "Drill", "Lamp"]);
    Ok(())
}

#[tokio::test]
async fn select_visible_then_delete_selected() -> Result<()> {
    let remote: Arc<dyn RemoteStore> = Arc::new(memory_store().await);
    let (category, _, _) = warranties(remote.as_ref()).await;
    let ids = seed(
        remote.as_ref(),
        &category.id,
        &[("Kettle", ""), ("Kettle lid", ""), ("Drill", "")],
    )
    .await;
    let mut grid = Grid::open(remote, PrefsHandle::in_memory(), &category.id, 100, SavingFlag::new()).await?;

    grid.set_search("kettle");
    grid.select_visible();
    assert_eq!(grid.selection().len(), 2);

    assert_eq!(grid.delete_selected(&Decline).await?, Deletion::Cancelled);
    assert_eq!(grid.selection().len(), 2);

    assert_eq!(grid.delete_selected(&AlwaysConfirm).await?, Deletion::Deleted(2));
    assert!(grid.selection().is_empty());
    grid.set_search("");
    assert_eq!(items(&grid), vec!["Drill"]);

    grid.select(&ids[2], true);
    assert_eq!(grid.delete_row(&ids[2], &AlwaysConfirm).await?, Deletion::Deleted(1));
    assert!(grid.selection().is_empty());
    assert!(grid.rows().is_empty());
    Ok(())
}
