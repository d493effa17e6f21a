use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use homeledger_lib::{
    config::{AppConfig, ENV_DATA_DIR},
    model::{CategoryInput, FieldInput, FieldType},
    remote::RemoteStore,
    SqliteStore,
};
use serde_json::{json, Value};
use tempfile::tempdir;

fn homeledger(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("homeledger").unwrap();
    cmd.env(ENV_DATA_DIR, data_dir).env_remove("RUST_LOG");
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

async fn seed(data_dir: &Path) -> Result<String> {
    let config = AppConfig::load_with(|key| (key == ENV_DATA_DIR).then(|| data_dir.display().to_string()))?;
    let store = SqliteStore::open(&config.db_path()).await?;
    let category = store.create_category(CategoryInput::named("Appliances")).await?;
    store
        .create_field(&category.id, FieldInput::new("Item", FieldType::Text).required())
        .await?;
    store
        .create_field(&category.id, FieldInput::new("Price", FieldType::Currency))
        .await?;
    for (item, price) in [("Kettle", json!(25)), ("Fridge", json!(499.5)), ("Toaster", json!(30))] {
        store
            .create_record(
                &category.id,
                json!({ "item": item, "price": price }).as_object().cloned().unwrap(),
            )
            .await?;
    }
    store.pool().close().await;
    Ok(category.id)
}

#[test]
fn migrate_reports_schema_on_fresh_directory() -> Result<()> {
    let dir = tempdir()?;
    let data_dir = dir.path().join("nested");
    let out = stdout(homeledger(&data_dir).arg("migrate"));
    assert!(out.starts_with("Database is at schema "), "{out}");
    assert!(data_dir.join("homeledger.sqlite3").exists());

    let out = stdout(homeledger(&data_dir).args(["categories", "--json"]));
    let categories: Value = serde_json::from_str(&out)?;
    assert_eq!(categories, json!([]));
    Ok(())
}

#[tokio::test]
async fn records_follow_the_saved_view() -> Result<()> {
    let dir = tempdir()?;
    let category_id = seed(dir.path()).await?;

    let out = stdout(homeledger(dir.path()).arg("categories"));
    assert_eq!(out, format!("{category_id}\tAppliances\n"));

    let out = stdout(homeledger(dir.path()).args(["fields", category_id.as_str()]));
    assert_eq!(out, "item\tItem\ttext *\nprice\tPrice\tcurrency\n");

    let out = stdout(homeledger(dir.path()).args(["records", category_id.as_str()]));
    assert_eq!(out, "Item\tPrice\nKettle\t25\nFridge\t499.5\nToaster\t30\n");

    let out = stdout(homeledger(dir.path()).args(["sort", category_id.as_str(), "price"]));
    assert_eq!(out, "Sorted by price ascending\n");
    let out = stdout(homeledger(dir.path()).args(["records", category_id.as_str()]));
    assert_eq!(out, "Item\tPrice\nKettle\t25\nToaster\t30\nFridge\t499.5\n");

    let out = stdout(homeledger(dir.path()).args([
        "records",
        category_id.as_str(),
        "--search",
        "FRI",
    ]));
    assert_eq!(out, "Item\tPrice\nFridge\t499.5\n");
    assert!(dir.path().join("view_prefs.json").exists());

    let out = stdout(homeledger(dir.path()).args(["records", category_id.as_str(), "--json"]));
    let payload: Value = serde_json::from_str(&out)?;
    assert_eq!(payload["category"]["name"], json!("Appliances"));
    assert_eq!(payload["records"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[test]
fn unknown_category_fails() -> Result<()> {
    let dir = tempdir()?;
    homeledger(dir.path())
        .args(["records", "missing"])
        .assert()
        .failure()
        .code(1);
    Ok(())
}
