use anyhow::Result;
use homeledger_lib::{
    builder::{Builder, MoveDirection},
    codec::{self, RawValue},
    confirm::{AlwaysConfirm, Decline},
    model::{CategoryInput, DropdownInput, FieldInput, FieldType, OptionInput},
    remote::RemoteStore,
    status::{ActionKind, SavingFlag, ACTION_BUSY},
};
use serde_json::json;

#[path = "util.rs"]
mod util;

use util::{data, memory_store, FlakyStore};

fn keys(fields: &[homeledger_lib::model::Field]) -> Vec<&str> {
    fields.iter().map(|f| f.key.as_str()).collect()
}

#[tokio::test]
async fn field_keys_are_derived_and_deduplicated() -> Result<()> {
    let flaky = FlakyStore::new(memory_store().await);
    let mut builder = Builder::open(flaky.clone(), SavingFlag::new()).await?;
    let category = builder
        .create_category(CategoryInput::named("  Insurance "))
        .await?;
    assert_eq!(category.name, "Insurance");
    builder.fields(&category.id).await?;

    assert_eq!(builder.preview_key(&category.id, "Renewal Date"), "renewal_date");
    let first = builder
        .create_field(&category.id, FieldInput::new("Renewal Date", FieldType::Date))
        .await?;
    assert_eq!(builder.preview_key(&category.id, "renewal-date"), "renewal_date_2");
    let second = builder
        .create_field(&category.id, FieldInput::new("renewal-date", FieldType::Date))
        .await?;
    let third = builder
        .create_field(&category.id, FieldInput::new("Café Owner", FieldType::Text))
        .await?;
    assert_eq!(
        (first.key.as_str(), second.key.as_str(), third.key.as_str()),
        ("renewal_date", "renewal_date_2", "cafe_owner")
    );

    let mut renamed = FieldInput::from(&first);
    renamed.name = "Renews On".into();
    let renamed = builder.update_field(&first.id, renamed).await?;
    assert_eq!(renamed.name, "Renews On");
    assert_eq!(renamed.key, "renewal_date");

    let writes = flaky.writes();
    let err = builder
        .create_field(&category.id, FieldInput::new("Status", FieldType::Dropdown))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION/DROPDOWN_REQUIRED");
    let err = builder
        .create_field(&category.id, FieldInput::new("   ", FieldType::Text))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION/NAME_REQUIRED");
    assert_eq!(flaky.writes(), writes);
    assert!(builder.message(ActionKind::Schema).is_some());
    Ok(())
}

#[tokio::test]
async fn moving_fields_persists_column_order() -> Result<()> {
    let store = memory_store().await;
    let remote = std::sync::Arc::new(store);
    let mut builder = Builder::open(remote.clone(), SavingFlag::new()).await?;
    let category = builder.create_category(CategoryInput::named("Pets")).await?;
    let mut ids = Vec::new();
    for name in ["Name", "Species", "Born"] {
        ids.push(
            builder
                .create_field(&category.id, FieldInput::new(name, FieldType::Text))
                .await?
                .id,
        );
    }

    builder.move_field(&ids[2], MoveDirection::Up).await?;
    assert_eq!(keys(&builder.fields(&category.id).await?), vec!["name", "born", "species"]);

    builder.move_field(&ids[0], MoveDirection::Up).await?;
    builder.move_field(&ids[0], MoveDirection::Down).await?;
    let stored = remote.list_fields(&category.id).await?;
    assert_eq!(keys(&stored), vec!["born", "name", "species"]);
    let orders: Vec<i64> = stored.iter().map(|f| f.sort_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    Ok(())
}

#[tokio::test]
async fn deactivated_options_still_display_but_leave_pickers() -> Result<()> {
    let store = memory_store().await;
    let remote = std::sync::Arc::new(store);
    let mut builder = Builder::open(remote.clone(), SavingFlag::new()).await?;
    let dropdown = builder
        .create_dropdown(DropdownInput {
            name: "Colour".into(),
            description: None,
        })
        .await?;
    let red = builder.add_option(&dropdown.id, OptionInput::labelled("Red")).await?;
    let blue = builder.add_option(&dropdown.id, OptionInput::labelled("Blue")).await?;
    let category = builder.create_category(CategoryInput::named("Bikes")).await?;
    let colour = builder
        .create_field(
            &category.id,
            FieldInput::new("Colour", FieldType::Dropdown).with_dropdown(&dropdown.id),
        )
        .await?;

    let retired = builder.deactivate_option(&red.id).await?;
    assert!(!retired.is_active);
    assert_eq!(retired.label, "Red");

    let choices = builder.catalog().choices(&colour);
    assert_eq!(choices, vec![(blue.id.clone(), "Blue".to_string())]);

    let lookups = builder.catalog().lookups();
    assert_eq!(codec::format(&colour, Some(&json!(red.id)), &lookups), "Red");
    assert_eq!(
        codec::normalize(&colour, &RawValue::from("red"), &lookups)?,
        Some(json!(red.id))
    );

    let new_red = builder.add_option(&dropdown.id, OptionInput::labelled("Red")).await?;
    let lookups = builder.catalog().lookups();
    assert_eq!(
        codec::normalize(&colour, &RawValue::from("Red"), &lookups)?,
        Some(json!(new_red.id))
    );
    assert_eq!(codec::format(&colour, Some(&json!(red.id)), &lookups), "Red");
    Ok(())
}

#[tokio::test]
async fn deleting_a_field_keeps_stored_values() -> Result<()> {
    let store = memory_store().await;
    let remote = std::sync::Arc::new(store);
    let mut builder = Builder::open(remote.clone(), SavingFlag::new()).await?;
    let category = builder.create_category(CategoryInput::named("Books")).await?;
    builder
        .create_field(&category.id, FieldInput::new("Title", FieldType::Text))
        .await?;
    let isbn = builder
        .create_field(&category.id, FieldInput::new("ISBN", FieldType::Text))
        .await?;
    let record = remote
        .create_record(&category.id, data(json!({ "title": "Dune", "isbn": "9780441013593" })))
        .await?;

    assert!(!builder.delete_field(&isbn.id, &Decline).await?);
    assert!(builder.delete_field(&isbn.id, &AlwaysConfirm).await?);
    assert_eq!(keys(&builder.fields(&category.id).await?), vec!["title"]);

    let stored = remote.list_records(&category.id).await?;
    assert_eq!(stored[0].id, record.id);
    assert_eq!(stored[0].data["isbn"], json!("9780441013593"));

    let err = builder.delete_field(&isbn.id, &AlwaysConfirm).await.unwrap_err();
    assert_eq!(err.code(), "FIELD/NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn builder_waits_for_other_saves() -> Result<()> {
    let flaky = FlakyStore::new(memory_store().await);
    let saving = SavingFlag::new();
    let mut builder = Builder::open(flaky.clone(), saving.clone()).await?;

    let guard = saving.begin("update")?;
    let err = builder
        .create_category(CategoryInput::named("Garden"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ACTION_BUSY);
    assert_eq!(flaky.writes(), 0);
    drop(guard);

    builder.create_category(CategoryInput::named("Garden")).await?;
    assert!(builder.message(ActionKind::Catalog).is_none());
    assert_eq!(builder.catalog().categories().len(), 1);
    Ok(())
}
