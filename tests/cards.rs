use std::sync::Arc;

use anyhow::Result;
use homeledger_lib::{
    cards::{CardMode, CardSurface, VALIDATION_INVALID_INPUT, VALIDATION_NOTHING_TO_SAVE},
    codec::CODEC_INVALID_NUMBER,
    confirm::AlwaysConfirm,
    model::{CategoryInput, FieldInput, FieldType, PersonInput},
    records::{Deletion, VALIDATION_REQUIRED},
    remote::RemoteStore,
    status::SavingFlag,
};
use serde_json::json;

#[path = "util.rs"]
mod util;

use util::memory_store;

struct Vehicles {
    remote: Arc<dyn RemoteStore>,
    category_id: String,
    owner_id: String,
}

async fn vehicles() -> Vehicles {
    let remote: Arc<dyn RemoteStore> = Arc::new(memory_store().await);
    let owner = remote
        .create_person(PersonInput {
            name: "Sam".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let category = remote
        .create_category(CategoryInput::named("Vehicles"))
        .await
        .unwrap();
    for input in [
        FieldInput::new("Registration", FieldType::Text).required(),
        FieldInput::new("Mileage", FieldType::Number),
        FieldInput::new("Owner", FieldType::Person),
    ] {
        remote.create_field(&category.id, input).await.unwrap();
    }
    Vehicles {
        remote,
        category_id: category.id,
        owner_id: owner.id,
    }
}

#[tokio::test]
async fn add_card_saves_then_becomes_an_edit_card() -> Result<()> {
    let fixture = vehicles().await;
    let mut surface =
        CardSurface::open(fixture.remote.clone(), &fixture.category_id, SavingFlag::new()).await?;
    assert!(surface.cards().is_empty());
    assert_eq!(surface.choices("owner"), vec![(fixture.owner_id.clone(), "Sam".to_string())]);

    surface.begin_add();
    assert!(!surface.can_save());
    surface.set_field("owner", "sam")?;
    assert_eq!(surface.display("owner"), "Sam");

    let err = surface.save().await.unwrap_err();
    assert_eq!(err.code(), VALIDATION_REQUIRED);
    assert_eq!(err.context().get("fields").map(String::as_str), Some("registration"));

    let err = surface.set_field("mileage", "lots").unwrap_err();
    assert_eq!(err.code(), CODEC_INVALID_NUMBER);
    surface.set_field("registration", "AB12 CDE")?;
    assert!(!surface.can_save());
    assert_eq!(surface.save().await.unwrap_err().code(), VALIDATION_INVALID_INPUT);

    surface.set_field("mileage", "42000")?;
    assert!(surface.can_save());
    let saved = surface.save().await?;
    assert_eq!(saved.data["mileage"], json!(42000));
    assert_eq!(saved.data["owner"], json!(fixture.owner_id));

    let card = surface.card().expect("card stays open");
    assert_eq!(
        card.mode(),
        &CardMode::Edit {
            record_id: saved.id.clone()
        }
    );
    assert!(!surface.can_save());
    assert_eq!(surface.save().await.unwrap_err().code(), VALIDATION_NOTHING_TO_SAVE);

    let cards = surface.cards();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].title, "AB12 CDE");
    assert_eq!(
        cards[0].lines,
        vec![
            ("Registration".to_string(), "AB12 CDE".to_string()),
            ("Mileage".to_string(), "42000".to_string()),
            ("Owner".to_string(), "Sam".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn edit_card_updates_only_on_material_change() -> Result<()> {
    let fixture = vehicles().await;
    let record = fixture
        .remote
        .create_record(
            &fixture.category_id,
            json!({ "registration": "XY99 ZZZ", "mileage": 1200 })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .await?;
    let mut surface =
        CardSurface::open(fixture.remote.clone(), &fixture.category_id, SavingFlag::new()).await?;

    surface.begin_edit(&record.id)?;
    surface.set_field("mileage", "1200.0")?;
    surface.set_field("registration", " XY99 ZZZ ")?;
    assert!(!surface.can_save());

    surface.set_field("mileage", "1350")?;
    assert!(surface.can_save());
    let saved = surface.save().await?;
    assert_eq!(saved.id, record.id);
    assert_eq!(saved.data["mileage"], json!(1350));
    let cached = surface.session().records().record(&record.id).unwrap();
    assert_eq!(cached.data["mileage"], json!(1350));

    assert_eq!(surface.delete_open(&AlwaysConfirm).await?, Deletion::Deleted(1));
    assert!(surface.card().is_none());
    assert!(surface.cards().is_empty());
    Ok(())
}
