//! Catalog and field management surface.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    catalog::Catalog,
    confirm::{delete_category_prompt, delete_field_prompt, Confirm},
    model::{
        Category, CategoryInput, Dropdown, DropdownInput, DropdownOption, Field, FieldInput,
        OptionInput, Person, PersonInput,
    },
    remote::RemoteStore,
    schema::{clean_name, prepare_field_input, unique_field_key},
    status::{ActionKind, RemoteCall, SavingFlag, StatusBoard},
    AppError, AppResult, LOG_TARGET,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

fn field_not_found(id: &str) -> AppError {
    AppError::new("FIELD/NOT_FOUND", "Field not found").with_context("id", id.to_string())
}

pub struct Builder {
    catalog: Catalog,
    saving: SavingFlag,
    status: StatusBoard,
}

impl Builder {
    pub async fn open(remote: Arc<dyn RemoteStore>, saving: SavingFlag) -> AppResult<Self> {
        let mut catalog = Catalog::new(remote);
        catalog.reload().await?;
        Ok(Self::with_catalog(catalog, saving))
    }

    pub fn with_catalog(catalog: Catalog, saving: SavingFlag) -> Self {
        Self {
            catalog,
            saving,
            status: StatusBoard::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn message(&self, kind: ActionKind) -> Option<&str> {
        self.status.message(kind)
    }

    pub async fn reload(&mut self) -> AppResult<()> {
        let result = self.catalog.reload().await;
        self.status.track(ActionKind::Load, result)
    }

    pub async fn create_category(&mut self, mut input: CategoryInput) -> AppResult<Category> {
        let result = async {
            input.name = clean_name(&input.name, "Category")?;
            let _guard = self.saving.begin("create_category")?;
            let call = RemoteCall::enter("create_category", None);
            call.finish(self.catalog.create_category(input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }

    pub async fn update_category(&mut self, id: &str, mut input: CategoryInput) -> AppResult<Category> {
        let result = async {
            input.name = clean_name(&input.name, "Category")?;
            let _guard = self.saving.begin("update_category")?;
            let call = RemoteCall::enter("update_category", Some(id));
            call.finish(self.catalog.update_category(id, input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }

    /// Delete a category with its fields and records. Returns `false` when not confirmed.
    pub async fn delete_category(&mut self, id: &str, confirm: &dyn Confirm) -> AppResult<bool> {
        let name = match self.catalog.category(id) {
            Some(category) => category.name.clone(),
            None => {
                let err = AppError::new("CATEGORY/NOT_FOUND", "Category not found")
                    .with_context("id", id.to_string());
                self.status.fail(ActionKind::Catalog, &err);
                return Err(err);
            }
        };
        if !confirm.confirm(&delete_category_prompt(&name)) {
            debug!(target: LOG_TARGET, event = "delete_cancelled", category_id = id);
            return Ok(false);
        }
        let result = async {
            let _guard = self.saving.begin("delete_category")?;
            let call = RemoteCall::enter("delete_category", Some(id));
            call.finish(self.catalog.delete_category(id).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result).map(|()| true)
    }

    pub async fn fields(&mut self, category_id: &str) -> AppResult<Vec<Field>> {
        let result = self.catalog.load_schema(category_id).await;
        self.status
            .track(ActionKind::Schema, result)
            .map(|schema| schema.fields().to_vec())
    }

    /// The key a new field named `name` would receive.
    pub fn preview_key(&self, category_id: &str, name: &str) -> String {
        let existing: Vec<&str> = self
            .catalog
            .schema(category_id)
            .map(|schema| schema.keys().collect())
            .unwrap_or_default();
        unique_field_key(name, existing)
    }

    pub async fn create_field(&mut self, category_id: &str, input: FieldInput) -> AppResult<Field> {
        let result = async {
            let input = prepare_field_input(input)?;
            let _guard = self.saving.begin("create_field")?;
            let call = RemoteCall::enter("create_field", Some(category_id));
            call.finish(self.catalog.create_field(category_id, input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Schema, result)
    }

    pub async fn update_field(&mut self, id: &str, input: FieldInput) -> AppResult<Field> {
        let result = async {
            let input = prepare_field_input(input)?;
            let _guard = self.saving.begin("update_field")?;
            let call = RemoteCall::enter("update_field", None);
            call.finish(self.catalog.update_field(id, input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Schema, result)
    }

    /// Remove a column. Values already stored under its key are kept.
    pub async fn delete_field(&mut self, id: &str, confirm: &dyn Confirm) -> AppResult<bool> {
        let field = match self.catalog.field(id) {
            Some(field) => field.clone(),
            None => {
                let err = field_not_found(id);
                self.status.fail(ActionKind::Schema, &err);
                return Err(err);
            }
        };
        if !confirm.confirm(&delete_field_prompt(&field.name)) {
            return Ok(false);
        }
        let result = async {
            let _guard = self.saving.begin("delete_field")?;
            let call = RemoteCall::enter("delete_field", Some(&field.category_id));
            call.finish(self.catalog.delete_field(&field).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Schema, result).map(|()| true)
    }

    /// Swap a field with its neighbour and persist the resulting positions.
    pub async fn move_field(&mut self, id: &str, direction: MoveDirection) -> AppResult<()> {
        let result = self.try_move_field(id, direction).await;
        self.status.track(ActionKind::Schema, result)
    }

    async fn try_move_field(&mut self, id: &str, direction: MoveDirection) -> AppResult<()> {
        let field = self.catalog.field(id).cloned().ok_or_else(|| field_not_found(id))?;
        let mut ordered: Vec<Field> = self
            .catalog
            .schema(&field.category_id)
            .map(|schema| schema.fields().to_vec())
            .unwrap_or_default();
        let Some(index) = ordered.iter().position(|f| f.id == id) else {
            return Err(field_not_found(id));
        };
        let target = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < ordered.len() => index + 1,
            _ => return Ok(()),
        };
        ordered.swap(index, target);

        let _guard = self.saving.begin("move_field")?;
        let call = RemoteCall::enter("move_field", Some(&field.category_id));
        let mut changed = 0usize;
        let mut outcome = Ok(());
        for (position, current) in ordered.iter().enumerate() {
            let position = position as i64;
            if current.sort_order == position {
                continue;
            }
            let mut input = FieldInput::from(current);
            input.sort_order = Some(position);
            if let Err(err) = self.catalog.update_field(&current.id, input).await {
                outcome = Err(err);
                break;
            }
            changed += 1;
        }
        call.finish(outcome, |_| changed)?;
        info!(
            target: LOG_TARGET,
            event = "field_moved",
            field_id = id,
            category_id = %field.category_id,
            to = target
        );
        Ok(())
    }

    pub async fn create_dropdown(&mut self, mut input: DropdownInput) -> AppResult<Dropdown> {
        let result = async {
            input.name = clean_name(&input.name, "Dropdown")?;
            let _guard = self.saving.begin("create_dropdown")?;
            let call = RemoteCall::enter("create_dropdown", None);
            call.finish(self.catalog.create_dropdown(input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }

    pub async fn update_dropdown(&mut self, id: &str, mut input: DropdownInput) -> AppResult<Dropdown> {
        let result = async {
            input.name = clean_name(&input.name, "Dropdown")?;
            let _guard = self.saving.begin("update_dropdown")?;
            let call = RemoteCall::enter("update_dropdown", None);
            call.finish(self.catalog.update_dropdown(id, input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }

    pub async fn add_option(
        &mut self,
        dropdown_id: &str,
        mut input: OptionInput,
    ) -> AppResult<DropdownOption> {
        let result = async {
            input.label = clean_name(&input.label, "Option")?;
            let _guard = self.saving.begin("create_option")?;
            let call = RemoteCall::enter("create_option", None);
            call.finish(self.catalog.create_option(dropdown_id, input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }

    pub async fn update_option(&mut self, id: &str, mut input: OptionInput) -> AppResult<DropdownOption> {
        let result = async {
            input.label = clean_name(&input.label, "Option")?;
            let _guard = self.saving.begin("update_option")?;
            let call = RemoteCall::enter("update_option", None);
            call.finish(self.catalog.update_option(id, input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }

    /// Hide an option from pickers. Records that already hold it keep their value.
    pub async fn deactivate_option(&mut self, id: &str) -> AppResult<DropdownOption> {
        let Some(option) = self.catalog.option(id).cloned() else {
            let err = AppError::new("OPTION/NOT_FOUND", "Option not found")
                .with_context("id", id.to_string());
            self.status.fail(ActionKind::Catalog, &err);
            return Err(err);
        };
        let input = OptionInput {
            label: option.label,
            value: Some(option.value),
            sort_order: Some(option.sort_order),
            is_active: false,
        };
        self.update_option(id, input).await
    }

    pub async fn create_person(&mut self, mut input: PersonInput) -> AppResult<Person> {
        let result = async {
            input.name = clean_name(&input.name, "Person")?;
            let _guard = self.saving.begin("create_person")?;
            let call = RemoteCall::enter("create_person", None);
            call.finish(self.catalog.create_person(input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }

    pub async fn update_person(&mut self, id: &str, mut input: PersonInput) -> AppResult<Person> {
        let result = async {
            input.name = clean_name(&input.name, "Person")?;
            let _guard = self.saving.begin("update_person")?;
            let call = RemoteCall::enter("update_person", None);
            call.finish(self.catalog.update_person(id, input).await, |_| 1)
        }
        .await;
        self.status.track(ActionKind::Catalog, result)
    }
}
