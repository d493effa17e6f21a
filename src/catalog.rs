//! Cached category, dropdown, people and field-schema definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    codec::{LookupTable, Lookups},
    model::{
        Category, CategoryInput, Dropdown, DropdownInput, DropdownOption, Field, FieldInput,
        FieldType, OptionInput, Person, PersonInput, RecordTitle,
    },
    remote::RemoteStore,
    schema::FieldSchema,
    status::{LoadTicket, LoadTickets},
    AppResult, LOG_TARGET,
};

/// One consistent read of the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub categories: Vec<Category>,
    pub dropdowns: Vec<Dropdown>,
    pub options: HashMap<String, Vec<DropdownOption>>,
    pub people: Vec<Person>,
}

pub async fn fetch_snapshot(remote: &dyn RemoteStore) -> AppResult<CatalogSnapshot> {
    let categories = remote.list_categories().await?;
    let dropdowns = remote.list_dropdowns().await?;
    let mut options = HashMap::with_capacity(dropdowns.len());
    for dropdown in &dropdowns {
        options.insert(dropdown.id.clone(), remote.list_options(&dropdown.id).await?);
    }
    let people = remote.list_people().await?;
    Ok(CatalogSnapshot {
        categories,
        dropdowns,
        options,
        people,
    })
}

pub struct Catalog {
    remote: Arc<dyn RemoteStore>,
    snapshot: CatalogSnapshot,
    schemas: HashMap<String, FieldSchema>,
    titles: HashMap<String, Vec<RecordTitle>>,
    catalog_tickets: LoadTickets,
    schema_tickets: LoadTickets,
    title_tickets: LoadTickets,
}

impl Catalog {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            snapshot: CatalogSnapshot::default(),
            schemas: HashMap::new(),
            titles: HashMap::new(),
            catalog_tickets: LoadTickets::default(),
            schema_tickets: LoadTickets::default(),
            title_tickets: LoadTickets::default(),
        }
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    pub fn begin_reload(&self) -> LoadTicket {
        self.catalog_tickets.issue()
    }

    /// Apply a fetched snapshot unless a newer reload was started. Returns whether it applied.
    pub fn apply_reload(&mut self, ticket: LoadTicket, snapshot: CatalogSnapshot) -> bool {
        if !self.catalog_tickets.is_current(ticket) {
            debug!(target: LOG_TARGET, event = "catalog_load_stale", ticket = ?ticket);
            return false;
        }
        info!(
            target: LOG_TARGET,
            event = "catalog_loaded",
            categories = snapshot.categories.len(),
            dropdowns = snapshot.dropdowns.len(),
            people = snapshot.people.len()
        );
        self.snapshot = snapshot;
        true
    }

    pub async fn reload(&mut self) -> AppResult<()> {
        let ticket = self.begin_reload();
        let snapshot = fetch_snapshot(self.remote.as_ref()).await?;
        self.apply_reload(ticket, snapshot);
        Ok(())
    }

    pub fn categories(&self) -> &[Category] {
        &self.snapshot.categories
    }

    pub fn active_categories(&self) -> impl Iterator<Item = &Category> {
        self.snapshot.categories.iter().filter(|c| c.is_active)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.snapshot.categories.iter().find(|c| c.id == id)
    }

    pub fn dropdowns(&self) -> &[Dropdown] {
        &self.snapshot.dropdowns
    }

    pub fn options(&self, dropdown_id: &str) -> &[DropdownOption] {
        self.snapshot
            .options
            .get(dropdown_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn people(&self) -> &[Person] {
        &self.snapshot.people
    }

    fn sort_categories(&mut self) {
        self.snapshot.categories.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    pub async fn create_category(&mut self, input: CategoryInput) -> AppResult<Category> {
        let created = self.remote.create_category(input).await?;
        self.snapshot.categories.push(created.clone());
        self.sort_categories();
        Ok(created)
    }

    pub async fn update_category(&mut self, id: &str, input: CategoryInput) -> AppResult<Category> {
        let updated = self.remote.update_category(id, input).await?;
        if let Some(slot) = self.snapshot.categories.iter_mut().find(|c| c.id == id) {
            *slot = updated.clone();
        }
        self.sort_categories();
        Ok(updated)
    }

    /// Remote delete, then drop the category and everything cached under it.
    pub async fn delete_category(&mut self, id: &str) -> AppResult<()> {
        self.remote.delete_category(id).await?;
        self.snapshot.categories.retain(|c| c.id != id);
        self.schemas.remove(id);
        self.titles.remove(id);
        Ok(())
    }

    pub async fn create_dropdown(&mut self, input: DropdownInput) -> AppResult<Dropdown> {
        let created = self.remote.create_dropdown(input).await?;
        self.snapshot.dropdowns.push(created.clone());
        self.snapshot.options.entry(created.id.clone()).or_default();
        Ok(created)
    }

    pub async fn update_dropdown(&mut self, id: &str, input: DropdownInput) -> AppResult<Dropdown> {
        let updated = self.remote.update_dropdown(id, input).await?;
        if let Some(slot) = self.snapshot.dropdowns.iter_mut().find(|d| d.id == id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    pub async fn create_option(
        &mut self,
        dropdown_id: &str,
        input: OptionInput,
    ) -> AppResult<DropdownOption> {
        let created = self.remote.create_option(dropdown_id, input).await?;
        let options = self
            .snapshot
            .options
            .entry(dropdown_id.to_string())
            .or_default();
        options.push(created.clone());
        options.sort_by_key(|o| o.sort_order);
        Ok(created)
    }

    pub async fn update_option(&mut self, id: &str, input: OptionInput) -> AppResult<DropdownOption> {
        let updated = self.remote.update_option(id, input).await?;
        if let Some(options) = self.snapshot.options.get_mut(&updated.dropdown_id) {
            if let Some(slot) = options.iter_mut().find(|o| o.id == id) {
                *slot = updated.clone();
            }
            options.sort_by_key(|o| o.sort_order);
        }
        Ok(updated)
    }

    pub fn option(&self, id: &str) -> Option<&DropdownOption> {
        self.snapshot
            .options
            .values()
            .flat_map(|options| options.iter())
            .find(|o| o.id == id)
    }

    pub async fn create_person(&mut self, input: PersonInput) -> AppResult<Person> {
        let created = self.remote.create_person(input).await?;
        self.snapshot.people.push(created.clone());
        self.snapshot.people.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(created)
    }

    pub async fn update_person(&mut self, id: &str, input: PersonInput) -> AppResult<Person> {
        let updated = self.remote.update_person(id, input).await?;
        if let Some(slot) = self.snapshot.people.iter_mut().find(|p| p.id == id) {
            *slot = updated.clone();
        }
        self.snapshot.people.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(updated)
    }

    /// Fetch a category's fields into the schema cache.
    pub async fn load_schema(&mut self, category_id: &str) -> AppResult<FieldSchema> {
        let ticket = self.schema_tickets.issue();
        let fields = self.remote.list_fields(category_id).await?;
        let schema = FieldSchema::new(fields);
        if self.schema_tickets.is_current(ticket) {
            self.schemas.insert(category_id.to_string(), schema.clone());
        } else {
            debug!(target: LOG_TARGET, event = "schema_load_stale", category_id);
        }
        Ok(schema)
    }

    pub fn schema(&self, category_id: &str) -> Option<&FieldSchema> {
        self.schemas.get(category_id)
    }

    fn replace_field(&mut self, field: &Field) {
        let mut fields: Vec<Field> = self
            .schemas
            .get(&field.category_id)
            .map(|schema| schema.fields().to_vec())
            .unwrap_or_default();
        match fields.iter_mut().find(|f| f.id == field.id) {
            Some(slot) => *slot = field.clone(),
            None => fields.push(field.clone()),
        }
        self.schemas
            .insert(field.category_id.clone(), FieldSchema::new(fields));
    }

    pub async fn create_field(&mut self, category_id: &str, input: FieldInput) -> AppResult<Field> {
        let created = self.remote.create_field(category_id, input).await?;
        self.replace_field(&created);
        Ok(created)
    }

    pub async fn update_field(&mut self, id: &str, input: FieldInput) -> AppResult<Field> {
        let updated = self.remote.update_field(id, input).await?;
        self.replace_field(&updated);
        Ok(updated)
    }

    pub async fn delete_field(&mut self, field: &Field) -> AppResult<()> {
        self.remote.delete_field(&field.id).await?;
        if let Some(schema) = self.schemas.get(&field.category_id) {
            let fields = schema
                .fields()
                .iter()
                .filter(|f| f.id != field.id)
                .cloned()
                .collect();
            self.schemas
                .insert(field.category_id.clone(), FieldSchema::new(fields));
        }
        Ok(())
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.schemas
            .values()
            .flat_map(|schema| schema.fields().iter())
            .find(|f| f.id == field_id)
    }

    /// Refresh record titles for every category linked from `schema`.
    pub async fn load_link_titles(&mut self, schema: &FieldSchema) -> AppResult<()> {
        let ticket = self.title_tickets.issue();
        let mut fetched = HashMap::new();
        for field in schema.fields() {
            if field.field_type != FieldType::RecordLink {
                continue;
            }
            if let Some(target) = field.linked_category_id.as_deref() {
                if !fetched.contains_key(target) {
                    fetched.insert(target.to_string(), self.remote.lookup_records(target).await?);
                }
            }
        }
        if self.title_tickets.is_current(ticket) {
            self.titles.extend(fetched);
        } else {
            debug!(target: LOG_TARGET, event = "lookup_load_stale", ticket = ?ticket);
        }
        Ok(())
    }

    pub fn record_titles(&self, category_id: &str) -> &[RecordTitle] {
        self.titles
            .get(category_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Lookup tables for formatting and normalizing values. Inactive options
    /// still resolve so existing values keep their labels, but a live option
    /// owns any label they share.
    pub fn lookups(&self) -> Lookups {
        let mut lookups = Lookups::default();
        for (dropdown_id, options) in &self.snapshot.options {
            let entry = |o: &DropdownOption| (o.id.clone(), o.label.clone());
            let (live, retired): (Vec<_>, Vec<_>) = options.iter().partition(|o| o.is_active);
            lookups.set_dropdown(
                dropdown_id.clone(),
                LookupTable::from_entries(live.into_iter().map(entry))
                    .with_retired(retired.into_iter().map(entry)),
            );
        }
        lookups.set_people(LookupTable::from_entries(
            self.snapshot
                .people
                .iter()
                .map(|p| (p.id.clone(), p.name.clone())),
        ));
        for (category_id, titles) in &self.titles {
            lookups.set_records(
                category_id.clone(),
                LookupTable::from_entries(titles.iter().map(|t| (t.id.clone(), t.title.clone()))),
            );
        }
        lookups
    }

    /// `(id, label)` choices offered by a picker for `field`; inactive options are left out.
    pub fn choices(&self, field: &Field) -> Vec<(String, String)> {
        match field.field_type {
            FieldType::Dropdown => field
                .dropdown_id
                .as_deref()
                .map(|id| {
                    self.options(id)
                        .iter()
                        .filter(|o| o.is_active)
                        .map(|o| (o.id.clone(), o.label.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            FieldType::Person => self
                .people()
                .iter()
                .map(|p| (p.id.clone(), p.name.clone()))
                .collect(),
            FieldType::RecordLink => field
                .linked_category_id
                .as_deref()
                .map(|id| {
                    self.record_titles(id)
                        .iter()
                        .map(|t| (t.id.clone(), t.title.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            FieldType::Text
            | FieldType::LongText
            | FieldType::Number
            | FieldType::Currency
            | FieldType::Date
            | FieldType::DateRange
            | FieldType::Boolean => Vec::new(),
        }
    }
}
