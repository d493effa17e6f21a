//! The active category as a surface sees it: catalog, schema, lookups and records.

use std::sync::Arc;

use tracing::info;

use crate::{
    catalog::Catalog,
    codec::Lookups,
    model::{Category, Field},
    records::RecordStore,
    remote::RemoteStore,
    schema::FieldSchema,
    status::SavingFlag,
    view::{build_rows, DisplayRow},
    AppError, AppResult, LOG_TARGET,
};

pub struct CategorySession {
    catalog: Catalog,
    records: RecordStore,
    lookups: Lookups,
}

impl CategorySession {
    /// Load the catalog, then the category's schema, link titles and records.
    pub async fn open(
        remote: Arc<dyn RemoteStore>,
        category_id: &str,
        saving: SavingFlag,
    ) -> AppResult<Self> {
        let mut catalog = Catalog::new(remote.clone());
        catalog.reload().await?;
        Self::with_catalog(catalog, category_id, saving).await
    }

    pub async fn with_catalog(
        mut catalog: Catalog,
        category_id: &str,
        saving: SavingFlag,
    ) -> AppResult<Self> {
        if catalog.category(category_id).is_none() {
            return Err(AppError::new("CATEGORY/NOT_FOUND", "Category not found")
                .with_context("id", category_id.to_string()));
        }
        let schema = catalog.load_schema(category_id).await?;
        catalog.load_link_titles(&schema).await?;
        let lookups = catalog.lookups();
        let mut records = RecordStore::new(catalog.remote(), category_id, schema, saving);
        records.load().await?;
        info!(
            target: LOG_TARGET,
            event = "category_opened",
            category_id,
            fields = records.schema().len(),
            records = records.records().len()
        );
        Ok(Self {
            catalog,
            records,
            lookups,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut RecordStore {
        &mut self.records
    }

    /// Record store and lookups borrowed together for edits.
    pub fn records_and_lookups(&mut self) -> (&mut RecordStore, &Lookups) {
        (&mut self.records, &self.lookups)
    }

    pub fn lookups(&self) -> &Lookups {
        &self.lookups
    }

    pub fn schema(&self) -> &FieldSchema {
        self.records.schema()
    }

    pub fn category_id(&self) -> &str {
        self.records.category_id()
    }

    pub fn category(&self) -> Option<&Category> {
        self.catalog.category(self.records.category_id())
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.schema().get(key)
    }

    /// Picker choices for the field at `key`.
    pub fn choices(&self, key: &str) -> Vec<(String, String)> {
        self.field(key)
            .map(|field| self.catalog.choices(field))
            .unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<DisplayRow> {
        build_rows(self.records.records(), self.schema(), &self.lookups)
    }

    /// Re-read link titles so new or renamed linked records resolve.
    pub async fn refresh_lookups(&mut self) -> AppResult<()> {
        let schema = self.schema().clone();
        self.catalog.load_link_titles(&schema).await?;
        self.lookups = self.catalog.lookups();
        Ok(())
    }

    /// Re-read everything: catalog, schema, lookups, records.
    pub async fn reload(&mut self) -> AppResult<()> {
        let category_id = self.category_id().to_string();
        self.catalog.reload().await?;
        let schema = self.catalog.load_schema(&category_id).await?;
        self.catalog.load_link_titles(&schema).await?;
        self.lookups = self.catalog.lookups();
        self.records.set_schema(schema);
        self.records.load().await
    }
}
