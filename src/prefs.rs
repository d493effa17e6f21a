//! Per-category view preferences and their backends.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;

use crate::{
    schema::FieldSchema,
    view::{ColumnFilters, SortSpec},
    AppError, AppResult, LOG_TARGET,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "bindings/")]
pub struct ViewPrefs {
    pub sort: SortSpec,
    #[ts(type = "Record<string, string[]>")]
    pub filters: ColumnFilters,
    #[ts(type = "Record<string, boolean>")]
    pub visibility: BTreeMap<String, bool>,
    #[ts(type = "Record<string, number>")]
    pub widths: BTreeMap<String, u32>,
}

impl ViewPrefs {
    /// Every field visible at `width`, natural ascending sort, no filters.
    pub fn defaults(schema: &FieldSchema, width: u32) -> Self {
        Self {
            sort: SortSpec::natural(),
            filters: ColumnFilters::new(),
            visibility: schema.keys().map(|key| (key.to_string(), true)).collect(),
            widths: schema.keys().map(|key| (key.to_string(), width)).collect(),
        }
    }

    /// Stored entries layered over fresh defaults. Entries for fields that no
    /// longer exist are dropped; a sort on a removed field reverts to natural.
    pub fn merged(schema: &FieldSchema, width: u32, stored: Option<&ViewPrefs>) -> Self {
        let mut prefs = Self::defaults(schema, width);
        let Some(stored) = stored else {
            return prefs;
        };
        let known = |key: &str| schema.get(key).is_some();

        if stored.sort.is_natural() || known(stored.sort.key.as_str()) {
            prefs.sort = stored.sort.clone();
        }
        for (key, visible) in &stored.visibility {
            if known(key.as_str()) {
                prefs.visibility.insert(key.clone(), *visible);
            }
        }
        for (key, stored_width) in &stored.widths {
            if known(key.as_str()) && *stored_width > 0 {
                prefs.widths.insert(key.clone(), *stored_width);
            }
        }
        prefs.filters = stored
            .filters
            .iter()
            .filter(|(key, accepted)| known(key.as_str()) && !accepted.is_empty())
            .map(|(key, accepted)| (key.clone(), accepted.clone()))
            .collect();
        prefs
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visibility.get(key).copied().unwrap_or(true)
    }

    pub fn width(&self, key: &str, fallback: u32) -> u32 {
        self.widths.get(key).copied().unwrap_or(fallback)
    }
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to read preferences from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write preferences to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("preferences file {path} is not valid JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode preferences")]
    Encode(#[from] serde_json::Error),
    #[error("preferences store lock poisoned")]
    Poisoned,
}

impl PrefsError {
    pub fn code(&self) -> &'static str {
        match self {
            PrefsError::Read { .. } => "PREFS/READ",
            PrefsError::Write { .. } => "PREFS/WRITE",
            PrefsError::Parse { .. } => "PREFS/PARSE",
            PrefsError::Encode(_) => "PREFS/ENCODE",
            PrefsError::Poisoned => "PREFS/POISONED",
        }
    }
}

impl From<PrefsError> for AppError {
    fn from(err: PrefsError) -> Self {
        let mut app = AppError::new(err.code(), "Could not save view settings");
        match &err {
            PrefsError::Read { path, source } | PrefsError::Write { path, source } => {
                app = app
                    .with_context("path", path.display().to_string())
                    .with_cause(AppError::new(
                        format!("IO/{:?}", source.kind()),
                        source.to_string(),
                    ));
            }
            PrefsError::Parse { path, source } => {
                app = app
                    .with_context("path", path.display().to_string())
                    .with_cause(AppError::new("JSON/SYNTAX", source.to_string()));
            }
            PrefsError::Encode(source) => {
                app = app.with_cause(AppError::new("JSON/ERROR", source.to_string()));
            }
            PrefsError::Poisoned => {}
        }
        app
    }
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self, category_id: &str) -> Result<Option<ViewPrefs>, PrefsError>;
    fn save(&self, category_id: &str, prefs: &ViewPrefs) -> Result<(), PrefsError>;
}

#[derive(Default)]
pub struct MemoryPrefs {
    data: Mutex<HashMap<String, ViewPrefs>>,
}

impl PreferenceStore for MemoryPrefs {
    fn load(&self, category_id: &str) -> Result<Option<ViewPrefs>, PrefsError> {
        let guard = self.data.lock().map_err(|_| PrefsError::Poisoned)?;
        Ok(guard.get(category_id).cloned())
    }

    fn save(&self, category_id: &str, prefs: &ViewPrefs) -> Result<(), PrefsError> {
        let mut guard = self.data.lock().map_err(|_| PrefsError::Poisoned)?;
        guard.insert(category_id.to_string(), prefs.clone());
        Ok(())
    }
}

/// All categories' preferences in one JSON object keyed by category Id.
pub struct JsonFilePrefs {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFilePrefs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, ViewPrefs>, PrefsError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(PrefsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| PrefsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, all: &BTreeMap<String, ViewPrefs>) -> Result<(), PrefsError> {
        let write_err = |source| PrefsError::Write {
            path: self.path.clone(),
            source,
        };
        let bytes = serde_json::to_vec_pretty(all)?;
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

impl PreferenceStore for JsonFilePrefs {
    fn load(&self, category_id: &str) -> Result<Option<ViewPrefs>, PrefsError> {
        let _guard = self.lock.lock().map_err(|_| PrefsError::Poisoned)?;
        Ok(self.read_all()?.remove(category_id))
    }

    fn save(&self, category_id: &str, prefs: &ViewPrefs) -> Result<(), PrefsError> {
        let _guard = self.lock.lock().map_err(|_| PrefsError::Poisoned)?;
        let mut all = self.read_all()?;
        all.insert(category_id.to_string(), prefs.clone());
        self.write_all(&all)
    }
}

#[derive(Clone)]
pub struct PrefsHandle {
    inner: Arc<dyn PreferenceStore>,
}

impl PrefsHandle {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(MemoryPrefs::default()),
        }
    }

    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(JsonFilePrefs::new(path)),
        }
    }

    pub fn from_store(store: Arc<dyn PreferenceStore>) -> Self {
        Self { inner: store }
    }

    /// Stored preferences for `category_id` merged over defaults for `schema`.
    pub fn load_merged(
        &self,
        category_id: &str,
        schema: &FieldSchema,
        width: u32,
    ) -> AppResult<ViewPrefs> {
        let stored = self.inner.load(category_id)?;
        debug!(
            target: LOG_TARGET,
            event = "view_prefs_loaded",
            category_id,
            stored = stored.is_some()
        );
        Ok(ViewPrefs::merged(schema, width, stored.as_ref()))
    }

    pub fn save(&self, category_id: &str, prefs: &ViewPrefs) -> AppResult<()> {
        self.inner.save(category_id, prefs)?;
        info!(target: LOG_TARGET, event = "view_prefs_saved", category_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldType};
    use crate::view::SortDirection;
    use tempfile::tempdir;

    fn schema(keys: &[&str]) -> FieldSchema {
        FieldSchema::new(
            keys.iter()
                .enumerate()
                .map(|(i, key)| Field {
                    id: format!("f-{key}"),
                    category_id: "c".into(),
                    name: key.to_string(),
                    key: key.to_string(),
                    field_type: FieldType::Text,
                    is_required: false,
                    is_multi: false,
                    sort_order: i as i64,
                    dropdown_id: None,
                    linked_category_id: None,
                    created_at: 0,
                    updated_at: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn new_fields_default_visible_and_stale_entries_drop() {
        let old = schema(&["item", "notes"]);
        let mut stored = ViewPrefs::defaults(&old, 160);
        stored.visibility.insert("notes".into(), false);
        stored.widths.insert("item".into(), 300);
        stored.sort = SortSpec::by("notes", SortDirection::Desc);
        stored
            .filters
            .insert("notes".into(), ["x".to_string()].into_iter().collect());

        let current = schema(&["item", "expires"]);
        let merged = ViewPrefs::merged(&current, 160, Some(&stored));
        assert!(merged.is_visible("expires"));
        assert!(!merged.visibility.contains_key("notes"));
        assert_eq!(merged.width("item", 160), 300);
        assert_eq!(merged.width("expires", 0), 160);
        assert!(merged.sort.is_natural_ascending());
        assert!(merged.filters.is_empty());
    }

    #[test]
    fn hidden_columns_survive_merge() {
        let current = schema(&["item", "expires"]);
        let mut stored = ViewPrefs::defaults(&current, 120);
        stored.visibility.insert("expires".into(), false);
        stored.sort = SortSpec::by("expires", SortDirection::Asc);
        let merged = ViewPrefs::merged(&current, 160, Some(&stored));
        assert!(!merged.is_visible("expires"));
        assert_eq!(merged.sort, SortSpec::by("expires", SortDirection::Asc));
        assert_eq!(merged.width("item", 0), 120);
    }

    #[test]
    fn json_file_store_persists_per_category() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let current = schema(&["item"]);
        let handle = PrefsHandle::json_file(&path);

        let mut prefs = handle.load_merged("warranties", &current, 160).unwrap();
        prefs.widths.insert("item".into(), 222);
        handle.save("warranties", &prefs).unwrap();
        handle
            .save("insurance", &ViewPrefs::defaults(&current, 90))
            .unwrap();

        let reopened = PrefsHandle::json_file(&path);
        let loaded = reopened.load_merged("warranties", &current, 160).unwrap();
        assert_eq!(loaded.width("item", 0), 222);
        let other = reopened.load_merged("insurance", &current, 160).unwrap();
        assert_eq!(other.width("item", 0), 90);
    }

    #[test]
    fn corrupt_file_reports_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = PrefsHandle::json_file(&path)
            .load_merged("c", &schema(&["item"]), 160)
            .unwrap_err();
        assert_eq!(err.code(), "PREFS/PARSE");
    }
}
