/// Asks the user to approve a destructive action before any call is issued.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Approves everything. Used by non-interactive callers that already asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

pub fn delete_records_prompt(count: usize) -> String {
    if count == 1 {
        "Delete this record? This cannot be undone.".to_string()
    } else {
        format!("Delete {count} records? This cannot be undone.")
    }
}

pub fn delete_category_prompt(name: &str) -> String {
    format!("Delete category \"{name}\" with all its fields and records? This cannot be undone.")
}

pub fn delete_field_prompt(name: &str) -> String {
    format!("Delete field \"{name}\"? Existing values stay stored but the column is removed.")
}
