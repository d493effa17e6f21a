//! Per-surface action bookkeeping: the saving guard, load tickets, and the
//! last error of each action kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::{AppError, AppResult, LOG_TARGET};

pub const ACTION_BUSY: &str = "ACTION/BUSY";

/// Shared "a mutation is in flight" flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct SavingFlag {
    flag: Arc<AtomicBool>,
}

impl SavingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag for `action`, failing fast when another mutation holds it.
    pub fn begin(&self, action: &str) -> AppResult<SaveGuard> {
        if self
            .flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(target: LOG_TARGET, event = "action_busy", action);
            return Err(AppError::new(
                ACTION_BUSY,
                "Another change is still being saved. Try again in a moment.",
            )
            .with_context("action", action.to_string()));
        }
        Ok(SaveGuard {
            flag: self.flag.clone(),
        })
    }

    pub fn is_saving(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Releases the saving flag when dropped.
#[derive(Debug)]
pub struct SaveGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

/// Issues increasing tickets so only the newest load may apply its response.
#[derive(Debug, Default)]
pub struct LoadTickets {
    latest: AtomicU64,
}

impl LoadTickets {
    pub fn issue(&self) -> LoadTicket {
        LoadTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Load,
    Create,
    Update,
    Delete,
    Reorder,
    Catalog,
    Schema,
    Preferences,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Load => "load",
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Reorder => "reorder",
            ActionKind::Catalog => "catalog",
            ActionKind::Schema => "schema",
            ActionKind::Preferences => "preferences",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Brackets one remote call with `ipc_enter` / `ipc_success` / `ipc_failure` events.
#[derive(Debug)]
pub struct RemoteCall {
    cmd: &'static str,
    category_id: Option<String>,
    start: Instant,
}

impl RemoteCall {
    pub fn enter(cmd: &'static str, category_id: Option<&str>) -> Self {
        debug!(target: LOG_TARGET, event = "ipc_enter", cmd, category_id);
        Self {
            cmd,
            category_id: category_id.map(str::to_string),
            start: Instant::now(),
        }
    }

    /// Log the outcome of `result` and pass it through.
    pub fn finish<T>(self, result: AppResult<T>, row_count: impl Fn(&T) -> usize) -> AppResult<T> {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        match &result {
            Ok(value) => info!(
                target: LOG_TARGET,
                event = "ipc_success",
                cmd = self.cmd,
                category_id = self.category_id.as_deref(),
                elapsed_ms,
                row_count = row_count(value)
            ),
            Err(err) if err.is_validation() => warn!(
                target: LOG_TARGET,
                event = "ipc_failure",
                cmd = self.cmd,
                category_id = self.category_id.as_deref(),
                code = err.code(),
                message = err.message(),
                elapsed_ms
            ),
            Err(err) => error!(
                target: LOG_TARGET,
                event = "ipc_failure",
                cmd = self.cmd,
                category_id = self.category_id.as_deref(),
                code = err.code(),
                message = err.message(),
                elapsed_ms
            ),
        }
        result
    }
}

/// Last failure per action kind. An error stays until the same kind succeeds.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    errors: HashMap<ActionKind, AppError>,
}

impl StatusBoard {
    pub fn fail(&mut self, kind: ActionKind, err: &AppError) {
        debug!(target: LOG_TARGET, event = "status_error_set", action = %kind, code = %err.code());
        self.errors.insert(kind, err.clone());
    }

    pub fn succeed(&mut self, kind: ActionKind) {
        self.errors.remove(&kind);
    }

    /// Record the outcome of `result` and pass it through.
    pub fn track<T>(&mut self, kind: ActionKind, result: AppResult<T>) -> AppResult<T> {
        match &result {
            Ok(_) => self.succeed(kind),
            Err(err) => self.fail(kind, err),
        }
        result
    }

    pub fn error(&self, kind: ActionKind) -> Option<&AppError> {
        self.errors.get(&kind)
    }

    /// Text to show for `kind`, if it last failed.
    pub fn message(&self, kind: ActionKind) -> Option<&str> {
        self.error(kind).map(AppError::user_message)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}
