//! Household record categories: user-defined typed columns over a sparse
//! attribute store, with grid, card and builder surfaces.

pub mod builder;
pub mod cards;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod confirm;
pub mod db;
pub mod error;
pub mod grid;
pub mod id;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod prefs;
pub mod records;
pub mod remote;
pub mod reorder;
pub mod repo;
pub mod schema;
pub mod session;
pub mod status;
pub mod time;
pub mod view;

pub use error::{AppError, AppResult};
pub use logging::{init_file_logging, init_logging};
pub use repo::SqliteStore;

/// `tracing` target for every event this crate emits.
pub const LOG_TARGET: &str = "homeledger";
