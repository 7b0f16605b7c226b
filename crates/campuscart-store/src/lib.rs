//! # campuscart-store
//!
//! Relational storage for the CampusCart marketplace, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed repository helpers for posts,
//! trade requests, chat messages and profiles. Rows are mapped into the
//! records of [`models`] at this boundary; nothing above the store sees raw
//! SQL rows.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod profiles;
pub mod requests;

mod error;
mod rows;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
