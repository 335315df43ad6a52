//! External adapters for the metawatch daemon.
//!
//! The core crate only knows the [`SourceDatabase`] and [`SlotBackend`]
//! traits. This crate binds them to real infrastructure:
//!
//! ```text
//! SourceReader --> PostgresSource --> legacy PostgreSQL (read-only)
//! StateStore ----> FileSlot -------> storage.json (atomic replace)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` pool configuration and the source adapter
//! - [`file_slot`] -- Single-file state slot
//! - [`error`] -- Connection and configuration errors
//!
//! [`SourceDatabase`]: metawatch_core::SourceDatabase
//! [`SlotBackend`]: metawatch_core::SlotBackend

pub mod error;
pub mod file_slot;
pub mod postgres;

pub use error::DbError;
pub use file_slot::FileSlot;
pub use postgres::{PostgresConfig, PostgresSource};
