//! `PostgreSQL` record store for the helpdesk services.
//!
//! This crate provides [`PostgresRecordStore`], implementing every
//! repository trait from `helpdesk-core` on top of sqlx:
//!
//! - Connection pooling configured from the environment
//! - Embedded migrations
//! - Row locks for status changes and resolutions
//! - Conditional resolve backed by a unique index on resolutions
//!
//! # Example
//!
//! ```ignore
//! use helpdesk_core::prelude::*;
//! use helpdesk_postgres::{PostgresConfig, PostgresRecordStore};
//! use std::sync::Arc;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresRecordStore::connect(&PostgresConfig::from_env()).await?;
//!     store.migrate().await?;
//!     let tickets = TicketService::new(Arc::new(store), Arc::new(SystemClock), LifecycleConfig::default());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod store;

pub use config::PostgresConfig;
pub use store::PostgresRecordStore;
