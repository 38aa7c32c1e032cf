//! tasklist Core Library
//!
//! This crate provides the client-side core of tasklist: a local snapshot
//! of a remote task collection that is kept in sync through optimistic
//! updates and rollbacks.
//!
//! # Architecture
//!
//! - **Remote task service**: source of truth, reached through the
//!   `TaskService` trait (HTTP in production, in-memory in tests)
//! - **Sync store**: owns the snapshot the view renders and reconciles it
//!   with every service response
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let service = HttpTaskService::from_config(&config)?;
//! let store = SyncStore::new(service).with_batch_policy(config.batch_policy);
//!
//! store.load_all().await;
//! store.create("Buy milk").await;
//!
//! let snapshot = store.snapshot();
//! ```
//!
//! # Modules
//!
//! - `store`: Synchronization store (main entry point)
//! - `service`: Remote task service contract and adapters
//! - `models`: Task record and view helpers
//! - `error`: Service and store errors
//! - `config`: Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use config::{BatchPolicy, Config};
pub use error::{ServiceError, ServiceResult, StoreError};
pub use models::{Task, TaskCounts, TaskFilter};
pub use service::{HttpTaskService, InMemoryTaskService, ServiceOp, TaskService};
pub use store::{Phase, RollbackFragment, Snapshot, SyncStore};
