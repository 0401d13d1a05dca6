//! # auditrail-core
//!
//! Structured audit events and the recorder/storage contract.
//!
//! This crate provides:
//! - [`Event`], [`Actor`] and [`Target`]: the audit record schema
//! - [`Recorder`]: assigns IDs and timestamps, validates, and persists
//! - [`Storage`]: the contract every backend implements, with
//!   [`MemoryStorage`] as the reference implementation
//! - [`Query`]: filters whose semantics every backend reproduces
//! - [`EasyRecorder`]: record from loose key/value arguments
//!
//! ## Query semantics
//!
//! | Rule | Behavior |
//! |------|----------|
//! | Equality filters | tenant, actor ID, action, target ID; AND-ed; empty = ignored |
//! | Time bounds | `since` and `until`, both inclusive |
//! | Ordering | ascending by timestamp |
//! | Limit | applied after filtering and ordering; 0 = unbounded |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use auditrail_core::{Context, Event, MemoryStorage, Query, Recorder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = Recorder::new(Arc::new(MemoryStorage::new()));
//! let ctx = Context::background();
//!
//! recorder
//!     .record(&ctx, Event::builder("acme", "login").actor_id("u1").build())
//!     .await?;
//!
//! let logins = recorder.query(&ctx, &Query::for_tenant("acme").action("login")).await?;
//! assert_eq!(logins.len(), 1);
//! # Ok(())
//! # }
//! ```

#[cfg(any(test, feature = "test-util"))]
pub mod conformance;
pub mod context;
pub mod error;
pub mod event;
pub mod query;
pub mod recorder;
pub mod simple;
pub mod storage;

pub use context::Context;
pub use error::{AuditError, ErrorKind};
pub use event::{Actor, Attributes, Event, EventBuilder, Target};
pub use query::Query;
pub use recorder::{Clock, IdGenerator, Recorder, SystemClock, UuidGenerator};
pub use simple::{EasyRecorder, SimpleRecorder};
pub use storage::{MemoryStorage, Storage};
