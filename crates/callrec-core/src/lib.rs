//! callrec-core: call-record filtering across three interchangeable
//! storage backends
//!
//! The core answers one question: given a mandatory date window and
//! optional secondary attributes, which records match? A validated
//! [`FilterSpec`] is translated into a backend-native query — an in-memory
//! pass over the JSON snapshot, a filter document for the document store,
//! or a SQL predicate for the relational store — and the results normalize
//! into one canonical [`Record`] shape, deduplicated by id.
//!
//! Every pipeline is synchronous and sequential: validate → build query →
//! execute → normalize. The three backends are mutually exclusive code
//! paths selected by the caller; nothing is cached or retried.
//!
//! The write path (used by the synthetic data generator) shares the same
//! failure classification: each store archives its existing dataset under a
//! timestamped `BKP_` name before being rewritten.

pub mod backup;
pub mod config;
pub mod error;
pub mod filter;
pub mod generator;
pub mod json_store;
pub mod logging;
pub mod mongo_store;
pub mod record;
pub mod sql_store;

pub use config::Config;
pub use error::{BackendError, FilterError, Result};
pub use filter::{FilterRequest, FilterSpec};
pub use json_store::JsonStore;
pub use mongo_store::MongoStore;
pub use record::{Device, FilterResult, Record};
pub use sql_store::SqlStore;
