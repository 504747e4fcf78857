//! # docrules-core
//!
//! Shared data model for the docrules write-authorization engine.
//!
//! - [`value`] - typed field values, including the server-timestamp sentinel
//! - [`time`] - RFC 3339 timestamps
//! - [`document`] - documents and nested field lookup
//! - [`field_path`] - dotted field paths
//! - [`path`] - concrete document paths
//! - [`auth`] - the authentication context of a request
//! - [`request`] - write requests and their shape invariants

pub mod auth;
pub mod document;
pub mod error;
pub mod field_path;
pub mod path;
pub mod request;
pub mod time;
pub mod value;

pub use auth::{AuthContext, Identity};
pub use document::Document;
pub use error::{CoreError, Result};
pub use field_path::FieldPath;
pub use path::DocumentPath;
pub use request::{Operation, WriteRequest};
pub use time::{Timestamp, now_utc};
pub use value::{FieldValue, ValueKind};
