//! Document tree adapter for the pact processing engine.
//!
//! This crate provides the foundational document-tree surface that every
//! other pact crate builds on:
//!
//! - Pointer handling: normalization, scope resolution, relativization
//! - Node access: lookup by pointer, including computed segments
//! - Canonical form: deterministic JSON serialization and sizing
//! - Content-derived ids: SHA-256 over the canonical form
//! - [`ErrorCode`]: the unified error interface for all pact crates
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SDK Layer                              │
//! │  (SemVer stable, safe for registrants to depend on)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  pact-node      : pointers, node access, ids  ◄── HERE      │
//! │  pact-event     : event and patch wire formats              │
//! │  pact-contract  : contract model, processor SPI             │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Runtime Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  pact-lua       : sandboxed script evaluation               │
//! │  pact-engine    : scope execution, patching, gas            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Document Model
//!
//! A document is a [`serde_json::Value`] tree: objects, lists, scalars.
//! Pointers are slash-delimited RFC6901-like paths (`/a/b/0`), with `-`
//! as the list-append token in patch targets.
//!
//! A node's *type* is its `"type"` property — either a plain string or an
//! object carrying a `"name"` property. Contract classification and event
//! matching both key off this discriminator.
//!
//! # Content-Derived Ids
//!
//! [`content_id`] computes a stable identity for any node: the lowercase
//! hex SHA-256 of its canonical JSON form (sorted keys, no whitespace).
//! The same structure always hashes to the same id, regardless of key
//! order or formatting in the surface document.
//!
//! # Example
//!
//! ```
//! use pact_node::{content_id, node_at, pointer};
//! use serde_json::json;
//!
//! let doc = json!({ "a": { "b": [ { "x": 1 } ] } });
//!
//! assert_eq!(node_at(&doc, "/a/b/0/x"), Some(&json!(1)));
//! assert_eq!(pointer::resolve("/a", "/b/0"), "/a/b/0");
//!
//! // Structurally identical nodes share an id.
//! assert_eq!(content_id(&json!({"x": 1, "y": 2})), content_id(&json!({"y": 2, "x": 1})));
//! ```

mod canonical;
mod error;
mod node;
pub mod pointer;

pub use canonical::{canonical_json, canonical_size, content_id};
pub use error::{ErrorCode, NodeError};
pub use node::{deep_contains, node_at, resolve_at, type_name_of, SEGMENT_DOCUMENT_ID};
