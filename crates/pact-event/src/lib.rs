//! Event and patch wire formats for the pact processing engine.
//!
//! Everything that crosses the engine boundary as data is defined here:
//! the patch envelope contracts submit, the engine-synthesized events
//! (lifecycle, termination, document update), and accessors for timeline
//! entries delivered from external message buses.
//!
//! # Message Types
//!
//! | Type | Direction | Produced by |
//! |------|-----------|-------------|
//! | [`Patch`] | contract → engine | handlers, workflow steps |
//! | lifecycle event | engine → handlers | scope initialization |
//! | termination event | engine → observers | termination service |
//! | document-update event | engine → handlers | patch cascade |
//! | timeline entry | bus → engine | external collaborators |
//!
//! Events are plain document nodes ([`serde_json::Value`]) carrying a
//! `type` discriminator; this crate owns the constructors so the shapes
//! stay in one place.
//!
//! # Example
//!
//! ```
//! use pact_event::{lifecycle_event, Patch, PatchOp, TYPE_LIFECYCLE_EVENT};
//! use serde_json::json;
//!
//! let event = lifecycle_event("6fd4…");
//! assert_eq!(event["type"], TYPE_LIFECYCLE_EVENT);
//!
//! let patch = Patch::add("/x", json!(5));
//! assert_eq!(patch.op, PatchOp::Add);
//! ```

mod events;
mod patch;
mod timeline;

pub use events::{
    document_update_event, lifecycle_event, termination_event, ParseCauseError, TerminationCause,
    TYPE_DOCUMENT_UPDATE, TYPE_LIFECYCLE_EVENT, TYPE_TERMINATION_EVENT,
};
pub use patch::{Patch, PatchOp};
pub use timeline::{timeline_entry_timestamp, timeline_id_of, TYPE_TIMELINE_ENTRY};
