//! Contract model, bundle, and processor SPI for the pact engine.
//!
//! A scope's behavior is declared under its `contracts` property: channels
//! that match events, handlers bound to channels, markers the engine owns,
//! and the embedded-children declaration. This crate defines:
//!
//! - The typed contract model (deserialization doubles as schema validation)
//! - [`ContractBundle`]: the immutable per-scope snapshot the engine
//!   executes against
//! - The registrant SPI: [`ChannelProcessor`], [`HandlerProcessor`],
//!   [`MarkerProcessor`], [`TypeResolver`]
//! - [`ProcessorRegistry`]: type-name dispatch with supertype-chain fallback
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SDK Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  pact-node      : pointers, node access, ids                │
//! │  pact-event     : event and patch wire formats              │
//! │  pact-gas       : gas schedule and meter                    │
//! │  pact-contract  : contract model, SPI  ◄── HERE             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Dispatch Model
//!
//! Contracts carry a `type` discriminator. The engine classifies each
//! entry against the built-in vocabulary first, then consults the
//! registry — directly by type name, then up the registrant-supplied
//! supertype chain (cycle-guarded). An entry no layer understands is a
//! *must-understand* failure: the whole run aborts non-fatally and the
//! document is returned unchanged.
//!
//! # Error Tiers
//!
//! [`ProcessorError`] is the tagged control-flow enum threaded through
//! every engine call:
//!
//! | Variant | Meaning | Effect |
//! |---------|---------|--------|
//! | `MustUnderstand` | unrecognized contract type | abort run, document untouched |
//! | `RunTerminated` | root scope terminated | unwind, return partial result |
//! | `Fatal` | scope-level failure | terminate offending scope, siblings continue |
//! | `IllegalState` | caller/author programming error | hard error to the caller |

mod bundle;
mod error;
pub mod keys;
mod model;
mod registry;
mod spi;

pub use bundle::{
    BundleBuilder, ChannelBinding, ContractBundle, HandlerBinding, MarkerBinding,
};
pub use error::{ContractError, ProcessorError};
pub use model::{
    CheckpointMarker, CompositeTimelineChannel, DocumentUpdateChannel, EmbeddedNodeChannel,
    InitializedMarker, LifecycleChannel, ProcessEmbedded, SequentialWorkflow, TerminatedMarker,
    TimelineChannel, TriggeredChannel,
};
pub use registry::ProcessorRegistry;
pub use spi::{
    ChannelContext, ChannelDelivery, ChannelMatch, ChannelProcessor, HandlerContext,
    HandlerProcessor, MarkerProcessor, ParsedHandler, TypeResolver,
};
