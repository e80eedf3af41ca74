//! Built-in contract processors.
//!
//! Lifecycle, triggered, document-update, and embedded-node channels are
//! engine-managed (driven by the scope executor's dedicated paths); the
//! processors here cover the registry-dispatched kinds every deployment
//! carries: timeline channels, composite timeline channels, and the
//! sequential-workflow handler with its typed steps.

mod composite;
mod steps;
mod timeline;
mod workflow;

pub use composite::CompositeTimelineChannelProcessor;
pub use timeline::TimelineChannelProcessor;
pub use workflow::SequentialWorkflowProcessor;

use pact_contract::ProcessorRegistry;
use std::sync::Arc;

/// Registers the built-in processors into a registry.
pub fn register_builtins(registry: &mut ProcessorRegistry) {
    registry.register_channel(Arc::new(TimelineChannelProcessor));
    registry.register_channel(Arc::new(CompositeTimelineChannelProcessor));
    registry.register_handler(Arc::new(SequentialWorkflowProcessor::new()));
}
