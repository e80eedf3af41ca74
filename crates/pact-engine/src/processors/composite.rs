//! Composite timeline channel: one event fanned across sibling timeline
//! channels, each sub-delivery checkpointed under a namespaced key so
//! siblings dedupe independently.

use crate::processors::timeline::entry_is_newer;
use pact_contract::{
    keys, ChannelContext, ChannelDelivery, ChannelMatch, ChannelProcessor,
    CompositeTimelineChannel, ContractError, ProcessorError, TimelineChannel,
};
use pact_event::timeline_id_of;
use serde_json::Value;

/// Fans matching events out to the referenced timeline channels.
pub struct CompositeTimelineChannelProcessor;

impl ChannelProcessor for CompositeTimelineChannelProcessor {
    fn type_names(&self) -> &[&'static str] {
        &[keys::TYPE_COMPOSITE_TIMELINE_CHANNEL]
    }

    fn validate(&self, key: &str, contract: &Value) -> Result<(), ContractError> {
        serde_json::from_value::<CompositeTimelineChannel>(contract.clone())
            .map(|_| ())
            .map_err(|e| ContractError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn evaluate(
        &self,
        contract: &Value,
        ctx: &ChannelContext<'_>,
    ) -> Result<ChannelMatch, ProcessorError> {
        let composite: CompositeTimelineChannel = serde_json::from_value(contract.clone())
            .map_err(|e| ProcessorError::fatal(format!("composite channel contract: {e}")))?;

        let mut deliveries = Vec::new();
        for child_key in &composite.channels {
            let Some(binding) = ctx.bundle.channel(child_key) else {
                continue;
            };
            if binding.type_name != keys::TYPE_TIMELINE_CHANNEL {
                continue;
            }
            let Ok(child) = serde_json::from_value::<TimelineChannel>(binding.contract.clone())
            else {
                continue;
            };
            if timeline_id_of(ctx.event) != Some(child.timeline_id.as_str()) {
                continue;
            }
            let checkpoint_key = format!("{}::{}", ctx.binding_key, child_key);
            // recency is decided here, against this delivery's own
            // namespaced checkpoint
            let last = ctx
                .bundle
                .marker_of_type(keys::TYPE_CHECKPOINT_MARKER)
                .and_then(|m| m.contract.get("lastEvents"))
                .and_then(|events| events.get(&checkpoint_key))
                .cloned();
            let should_process = last.as_ref().map(|l| entry_is_newer(ctx.event, l));
            deliveries.push(ChannelDelivery {
                checkpoint_key,
                event: ctx.event.clone(),
                event_id: None,
                should_process,
            });
        }

        Ok(ChannelMatch {
            matches: !deliveries.is_empty(),
            event: None,
            event_id: None,
            deliveries,
        })
    }
}
