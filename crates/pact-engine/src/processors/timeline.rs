//! Timeline channel: external message-bus entries for one timeline.

use pact_contract::{
    keys, ChannelContext, ChannelMatch, ChannelProcessor, ContractError, ProcessorError,
    TimelineChannel,
};
use pact_event::{timeline_entry_timestamp, timeline_id_of};
use serde_json::Value;

/// Matches timeline entries whose timeline id equals the contract's.
pub struct TimelineChannelProcessor;

/// Timestamp-based recency: an entry without a parseable timestamp — on
/// either side — is treated as newer.
pub(crate) fn entry_is_newer(incoming: &Value, last: &Value) -> bool {
    match (
        timeline_entry_timestamp(incoming),
        timeline_entry_timestamp(last),
    ) {
        (Some(incoming_ts), Some(last_ts)) => incoming_ts > last_ts,
        _ => true,
    }
}

impl ChannelProcessor for TimelineChannelProcessor {
    fn type_names(&self) -> &[&'static str] {
        &[keys::TYPE_TIMELINE_CHANNEL]
    }

    fn validate(&self, key: &str, contract: &Value) -> Result<(), ContractError> {
        serde_json::from_value::<TimelineChannel>(contract.clone())
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
        let channel: TimelineChannel = serde_json::from_value(contract.clone())
            .map_err(|e| ProcessorError::fatal(format!("timeline channel contract: {e}")))?;
        match timeline_id_of(ctx.event) {
            Some(id) if id == channel.timeline_id => Ok(ChannelMatch::matched(ctx.event.clone())),
            _ => Ok(ChannelMatch::no_match()),
        }
    }

    fn is_newer_event(&self, _contract: &Value, ctx: &ChannelContext<'_>, last: &Value) -> bool {
        entry_is_newer(ctx.event, last)
    }
}
