//! Channel runner: match → dedup → recency → handlers → checkpoint.
//!
//! Duplicate-detection precedence is fixed: an explicit channel-supplied
//! event id wins, otherwise the canonical structural signature of the raw
//! event; an identical signature skips silently; a surviving event is
//! then subject to the channel's optional recency veto against the
//! checkpointed predecessor. The checkpoint persists only after a fully
//! successful handler run with the scope still active.

use crate::execution::Execution;
use pact_contract::{
    ChannelBinding, ChannelContext, ChannelDelivery, ChannelProcessor, ContractBundle,
    HandlerBinding, HandlerContext, ProcessorError,
};
use pact_node::content_id;
use serde_json::Value;
use std::sync::Arc;

impl Execution {
    /// Runs one channel against an external event.
    pub(crate) fn run_external_channel(
        &mut self,
        scope: &str,
        bundle: &mut ContractBundle,
        channel: &ChannelBinding,
        event: &Value,
    ) -> Result<(), ProcessorError> {
        if self.is_scope_inactive(scope) {
            return Ok(());
        }
        self.meter.charge_channel_match_attempt();
        self.check_gas("channel matching")?;

        // Engine-managed kinds and unknown registrant kinds simply do not
        // match external events.
        let Some(processor) = self.registry.resolve_channel(&channel.type_name).cloned() else {
            return Ok(());
        };

        let evaluated = {
            let ctx = ChannelContext {
                scope_path: scope,
                binding_key: &channel.key,
                event,
                bundle,
            };
            processor.evaluate(&channel.contract, &ctx)?
        };
        if !evaluated.matches {
            return Ok(());
        }
        tracing::debug!(scope, channel = %channel.key, "channel matched");

        if !evaluated.deliveries.is_empty() {
            return self.run_deliveries(
                scope,
                bundle,
                channel,
                &processor,
                event,
                evaluated.deliveries,
            );
        }

        self.ensure_checkpoint_marker(scope, bundle)?;
        let record = self.find_checkpoint(bundle, &channel.key);
        let signature = evaluated
            .event_id
            .clone()
            .unwrap_or_else(|| content_id(event));
        if let Some(record) = &record {
            if record.matches(&signature) {
                tracing::debug!(scope, channel = %channel.key, "duplicate event skipped");
                return Ok(());
            }
            if let Some(last) = &record.last_event {
                let ctx = ChannelContext {
                    scope_path: scope,
                    binding_key: &channel.key,
                    event,
                    bundle,
                };
                if !processor.is_newer_event(&channel.contract, &ctx, last) {
                    tracing::debug!(scope, channel = %channel.key, "stale event skipped");
                    return Ok(());
                }
            }
        }

        let handler_event = evaluated.event.clone().unwrap_or_else(|| event.clone());
        self.run_handlers(scope, bundle, &channel.key, &handler_event, false)?;
        if self.is_scope_inactive(scope) {
            return Ok(());
        }
        if let Some(record) = &record {
            self.persist_checkpoint(scope, bundle, record, Some(&signature), event)?;
        }
        Ok(())
    }

    /// Composite path: one checkpointed delivery per matching child.
    fn run_deliveries(
        &mut self,
        scope: &str,
        bundle: &mut ContractBundle,
        channel: &ChannelBinding,
        processor: &Arc<dyn ChannelProcessor>,
        raw_event: &Value,
        deliveries: Vec<ChannelDelivery>,
    ) -> Result<(), ProcessorError> {
        self.ensure_checkpoint_marker(scope, bundle)?;
        let fallback_signature = content_id(raw_event);

        for delivery in deliveries {
            if self.is_scope_inactive(scope) {
                return Ok(());
            }
            let record = self.find_checkpoint(bundle, &delivery.checkpoint_key);
            let signature = delivery
                .event_id
                .clone()
                .unwrap_or_else(|| fallback_signature.clone());
            if let Some(record) = &record {
                if record.matches(&signature) {
                    continue;
                }
                let should_process = match delivery.should_process {
                    Some(decided) => decided,
                    None => record.last_event.as_ref().is_none_or(|last| {
                        let ctx = ChannelContext {
                            scope_path: scope,
                            binding_key: &channel.key,
                            event: raw_event,
                            bundle,
                        };
                        processor.is_newer_event(&channel.contract, &ctx, last)
                    }),
                };
                if !should_process {
                    continue;
                }
            }

            self.run_handlers(scope, bundle, &channel.key, &delivery.event, false)?;
            if self.is_scope_inactive(scope) {
                return Ok(());
            }
            if let Some(record) = &record {
                self.persist_checkpoint(scope, bundle, record, Some(&signature), raw_event)?;
            }
        }
        Ok(())
    }

    /// Runs every handler bound to `channel_key`, in `(order, key)` order.
    ///
    /// A handler failure that is not a sentinel converts into a fatal
    /// termination of this scope and stops the channel; sentinels
    /// propagate.
    pub(crate) fn run_handlers(
        &mut self,
        scope: &str,
        bundle: &ContractBundle,
        channel_key: &str,
        event: &Value,
        allow_terminated_work: bool,
    ) -> Result<(), ProcessorError> {
        let handlers: Vec<HandlerBinding> = bundle
            .handlers_for(channel_key)
            .into_iter()
            .cloned()
            .collect();
        for handler in handlers {
            if !allow_terminated_work && self.is_scope_inactive(scope) {
                break;
            }
            match self.run_single_handler(scope, &handler, event, allow_terminated_work) {
                Ok(()) => {}
                Err(ProcessorError::Fatal { reason }) => {
                    tracing::warn!(scope, handler = %handler.key, %reason, "handler failed");
                    self.enter_fatal_termination(scope, Some(&reason))?;
                    return Ok(());
                }
                Err(sentinel) => return Err(sentinel),
            }
        }
        Ok(())
    }

    fn run_single_handler(
        &mut self,
        scope: &str,
        handler: &HandlerBinding,
        event: &Value,
        allow_terminated_work: bool,
    ) -> Result<(), ProcessorError> {
        let Some(processor) = self.registry.resolve_handler(&handler.type_name).cloned() else {
            return Err(ProcessorError::fatal(format!(
                "no processor registered for handler type '{}'",
                handler.type_name
            )));
        };
        let mut ctx = crate::context::ExecutionContext::new(
            self,
            scope,
            event.clone(),
            allow_terminated_work,
            false,
        );
        if !processor.matches(&handler.contract, &mut ctx)? {
            return Ok(());
        }
        ctx.gas().charge_handler_overhead();
        processor.execute(&handler.contract, &mut ctx)
    }
}
