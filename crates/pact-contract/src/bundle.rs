//! The per-scope contract bundle.
//!
//! A bundle is an immutable snapshot of one scope's contracts, rebuilt on
//! every scope (re-)entry because earlier work in the same run may have
//! mutated the `contracts` node. Channels keep their declared order;
//! handlers are delivered in `(order, key)` order per channel.

use crate::error::ContractError;
use crate::keys::{TYPE_CHECKPOINT_MARKER, TYPE_PROCESS_EMBEDDED};
use crate::model::ProcessEmbedded;
use serde_json::Value;

/// One channel contract bound to its scope-local key.
#[derive(Debug, Clone)]
pub struct ChannelBinding {
    pub key: String,
    pub type_name: String,
    pub contract: Value,
}

/// One handler contract with its resolved channel binding.
#[derive(Debug, Clone)]
pub struct HandlerBinding {
    pub key: String,
    pub type_name: String,
    pub contract: Value,
    pub channel_key: String,
    pub order: i64,
}

/// One marker contract (engine-owned or registrant-supplied).
#[derive(Debug, Clone)]
pub struct MarkerBinding {
    pub key: String,
    pub type_name: String,
    pub contract: Value,
}

/// Immutable, scope-local snapshot of classified contracts.
#[derive(Debug, Clone, Default)]
pub struct ContractBundle {
    channels: Vec<ChannelBinding>,
    handlers: Vec<HandlerBinding>,
    markers: Vec<MarkerBinding>,
    embedded: Option<(String, ProcessEmbedded)>,
}

impl ContractBundle {
    #[must_use]
    pub fn builder() -> BundleBuilder {
        BundleBuilder::default()
    }

    /// Channels in declared order.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelBinding> {
        self.channels.iter()
    }

    #[must_use]
    pub fn channel(&self, key: &str) -> Option<&ChannelBinding> {
        self.channels.iter().find(|c| c.key == key)
    }

    /// Handlers bound to `channel_key`, ordered by `(order, key)`.
    #[must_use]
    pub fn handlers_for(&self, channel_key: &str) -> Vec<&HandlerBinding> {
        let mut handlers: Vec<&HandlerBinding> = self
            .handlers
            .iter()
            .filter(|h| h.channel_key == channel_key)
            .collect();
        handlers.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.key.cmp(&b.key)));
        handlers
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerBinding> {
        self.markers.iter()
    }

    #[must_use]
    pub fn marker(&self, key: &str) -> Option<&MarkerBinding> {
        self.markers.iter().find(|m| m.key == key)
    }

    #[must_use]
    pub fn marker_of_type(&self, type_name: &str) -> Option<&MarkerBinding> {
        self.markers.iter().find(|m| m.type_name == type_name)
    }

    /// Replaces (or installs) a marker contract in this snapshot so
    /// engine-written markers stay visible without a full reload.
    pub fn upsert_marker(&mut self, key: &str, type_name: &str, contract: Value) {
        if let Some(existing) = self.markers.iter_mut().find(|m| m.key == key) {
            existing.contract = contract;
            return;
        }
        self.markers.push(MarkerBinding {
            key: key.to_string(),
            type_name: type_name.to_string(),
            contract,
        });
    }

    /// Relative embedded-child pointers declared by the Process Embedded
    /// marker, in declared order.
    #[must_use]
    pub fn embedded_paths(&self) -> &[String] {
        self.embedded
            .as_ref()
            .map_or(&[], |(_, marker)| marker.paths.as_slice())
    }

    /// Key of the Process Embedded marker, if declared.
    #[must_use]
    pub fn embedded_key(&self) -> Option<&str> {
        self.embedded.as_ref().map(|(key, _)| key.as_str())
    }
}

/// Builder enforcing bundle-level invariants during loading.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    bundle: ContractBundle,
    has_checkpoint: bool,
}

impl BundleBuilder {
    pub fn add_channel(&mut self, key: &str, type_name: &str, contract: Value) {
        self.bundle.channels.push(ChannelBinding {
            key: key.to_string(),
            type_name: type_name.to_string(),
            contract,
        });
    }

    pub fn add_handler(
        &mut self,
        key: &str,
        type_name: &str,
        contract: Value,
        channel_key: String,
        order: i64,
    ) {
        self.bundle.handlers.push(HandlerBinding {
            key: key.to_string(),
            type_name: type_name.to_string(),
            contract,
            channel_key,
            order,
        });
    }

    /// Adds a marker; at most one Channel Event Checkpoint per scope.
    pub fn add_marker(
        &mut self,
        key: &str,
        type_name: &str,
        contract: Value,
    ) -> Result<(), ContractError> {
        if type_name == TYPE_CHECKPOINT_MARKER {
            if self.has_checkpoint {
                return Err(ContractError::DuplicateMarker {
                    key: key.to_string(),
                    type_name: type_name.to_string(),
                });
            }
            self.has_checkpoint = true;
        }
        self.bundle.markers.push(MarkerBinding {
            key: key.to_string(),
            type_name: type_name.to_string(),
            contract,
        });
        Ok(())
    }

    /// Installs the singular Process Embedded marker.
    pub fn set_embedded(&mut self, key: &str, marker: ProcessEmbedded) -> Result<(), ContractError> {
        if self.bundle.embedded.is_some() {
            return Err(ContractError::DuplicateMarker {
                key: key.to_string(),
                type_name: TYPE_PROCESS_EMBEDDED.to_string(),
            });
        }
        self.bundle.embedded = Some((key.to_string(), marker));
        Ok(())
    }

    #[must_use]
    pub fn build(self) -> ContractBundle {
        self.bundle
    }
}
