//! Gas schedule and run-scoped meter.
//!
//! Every engine operation charges a named amount against one monotonically
//! increasing counter owned by the run. The schedule is fixed: identical
//! inputs always charge identical totals, which keeps runs reproducible
//! and makes resource consumption part of the observable result.
//!
//! # Schedule
//!
//! | Operation | Charge |
//! |-----------|--------|
//! | scope entry | `50 + 10 × depth` |
//! | initialization | `1_000` |
//! | channel match attempt | `5` |
//! | handler overhead | `50` |
//! | boundary check | `2` |
//! | patch ADD/REPLACE | `20 + ⌈canonical bytes / 100⌉` |
//! | patch REMOVE | `10` |
//! | cascade routing | `10 × cascade scopes` |
//! | emit event | `20 + ⌈canonical bytes / 100⌉` |
//! | bridge child emission | `10` |
//! | drain triggered event | `10` |
//! | checkpoint update | `20` |
//! | termination marker | `20` |
//! | lifecycle delivery | `30` |
//! | fatal termination overhead | `100` |
//! | Trigger Event step base | `30` |
//! | Update Document step base | `20 + 10 × changes` |
//! | script step base | `25 + ⌈code bytes / 50⌉` |
//! | expression evaluation | `10 + ⌈source bytes / 100⌉` |
//! | template expansion | `5 × placeholders + ⌈bytes / 100⌉` |
//! | document snapshot read | `5 + ⌈canonical bytes / 100⌉` |
//! | script fuel | `⌈VM instructions / 1_000⌉` |
//!
//! # Budget
//!
//! A meter may carry a budget. Charging never suspends mid-operation;
//! callers poll [`GasMeter::is_exhausted`] at safe points (scope entry,
//! channel attempts, after script steps) and convert exhaustion into a
//! fatal termination of the current scope.
//!
//! # Example
//!
//! ```
//! use pact_gas::GasMeter;
//!
//! let mut meter = GasMeter::with_budget(100);
//! meter.charge_scope_entry(0);
//! assert_eq!(meter.total(), 50);
//! assert!(!meter.is_exhausted());
//! meter.charge_handler_overhead();
//! assert!(meter.is_exhausted());
//! ```

use serde_json::Value;

const INITIALIZATION: u64 = 1_000;
const CHANNEL_MATCH_ATTEMPT: u64 = 5;
const HANDLER_OVERHEAD: u64 = 50;
const BOUNDARY_CHECK: u64 = 2;
const PATCH_REMOVE: u64 = 10;
const BRIDGE_EMISSION: u64 = 10;
const DRAIN_EVENT: u64 = 10;
const CHECKPOINT_UPDATE: u64 = 20;
const TERMINATION_MARKER: u64 = 20;
const LIFECYCLE_DELIVERY: u64 = 30;
const FATAL_TERMINATION_OVERHEAD: u64 = 100;
const TRIGGER_EVENT_BASE: u64 = 30;

/// VM instructions per unit of host gas for sandboxed script fuel.
pub const SCRIPT_FUEL_PER_GAS_UNIT: u64 = 1_000;

/// Default host-gas allowance for a single script step, in gas units.
pub const DEFAULT_SCRIPT_STEP_GAS_LIMIT: u64 = 40_000;

/// Converts spent VM instructions into host gas (ceil division).
#[must_use]
pub fn script_fuel_to_gas(instructions: u64) -> u64 {
    instructions.div_ceil(SCRIPT_FUEL_PER_GAS_UNIT)
}

/// Converts a host-gas allowance into a VM instruction budget.
#[must_use]
pub fn gas_to_script_fuel(gas: u64) -> u64 {
    gas.saturating_mul(SCRIPT_FUEL_PER_GAS_UNIT)
}

fn ceil100(bytes: usize) -> u64 {
    (bytes as u64).div_ceil(100)
}

fn payload_charge(node: Option<&Value>) -> u64 {
    node.map_or(0, |n| ceil100(pact_node::canonical_size(n)))
}

/// Run-scoped gas meter with named charges and an optional budget.
///
/// The counter only ever increases; it is reported in the run result
/// regardless of outcome.
#[derive(Debug, Clone)]
pub struct GasMeter {
    total: u64,
    budget: Option<u64>,
}

impl GasMeter {
    /// Creates an unbounded meter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total: 0,
            budget: None,
        }
    }

    /// Creates a meter that reports exhaustion past `budget` units.
    #[must_use]
    pub fn with_budget(budget: u64) -> Self {
        Self {
            total: 0,
            budget: Some(budget),
        }
    }

    /// Total gas charged so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whether the budget (if any) has been spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.budget.is_some_and(|b| self.total >= b)
    }

    /// Host gas still available for a script step, capped at
    /// [`DEFAULT_SCRIPT_STEP_GAS_LIMIT`].
    #[must_use]
    pub fn script_step_allowance(&self) -> u64 {
        match self.budget {
            Some(budget) => budget
                .saturating_sub(self.total)
                .min(DEFAULT_SCRIPT_STEP_GAS_LIMIT),
            None => DEFAULT_SCRIPT_STEP_GAS_LIMIT,
        }
    }

    /// Adds an unscheduled amount (registrant-specific work).
    pub fn add(&mut self, amount: u64) {
        self.total = self.total.saturating_add(amount);
    }

    pub fn charge_scope_entry(&mut self, depth: usize) {
        self.add(50 + 10 * depth as u64);
    }

    pub fn charge_initialization(&mut self) {
        self.add(INITIALIZATION);
    }

    pub fn charge_channel_match_attempt(&mut self) {
        self.add(CHANNEL_MATCH_ATTEMPT);
    }

    pub fn charge_handler_overhead(&mut self) {
        self.add(HANDLER_OVERHEAD);
    }

    pub fn charge_boundary_check(&mut self) {
        self.add(BOUNDARY_CHECK);
    }

    pub fn charge_patch_add_or_replace(&mut self, value: Option<&Value>) {
        self.add(20 + payload_charge(value));
    }

    pub fn charge_patch_remove(&mut self) {
        self.add(PATCH_REMOVE);
    }

    pub fn charge_cascade_routing(&mut self, scope_count: usize) {
        if scope_count > 0 {
            self.add(10 * scope_count as u64);
        }
    }

    pub fn charge_emit_event(&mut self, event: &Value) {
        self.add(20 + payload_charge(Some(event)));
    }

    pub fn charge_bridge(&mut self) {
        self.add(BRIDGE_EMISSION);
    }

    pub fn charge_drain_event(&mut self) {
        self.add(DRAIN_EVENT);
    }

    pub fn charge_checkpoint_update(&mut self) {
        self.add(CHECKPOINT_UPDATE);
    }

    pub fn charge_termination_marker(&mut self) {
        self.add(TERMINATION_MARKER);
    }

    pub fn charge_lifecycle_delivery(&mut self) {
        self.add(LIFECYCLE_DELIVERY);
    }

    pub fn charge_fatal_termination_overhead(&mut self) {
        self.add(FATAL_TERMINATION_OVERHEAD);
    }

    pub fn charge_trigger_event_base(&mut self) {
        self.add(TRIGGER_EVENT_BASE);
    }

    pub fn charge_update_document_base(&mut self, changes: usize) {
        self.add(20 + 10 * changes as u64);
    }

    pub fn charge_script_code_base(&mut self, code: &str) {
        self.add(25 + (code.len() as u64).div_ceil(50));
    }

    pub fn charge_expression(&mut self, source: &str) {
        self.add(10 + ceil100(source.len()));
    }

    pub fn charge_template(&mut self, placeholder_count: usize, template: &str) {
        self.add(5 * placeholder_count as u64 + ceil100(template.len()));
    }

    /// `bytes` is the canonical size of the snapshot; `None` for misses.
    pub fn charge_document_snapshot(&mut self, bytes: Option<usize>) {
        self.add(5 + bytes.map_or(0, ceil100));
    }

    /// Charges host gas converted from spent script fuel.
    pub fn charge_script_fuel(&mut self, instructions: u64) {
        self.add(script_fuel_to_gas(instructions));
    }
}

impl Default for GasMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_entry_scales_with_depth() {
        let mut meter = GasMeter::new();
        meter.charge_scope_entry(0);
        assert_eq!(meter.total(), 50);
        meter.charge_scope_entry(2);
        assert_eq!(meter.total(), 50 + 70);
    }

    #[test]
    fn payload_charges_scale_with_canonical_size() {
        let mut small = GasMeter::new();
        small.charge_patch_add_or_replace(Some(&json!(1)));
        let mut large = GasMeter::new();
        large.charge_patch_add_or_replace(Some(&json!("x".repeat(500))));
        assert!(large.total() > small.total());
    }

    #[test]
    fn remove_is_flat() {
        let mut meter = GasMeter::new();
        meter.charge_patch_remove();
        assert_eq!(meter.total(), 10);
    }

    #[test]
    fn cascade_routing_skips_empty() {
        let mut meter = GasMeter::new();
        meter.charge_cascade_routing(0);
        assert_eq!(meter.total(), 0);
        meter.charge_cascade_routing(3);
        assert_eq!(meter.total(), 30);
    }

    #[test]
    fn fuel_conversion_rounds_up() {
        assert_eq!(script_fuel_to_gas(0), 0);
        assert_eq!(script_fuel_to_gas(1), 1);
        assert_eq!(script_fuel_to_gas(1_000), 1);
        assert_eq!(script_fuel_to_gas(1_001), 2);
        assert_eq!(gas_to_script_fuel(2), 2_000);
    }

    #[test]
    fn budget_exhaustion() {
        let mut meter = GasMeter::with_budget(60);
        assert!(!meter.is_exhausted());
        meter.charge_scope_entry(1);
        assert!(meter.is_exhausted());
        // total keeps counting past the budget
        meter.charge_handler_overhead();
        assert_eq!(meter.total(), 110);
    }

    #[test]
    fn script_allowance_tracks_remaining_budget() {
        let meter = GasMeter::new();
        assert_eq!(meter.script_step_allowance(), DEFAULT_SCRIPT_STEP_GAS_LIMIT);

        let mut capped = GasMeter::with_budget(100);
        capped.charge_scope_entry(0);
        assert_eq!(capped.script_step_allowance(), 50);
    }
}
