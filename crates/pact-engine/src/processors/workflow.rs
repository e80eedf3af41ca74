//! The Sequential Workflow handler: an ordered list of typed steps run
//! against a shared step-results map.

use crate::processors::steps;
use pact_contract::{
    keys, ContractError, HandlerContext, HandlerProcessor, ParsedHandler, ProcessorError,
    SequentialWorkflow,
};
use pact_lua::LuaEvaluator;
use pact_node::type_name_of;
use serde_json::{Map, Value};

/// Executes `Trigger Event`, `Update Document`, and `Lua Code` steps in
/// declared order. Each step sees the results of its predecessors under
/// the `steps` binding, keyed by step name (fallback `Step<N>`, 1-based).
pub struct SequentialWorkflowProcessor {
    evaluator: LuaEvaluator,
}

impl SequentialWorkflowProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            evaluator: LuaEvaluator::new(),
        }
    }
}

impl Default for SequentialWorkflowProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerProcessor for SequentialWorkflowProcessor {
    fn type_names(&self) -> &[&'static str] {
        &[keys::TYPE_SEQUENTIAL_WORKFLOW]
    }

    fn parse(&self, key: &str, contract: &Value) -> Result<ParsedHandler, ContractError> {
        let workflow: SequentialWorkflow =
            serde_json::from_value(contract.clone()).map_err(|e| ContractError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let channel_key = workflow
            .channel
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ContractError::MissingChannel {
                key: key.to_string(),
            })?;
        Ok(ParsedHandler {
            channel_key,
            order: workflow.order.unwrap_or(0),
        })
    }

    fn execute(
        &self,
        contract: &Value,
        ctx: &mut dyn HandlerContext,
    ) -> Result<(), ProcessorError> {
        let workflow: SequentialWorkflow = serde_json::from_value(contract.clone())
            .map_err(|e| ProcessorError::fatal(format!("sequential workflow contract: {e}")))?;

        let mut results: Map<String, Value> = Map::new();
        for (index, step) in workflow.steps.iter().enumerate() {
            let Some(type_name) = type_name_of(step) else {
                return Err(ProcessorError::fatal(
                    "sequential workflow step is missing type metadata",
                ));
            };
            let produced = match type_name {
                keys::TYPE_STEP_TRIGGER_EVENT => {
                    steps::execute_trigger_event(&self.evaluator, step, ctx, &results)?
                }
                keys::TYPE_STEP_UPDATE_DOCUMENT => {
                    steps::execute_update_document(&self.evaluator, step, ctx, &results)?
                }
                keys::TYPE_STEP_LUA_CODE => {
                    steps::execute_lua_code(&self.evaluator, step, ctx, &results)?
                }
                other => {
                    return Err(ProcessorError::fatal(format!(
                        "unsupported workflow step type \"{other}\""
                    )))
                }
            };
            if let Some(value) = produced {
                results.insert(step_result_key(step, index), value);
            }
        }
        Ok(())
    }
}

fn step_result_key(step: &Value, index: usize) -> String {
    match step.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Step{}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_requires_a_channel() {
        let processor = SequentialWorkflowProcessor::new();
        let parsed = processor
            .parse("work", &json!({"channel": "feed", "order": 2}))
            .unwrap();
        assert_eq!(parsed.channel_key, "feed");
        assert_eq!(parsed.order, 2);

        let err = processor.parse("work", &json!({"steps": []})).unwrap_err();
        assert!(matches!(err, ContractError::MissingChannel { .. }));
    }

    #[test]
    fn order_defaults_to_zero() {
        let processor = SequentialWorkflowProcessor::new();
        let parsed = processor.parse("work", &json!({"channel": "feed"})).unwrap();
        assert_eq!(parsed.order, 0);
    }

    #[test]
    fn step_result_keys_fall_back_to_position() {
        assert_eq!(step_result_key(&json!({"name": "Compute"}), 0), "Compute");
        assert_eq!(step_result_key(&json!({}), 0), "Step1");
        assert_eq!(step_result_key(&json!({"name": ""}), 2), "Step3");
    }
}
