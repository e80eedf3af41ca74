//! `${...}` template expression expansion over document nodes.
//!
//! Workflow step payloads may embed expressions in string scalars:
//!
//! - A string that is exactly one placeholder (`"${event.n}"`) is replaced
//!   by the evaluated value, whatever its type.
//! - A mixed string (`"got ${event.n} items"`) stringifies each evaluated
//!   placeholder into the surrounding text.
//!
//! Expansion walks objects and lists recursively; a caller-supplied
//! predicate stops descent (used to keep expansion out of embedded
//! documents). Evaluation itself is delegated to a caller closure so the
//! embedding engine controls sandboxing, fuel, and gas charges.

use crate::error::ScriptError;
use pact_node::canonical_json;
use serde_json::Value;

/// Evaluates one placeholder body to a node value.
pub type ExpressionEval<'a> = dyn FnMut(&str) -> Result<Value, ScriptError> + 'a;

/// Decides whether expansion descends into a child node.
/// Arguments are the child's pointer (relative to the expansion root) and
/// the child itself.
pub type DescendPredicate<'a> = dyn Fn(&str, &Value) -> bool + 'a;

/// Returns the placeholder bodies found in `text`, in order.
#[must_use]
pub fn placeholders(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        found.push(&after[..end]);
        rest = &after[end + 1..];
    }
    found
}

/// Expands every placeholder in a string.
///
/// # Errors
///
/// Propagates the first evaluation failure.
pub fn expand_string(text: &str, eval: &mut ExpressionEval<'_>) -> Result<Value, ScriptError> {
    let bodies = placeholders(text);
    if bodies.is_empty() {
        return Ok(Value::String(text.to_string()));
    }
    // Whole-string placeholder: keep the evaluated type.
    if bodies.len() == 1 && text == format!("${{{}}}", bodies[0]) {
        return eval(bodies[0]);
    }
    let mut out = String::new();
    let mut rest = text;
    for body in bodies {
        let token = format!("${{{body}}}");
        let Some(at) = rest.find(&token) else { break };
        out.push_str(&rest[..at]);
        out.push_str(&stringify(&eval(body)?));
        rest = &rest[at + token.len()..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

/// Expands placeholders through a node tree.
///
/// # Errors
///
/// Propagates the first evaluation failure.
pub fn expand_tree(
    node: &Value,
    eval: &mut ExpressionEval<'_>,
    descend: &DescendPredicate<'_>,
) -> Result<Value, ScriptError> {
    expand_at("/", node, eval, descend)
}

fn expand_at(
    pointer: &str,
    node: &Value,
    eval: &mut ExpressionEval<'_>,
    descend: &DescendPredicate<'_>,
) -> Result<Value, ScriptError> {
    match node {
        Value::String(text) => expand_string(text, eval),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                let child_pointer = child_pointer(pointer, key);
                let expanded = if descend(&child_pointer, child) {
                    expand_at(&child_pointer, child, eval, descend)?
                } else {
                    child.clone()
                };
                out.insert(key.clone(), expanded);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, child) in items.iter().enumerate() {
                let child_pointer = child_pointer(pointer, &index.to_string());
                let expanded = if descend(&child_pointer, child) {
                    expand_at(&child_pointer, child, eval, descend)?
                } else {
                    child.clone()
                };
                out.push(expanded);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn child_pointer(parent: &str, segment: &str) -> String {
    if parent == "/" {
        format!("/{segment}")
    } else {
        format!("{parent}/{segment}")
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        scalar @ (Value::Bool(_) | Value::Number(_)) => scalar.to_string(),
        complex => canonical_json(complex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_fixture(body: &str) -> Result<Value, ScriptError> {
        match body {
            "event.n" => Ok(json!(7)),
            "steps.First" => Ok(json!({"x": 1})),
            "nothing" => Ok(Value::Null),
            other => Err(ScriptError::evaluation(other, "unknown expression")),
        }
    }

    #[test]
    fn finds_placeholders_in_order() {
        assert_eq!(placeholders("${a} and ${b.c}"), vec!["a", "b.c"]);
        assert!(placeholders("plain").is_empty());
        assert!(placeholders("${unclosed").is_empty());
    }

    #[test]
    fn whole_string_placeholder_keeps_type() {
        let out = expand_string("${steps.First}", &mut eval_fixture).unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[test]
    fn mixed_template_stringifies() {
        let out = expand_string("n=${event.n}!", &mut eval_fixture).unwrap();
        assert_eq!(out, json!("n=7!"));
    }

    #[test]
    fn null_stringifies_to_empty() {
        let out = expand_string("x${nothing}y", &mut eval_fixture).unwrap();
        assert_eq!(out, json!("xy"));
    }

    #[test]
    fn tree_expansion_descends_objects_and_lists() {
        let node = json!({"a": "${event.n}", "b": ["${event.n}", "keep"]});
        let out = expand_tree(&node, &mut eval_fixture, &|_, _| true).unwrap();
        assert_eq!(out, json!({"a": 7, "b": [7, "keep"]}));
    }

    #[test]
    fn descend_predicate_blocks_subtrees() {
        let node = json!({"open": "${event.n}", "closed": {"inner": "${event.n}"}});
        let out = expand_tree(&node, &mut eval_fixture, &|ptr, _| ptr != "/closed").unwrap();
        assert_eq!(out, json!({"open": 7, "closed": {"inner": "${event.n}"}}));
    }

    #[test]
    fn evaluation_failure_propagates() {
        assert!(expand_string("${boom}", &mut eval_fixture).is_err());
    }
}
