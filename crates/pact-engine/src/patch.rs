//! The patch engine: single-mutation application against the live document.
//!
//! Application is validate-then-mutate: the target path is fully checked
//! before anything is written, so a failing patch leaves the document —
//! including any intermediates a successful call would have created —
//! untouched. Successful calls report independent `before`/`after`
//! snapshots and the ancestor scopes used for cascade routing.
//!
//! [`direct_write`] is the engine-internal primitive for marker
//! bookkeeping: same addressing rules, no envelope, removals of missing
//! paths are no-ops.

use pact_event::{Patch, PatchOp};
use pact_node::pointer;
use serde_json::{Map, Value};
use thiserror::Error;

/// Patch application failure. Converted by callers into a fatal
/// termination of the submitting scope.
#[derive(Debug, Clone, Error)]
pub enum PatchError {
    /// The document root is never a valid patch target.
    #[error("document root is not a patchable target")]
    RootTarget,

    /// REMOVE requires the full path to pre-exist.
    #[error("no node at path: {0}")]
    Missing(String),

    /// List index outside the permitted range for the operation.
    #[error("list index out of range at {0}")]
    IndexOutOfRange(String),

    /// Non-numeric segment used against a list.
    #[error("invalid list index at {0}")]
    InvalidIndex(String),

    /// The append token `-` used anywhere but a final ADD segment
    /// against a list.
    #[error("append token not valid at {0}")]
    InvalidAppend(String),

    /// A scalar node stands where a container is required.
    #[error("not a container at {0}")]
    NotAContainer(String),
}

/// Outcome of a successful patch application.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub op: PatchOp,
    /// Normalized absolute target path.
    pub path: String,
    /// Node at the target before mutation (`None` when absent/appending).
    pub before: Option<Value>,
    /// Node at the target after mutation (`None` for REMOVE).
    pub after: Option<Value>,
    /// Ancestor scopes of the target, nearest first, ending with `/`.
    pub cascade_scopes: Vec<String>,
}

enum FinalSite {
    /// Insert into an object key (`before` captured).
    ObjectKey { before: Option<Value> },
    /// Replace/remove at an in-range list index.
    ListIndex { index: usize, before: Value },
    /// Append to a list (`-` token or index == len).
    ListAppend,
}

/// Applies one ADD/REPLACE/REMOVE at a normalized pointer.
///
/// # Errors
///
/// See [`PatchError`]. On error the document is unchanged.
pub fn apply(document: &mut Value, patch: &Patch) -> Result<PatchOutcome, PatchError> {
    let path = pointer::normalize(&patch.path);
    if path == "/" {
        return Err(PatchError::RootTarget);
    }
    let segments = pointer::segments(&path);
    let (last, parents) = segments
        .split_last()
        .map(|(l, p)| (l.clone(), p.to_vec()))
        .ok_or(PatchError::RootTarget)?;

    // Validation pass: nothing is written until the whole path checks out.
    let mut current: Option<&Value> = Some(&*document);
    let mut walked = String::new();
    let mut creating = false;
    for segment in &parents {
        walked.push('/');
        walked.push_str(segment);
        if segment == pointer::APPEND_TOKEN {
            return Err(PatchError::InvalidAppend(walked));
        }
        if creating {
            continue;
        }
        match current {
            Some(Value::Object(map)) => match map.get(segment) {
                Some(child) => current = Some(child),
                None => {
                    if patch.op == PatchOp::Remove {
                        return Err(PatchError::Missing(walked));
                    }
                    creating = true;
                    current = None;
                }
            },
            Some(Value::Array(items)) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| PatchError::InvalidIndex(walked.clone()))?;
                match items.get(index) {
                    Some(child) => current = Some(child),
                    None => return Err(PatchError::IndexOutOfRange(walked)),
                }
            }
            Some(_) => return Err(PatchError::NotAContainer(walked)),
            None => break,
        }
    }

    let site = validate_final(current, &last, patch.op, &path)?;

    // Mutation pass: every step below is guaranteed by the validation.
    let parent = descend_creating(document, &parents)?;
    let (before, after) = match (patch.op, site) {
        (PatchOp::Remove, FinalSite::ObjectKey { before }) => {
            if let Value::Object(map) = parent {
                map.shift_remove(&last);
            }
            (before, None)
        }
        (PatchOp::Remove, FinalSite::ListIndex { index, before }) => {
            if let Value::Array(items) = parent {
                items.remove(index);
            }
            (Some(before), None)
        }
        (_, FinalSite::ObjectKey { before }) => {
            let value = patch.val.clone().unwrap_or(Value::Null);
            if let Value::Object(map) = parent {
                map.insert(last.clone(), value.clone());
            }
            (before, Some(value))
        }
        (PatchOp::Add, FinalSite::ListAppend) => {
            let value = patch.val.clone().unwrap_or(Value::Null);
            if let Value::Array(items) = parent {
                items.push(value.clone());
            }
            (None, Some(value))
        }
        (PatchOp::Add, FinalSite::ListIndex { index, .. }) => {
            let value = patch.val.clone().unwrap_or(Value::Null);
            if let Value::Array(items) = parent {
                items.insert(index, value.clone());
            }
            (None, Some(value))
        }
        (PatchOp::Replace, FinalSite::ListIndex { index, before }) => {
            let value = patch.val.clone().unwrap_or(Value::Null);
            if let Value::Array(items) = parent {
                items[index] = value.clone();
            }
            (Some(before), Some(value))
        }
        (_, FinalSite::ListAppend) => return Err(PatchError::InvalidAppend(path)),
    };

    Ok(PatchOutcome {
        op: patch.op,
        cascade_scopes: pointer::ancestors(&path),
        path,
        before,
        after,
    })
}

/// Engine-internal write: installs (`Some`) or removes (`None`) a node,
/// creating intermediate objects on demand. Removing a missing path is a
/// no-op.
///
/// # Errors
///
/// Root targets and invalid list addressing fail as in [`apply`].
pub fn direct_write(
    document: &mut Value,
    ptr: &str,
    value: Option<Value>,
) -> Result<(), PatchError> {
    let path = pointer::normalize(ptr);
    if path == "/" {
        return Err(PatchError::RootTarget);
    }
    let segments = pointer::segments(&path);
    let (last, parents) = segments
        .split_last()
        .map(|(l, p)| (l.clone(), p.to_vec()))
        .ok_or(PatchError::RootTarget)?;

    match value {
        Some(value) => {
            let parent = descend_creating(document, &parents)?;
            match parent {
                Value::Object(map) => {
                    map.insert(last, value);
                }
                Value::Array(items) => {
                    if last == pointer::APPEND_TOKEN {
                        items.push(value);
                    } else {
                        let index: usize = last
                            .parse()
                            .map_err(|_| PatchError::InvalidIndex(path.clone()))?;
                        if index < items.len() {
                            items[index] = value;
                        } else if index == items.len() {
                            items.push(value);
                        } else {
                            return Err(PatchError::IndexOutOfRange(path));
                        }
                    }
                }
                _ => return Err(PatchError::NotAContainer(path)),
            }
            Ok(())
        }
        None => {
            let Some(parent) = node_mut(document, &parents) else {
                return Ok(());
            };
            match parent {
                Value::Object(map) => {
                    map.shift_remove(&last);
                }
                Value::Array(items) => {
                    if let Ok(index) = last.parse::<usize>() {
                        if index < items.len() {
                            items.remove(index);
                        }
                    }
                }
                _ => {}
            }
            Ok(())
        }
    }
}

fn validate_final(
    parent: Option<&Value>,
    last: &str,
    op: PatchOp,
    path: &str,
) -> Result<FinalSite, PatchError> {
    let Some(parent) = parent else {
        // Parent will be created as an object; only insertions make sense.
        if last == pointer::APPEND_TOKEN {
            return Err(PatchError::InvalidAppend(path.to_string()));
        }
        return Ok(FinalSite::ObjectKey { before: None });
    };
    match parent {
        Value::Object(map) => {
            if last == pointer::APPEND_TOKEN {
                return Err(PatchError::InvalidAppend(path.to_string()));
            }
            let before = map.get(last).cloned();
            if op == PatchOp::Remove && before.is_none() {
                return Err(PatchError::Missing(path.to_string()));
            }
            Ok(FinalSite::ObjectKey { before })
        }
        Value::Array(items) => {
            if last == pointer::APPEND_TOKEN {
                if op == PatchOp::Add {
                    return Ok(FinalSite::ListAppend);
                }
                return Err(PatchError::InvalidAppend(path.to_string()));
            }
            let index: usize = last
                .parse()
                .map_err(|_| PatchError::InvalidIndex(path.to_string()))?;
            match op {
                PatchOp::Add => {
                    if index < items.len() {
                        Ok(FinalSite::ListIndex {
                            index,
                            before: Value::Null,
                        })
                    } else if index == items.len() {
                        Ok(FinalSite::ListAppend)
                    } else {
                        Err(PatchError::IndexOutOfRange(path.to_string()))
                    }
                }
                PatchOp::Replace | PatchOp::Remove => match items.get(index) {
                    Some(existing) => Ok(FinalSite::ListIndex {
                        index,
                        before: existing.clone(),
                    }),
                    None => Err(PatchError::IndexOutOfRange(path.to_string())),
                },
            }
        }
        _ => Err(PatchError::NotAContainer(path.to_string())),
    }
}

fn descend_creating<'a>(
    document: &'a mut Value,
    parents: &[String],
) -> Result<&'a mut Value, PatchError> {
    let mut current = document;
    let mut walked = String::new();
    for segment in parents {
        walked.push('/');
        walked.push_str(segment);
        current = match current {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| PatchError::InvalidIndex(walked.clone()))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| PatchError::IndexOutOfRange(walked.clone()))?
            }
            _ => return Err(PatchError::NotAContainer(walked)),
        };
    }
    Ok(current)
}

fn node_mut<'a>(document: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut current = document;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}
