//! End-to-end scenarios over full documents.
//!
//! Each scenario builds a contract-annotated document, drives it through
//! the public entry points, and asserts on the resulting document, the
//! root emissions, and the gas figure.

use pact_engine::ProcessorEngine;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn timeline_entry(timeline: &str, ts: i64, text: &str) -> Value {
    json!({
        "type": "Timeline Entry",
        "timeline": {"timelineId": timeline},
        "timestamp": ts,
        "message": {"text": text},
    })
}

// =============================================================================
// Initialization
// =============================================================================

mod initialization {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lifecycle_handlers_run_in_declared_order() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "x": 0,
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "second": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "order": 1,
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "REPLACE", "path": "/x", "val": 10 }
                        ]}
                    ]
                },
                "first": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "order": 0,
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "REPLACE", "path": "/x", "val": 5 }
                        ]}
                    ]
                },
            }
        });

        let result = engine.initialize_document(&doc).unwrap();
        assert_eq!(result.document["x"], json!(10));
        assert!(result.total_gas > 0);

        let lifecycle: Vec<&Value> = result
            .triggered_events
            .iter()
            .filter(|e| e["type"] == "Document Processing Initiated")
            .collect();
        assert_eq!(lifecycle.len(), 1);
        assert!(lifecycle[0]["documentId"].is_string());
    }

    #[test]
    fn embedded_children_initialize_before_the_parent() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "order": [],
            "child": {
                "contracts": {
                    "onInit": { "type": "Lifecycle Event Channel" },
                    "mark": {
                        "type": "Sequential Workflow",
                        "channel": "onInit",
                        "steps": [
                            { "type": "Update Document", "changeset": [
                                { "op": "ADD", "path": "/done", "val": true }
                            ]}
                        ]
                    }
                }
            },
            "contracts": {
                "embedded": { "type": "Process Embedded", "paths": ["/child"] },
            }
        });

        let result = engine.initialize_document(&doc).unwrap();
        // both scopes initialized, child work landed inside the child
        assert!(result.document["contracts"]["initialized"].is_object());
        assert!(result.document["child"]["contracts"]["initialized"].is_object());
        assert_eq!(result.document["child"]["done"], json!(true));
    }
}

// =============================================================================
// Checkpoint dedup and recency
// =============================================================================

mod checkpoints {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed_document() -> Value {
        json!({
            "log": [],
            "contracts": {
                "feed": { "type": "Timeline Channel", "timelineId": "tl-1" },
                "record": {
                    "type": "Sequential Workflow",
                    "channel": "feed",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "ADD", "path": "/log/-", "val": "${event.message.text}" }
                        ]}
                    ]
                }
            }
        })
    }

    #[test]
    fn identical_events_process_once() {
        let engine = ProcessorEngine::new();
        let doc = engine.initialize_document(&feed_document()).unwrap().document;
        let entry = timeline_entry("tl-1", 100, "hello");

        let once = engine.process_document(&doc, &entry).unwrap().document;
        assert_eq!(once["log"], json!(["hello"]));

        let twice = engine.process_document(&once, &entry).unwrap().document;
        assert_eq!(twice["log"], json!(["hello"]));
    }

    #[test]
    fn changed_field_reprocesses() {
        let engine = ProcessorEngine::new();
        let doc = engine.initialize_document(&feed_document()).unwrap().document;

        let first = engine
            .process_document(&doc, &timeline_entry("tl-1", 100, "hello"))
            .unwrap()
            .document;
        let second = engine
            .process_document(&first, &timeline_entry("tl-1", 200, "again"))
            .unwrap()
            .document;
        assert_eq!(second["log"], json!(["hello", "again"]));
    }

    #[test]
    fn stale_entries_are_vetoed_by_recency() {
        let engine = ProcessorEngine::new();
        let doc = engine.initialize_document(&feed_document()).unwrap().document;

        let current = engine
            .process_document(&doc, &timeline_entry("tl-1", 200, "newer"))
            .unwrap()
            .document;
        let after_stale = engine
            .process_document(&current, &timeline_entry("tl-1", 100, "older"))
            .unwrap()
            .document;
        assert_eq!(after_stale["log"], json!(["newer"]));
    }

    #[test]
    fn other_timelines_do_not_match() {
        let engine = ProcessorEngine::new();
        let doc = engine.initialize_document(&feed_document()).unwrap().document;
        let result = engine
            .process_document(&doc, &timeline_entry("tl-2", 100, "stranger"))
            .unwrap();
        assert_eq!(result.document["log"], json!([]));
    }

    #[test]
    fn composite_children_dedupe_independently() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "log": [],
            "contracts": {
                "alpha": { "type": "Timeline Channel", "timelineId": "tl-a" },
                "beta": { "type": "Timeline Channel", "timelineId": "tl-b" },
                "combo": { "type": "Composite Timeline Channel", "channels": ["alpha", "beta"] },
                "record": {
                    "type": "Sequential Workflow",
                    "channel": "combo",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "ADD", "path": "/log/-", "val": "${event.message.text}" }
                        ]}
                    ]
                }
            }
        });
        let doc = engine.initialize_document(&doc).unwrap().document;

        let doc = engine
            .process_document(&doc, &timeline_entry("tl-a", 10, "a1"))
            .unwrap()
            .document;
        let doc = engine
            .process_document(&doc, &timeline_entry("tl-b", 10, "b1"))
            .unwrap()
            .document;
        assert_eq!(doc["log"], json!(["a1", "b1"]));

        // same alpha entry again: deduped under its namespaced checkpoint
        let doc = engine
            .process_document(&doc, &timeline_entry("tl-a", 10, "a1"))
            .unwrap()
            .document;
        assert_eq!(doc["log"], json!(["a1", "b1"]));

        let checkpoints = &doc["contracts"]["checkpoint"]["lastEvents"];
        assert!(checkpoints.get("combo::alpha").is_some());
        assert!(checkpoints.get("combo::beta").is_some());
    }
}

// =============================================================================
// Boundary enforcement and termination
// =============================================================================

mod boundaries {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn patching_the_scope_root_terminates_the_scope() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "bad": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "REPLACE", "path": "/", "val": {} }
                        ]}
                    ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        let terminated = &result.document["contracts"]["terminated"];
        assert_eq!(terminated["cause"], json!("fatal"));
        assert!(terminated["reason"]
            .as_str()
            .is_some_and(|r| r.contains("scope root")));
    }

    #[test]
    fn reserved_key_writes_terminate_the_scope() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "bad": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "ADD", "path": "/contracts/terminated", "val": {"cause": "graceful"} }
                        ]}
                    ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        assert_eq!(result.document["contracts"]["terminated"]["cause"], json!("fatal"));
    }

    #[test]
    fn child_violation_leaves_siblings_and_parent_running() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "bad": {
                "contracts": {
                    "onInit": { "type": "Lifecycle Event Channel" },
                    "escape": {
                        "type": "Sequential Workflow",
                        "channel": "onInit",
                        "steps": [
                            // the scope root of /bad
                            { "type": "Update Document", "changeset": [
                                { "op": "REPLACE", "path": "/", "val": 1 }
                            ]}
                        ]
                    }
                }
            },
            "good": {
                "contracts": {
                    "onInit": { "type": "Lifecycle Event Channel" },
                    "work": {
                        "type": "Sequential Workflow",
                        "channel": "onInit",
                        "steps": [
                            { "type": "Update Document", "changeset": [
                                { "op": "ADD", "path": "/ok", "val": true }
                            ]}
                        ]
                    }
                }
            },
            "contracts": {
                "embedded": { "type": "Process Embedded", "paths": ["/bad", "/good"] },
            }
        });

        let result = engine.initialize_document(&doc).unwrap();
        // the violating scope terminated, its mutation absent
        assert_eq!(
            result.document["bad"]["contracts"]["terminated"]["cause"],
            json!("fatal")
        );
        assert_ne!(result.document["bad"], json!(1));
        // the sibling and the root finished their work
        assert_eq!(result.document["good"]["ok"], json!(true));
        assert!(result.document["contracts"]["initialized"].is_object());
        assert!(result.document["good"]["contracts"]["initialized"].is_object());
    }
}

// =============================================================================
// Cascade routing
// =============================================================================

mod cascades {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn document_update_channels_fire_up_the_ancestor_chain() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "updates": [],
            "a": {
                "b": {},
                "contracts": {
                    "onInit": { "type": "Lifecycle Event Channel" },
                    "write": {
                        "type": "Sequential Workflow",
                        "channel": "onInit",
                        "steps": [
                            { "type": "Update Document", "changeset": [
                                { "op": "ADD", "path": "/b/c", "val": 42 }
                            ]}
                        ]
                    }
                }
            },
            "contracts": {
                "embedded": { "type": "Process Embedded", "paths": ["/a"] },
                "watch": { "type": "Document Update Channel", "path": "/a/b" },
                "onChange": {
                    "type": "Sequential Workflow",
                    "channel": "watch",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "ADD", "path": "/updates/-", "val": "${event.op}:${event.path}" }
                        ]}
                    ]
                }
            }
        });

        let result = engine.initialize_document(&doc).unwrap();
        assert_eq!(result.document["a"]["b"]["c"], json!(42));
        // root watcher observed the child's write, with a root-relative path
        assert_eq!(result.document["updates"], json!(["ADD:/a/b/c"]));
    }

    #[test]
    fn non_matching_watch_paths_stay_silent() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "updates": [],
            "x": 0,
            "contracts": {
                "watch": { "type": "Document Update Channel", "path": "/elsewhere" },
                "onChange": {
                    "type": "Sequential Workflow",
                    "channel": "watch",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "ADD", "path": "/updates/-", "val": "seen" }
                        ]}
                    ]
                },
                "onInit": { "type": "Lifecycle Event Channel" },
                "write": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "REPLACE", "path": "/x", "val": 1 }
                        ]}
                    ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        assert_eq!(result.document["x"], json!(1));
        assert_eq!(result.document["updates"], json!([]));
    }
}

// =============================================================================
// Emission, bridging, and triggered queues
// =============================================================================

mod emissions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn triggered_queue_drains_after_the_event() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "seen": [],
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "announce": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Trigger Event",
                          "event": { "type": "Greeting", "text": "hi" } }
                    ]
                },
                "onGreeting": {
                    "type": "Triggered Event Channel",
                    "event": { "type": "Greeting" }
                },
                "consume": {
                    "type": "Sequential Workflow",
                    "channel": "onGreeting",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "ADD", "path": "/seen/-", "val": "${event.text}" }
                        ]}
                    ]
                }
            }
        });

        let result = engine.initialize_document(&doc).unwrap();
        assert_eq!(result.document["seen"], json!(["hi"]));
        // root emissions include the triggered greeting
        assert!(result
            .triggered_events
            .iter()
            .any(|e| e["type"] == "Greeting"));
    }

    #[test]
    fn child_emissions_bridge_into_embedded_node_channels() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "echo": [],
            "child": {
                "contracts": {
                    "onInit": { "type": "Lifecycle Event Channel" },
                    "announce": {
                        "type": "Sequential Workflow",
                        "channel": "onInit",
                        "steps": [
                            { "type": "Trigger Event",
                              "event": { "type": "ChildReady", "who": "child" } }
                        ]
                    }
                }
            },
            "contracts": {
                "embedded": { "type": "Process Embedded", "paths": ["/child"] },
                "fromChild": {
                    "type": "Embedded Node Channel",
                    "path": "/child",
                    "event": { "type": "ChildReady" }
                },
                "record": {
                    "type": "Sequential Workflow",
                    "channel": "fromChild",
                    "steps": [
                        { "type": "Update Document", "changeset": [
                            { "op": "ADD", "path": "/echo/-", "val": "${event.who}" }
                        ]}
                    ]
                }
            }
        });

        let result = engine.initialize_document(&doc).unwrap();
        assert_eq!(result.document["echo"], json!(["child"]));
    }
}

// =============================================================================
// Must-understand failures
// =============================================================================

mod must_understand {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_contract_type_aborts_without_mutation() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "x": 1,
            "contracts": {
                "mystery": { "type": "Quantum Entanglement Channel" },
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        assert!(!result.is_success());
        assert!(result
            .capability_failure
            .as_deref()
            .is_some_and(|r| r.contains("Quantum Entanglement Channel")));
        // byte-for-byte the input
        assert_eq!(result.document, doc);
        assert!(result.triggered_events.is_empty());
    }
}

// =============================================================================
// Scripted steps and gas
// =============================================================================

mod scripts {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lua_steps_read_events_steps_and_document() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "base": 40,
            "total": 0,
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "compute": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Lua Code", "name": "Sum",
                          "code": "return { value = document('/base') + 2 }" },
                        { "type": "Update Document", "changeset": [
                            { "op": "REPLACE", "path": "/total", "val": "${steps.Sum.value}" }
                        ]}
                    ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        assert_eq!(result.document["total"], json!(42));
    }

    #[test]
    fn lua_returned_events_are_emitted() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "emit": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Lua Code",
                          "code": "return { events = { { type = 'Scripted', n = 1 } } }" }
                    ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        assert!(result
            .triggered_events
            .iter()
            .any(|e| e["type"] == "Scripted"));
    }

    #[test]
    fn script_errors_terminate_the_scope_with_the_code_in_the_reason() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "broken": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Lua Code", "code": "error('deliberate failure')" }
                    ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        let terminated = &result.document["contracts"]["terminated"];
        assert_eq!(terminated["cause"], json!("fatal"));
        let reason = terminated["reason"].as_str().unwrap_or_default();
        assert!(reason.contains("deliberate failure"));
        assert!(reason.contains("error('deliberate failure')"));
    }

    #[test]
    fn spinning_script_exhausts_its_budget_fatally() {
        let engine = ProcessorEngine::new().with_gas_budget(10_000);
        let doc = json!({
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "spin": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [
                        { "type": "Lua Code", "code": "while true do end" }
                    ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        let terminated = &result.document["contracts"]["terminated"];
        assert_eq!(terminated["cause"], json!("fatal"));
        assert!(terminated["reason"]
            .as_str()
            .is_some_and(|r| r.contains("while true do end")));
        // gas is still reported
        assert!(result.total_gas > 0);
    }

    #[test]
    fn unsupported_step_type_is_fatal() {
        let engine = ProcessorEngine::new();
        let doc = json!({
            "contracts": {
                "onInit": { "type": "Lifecycle Event Channel" },
                "odd": {
                    "type": "Sequential Workflow",
                    "channel": "onInit",
                    "steps": [ { "type": "Teleport" } ]
                }
            }
        });
        let result = engine.initialize_document(&doc).unwrap();
        assert!(result.document["contracts"]["terminated"]["reason"]
            .as_str()
            .is_some_and(|r| r.contains("Teleport")));
    }
}
