//! Integration tests for the flow runner against in-memory ports

use std::sync::Arc;

use leadflow_core::{EngineConfig, Flow, InboundMessage, LeadSnapshot, NodeFailure, PortError};
use leadflow_memory::{InMemoryLeadStore, InMemoryPorts};
use leadflow_runtime::{
    Effect, FlowRunner, NodeDispatcher, NodeStatus, RunEvent, RunResult, RunStatus,
};
use tokio::sync::mpsc;

const WELCOME_FLOW: &str = r#"
id: welcome
tenantId: acme
name: Welcome
graph:
  nodes:
    - id: start
      type: trigger
      data:
        keyword: oi
    - id: greet
      type: message
      data:
        text: "Olá! Como posso ajudar?"
  edges:
    - id: e1
      source: start
      target: greet
"#;

const PROMO_FLOW: &str = r#"
id: promo
tenantId: acme
name: Promo
graph:
  nodes:
    - id: start
      type: trigger
      data:
        keyword: promo
    - id: is-new
      type: condition
      data:
        field: status
        equals: novo
    - id: welcome
      type: message
      data:
        text: "Bem-vindo!"
    - id: tag
      type: action
      data:
        actionType: add_tag
        tag: recorrente
  edges:
    - { id: e1, source: start, target: is-new }
    - { id: e2, source: is-new, target: welcome, sourceHandle: "true" }
    - { id: e3, source: is-new, target: tag, sourceHandle: "false" }
"#;

fn leads() -> InMemoryPorts {
    let store = InMemoryLeadStore::new();
    store.insert(
        LeadSnapshot::new("lead-new")
            .with_phone("+5511999990001")
            .with_attribute("status", "novo"),
    );
    store.insert(
        LeadSnapshot::new("lead-client")
            .with_phone("+5511999990002")
            .with_attribute("status", "cliente"),
    );
    InMemoryPorts::with_leads(store)
}

fn runner(ports: &InMemoryPorts, config: &EngineConfig) -> FlowRunner {
    let dispatcher = Arc::new(NodeDispatcher::new(ports.ports(), config));
    FlowRunner::new(dispatcher, config)
}

async fn run(runner: &FlowRunner, flow: &Flow, lead_id: &str, text: &str) -> RunResult {
    let event = Arc::new(InboundMessage::new("acme", "wa-1", lead_id, text));
    runner.run(flow, "start", runner.context_for(event)).await
}

#[tokio::test]
async fn test_scenario_welcome_message() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(WELCOME_FLOW).unwrap();

    let result = run(&runner, &flow, "lead-new", "Oi, bom dia").await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.steps, 1);
    assert_eq!(ports.sender.sent_texts(), vec!["Olá! Como posso ajudar?"]);
    assert_eq!(ports.sender.sent()[0].address, "+5511999990001");
    assert_eq!(ports.message_log.records_for("lead-new").len(), 1);
}

#[tokio::test]
async fn test_scenario_promo_new_lead_gets_welcome() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(PROMO_FLOW).unwrap();

    let result = run(&runner, &flow, "lead-new", "quero a PROMO").await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(ports.sender.sent_texts(), vec!["Bem-vindo!"]);
    assert!(result.node("tag").is_none());
    assert_eq!(ports.leads.tag_writes(), 0);
}

#[tokio::test]
async fn test_scenario_promo_client_is_tagged_once() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(PROMO_FLOW).unwrap();

    let first = run(&runner, &flow, "lead-client", "promo").await;
    let second = run(&runner, &flow, "lead-client", "promo").await;

    assert!(ports.sender.sent().is_empty());
    assert_eq!(ports.leads.tags("lead-client"), vec!["recorrente"]);
    assert_eq!(ports.leads.tag_writes(), 1);

    assert_eq!(
        first.node("tag").unwrap().effect,
        Some(Effect::TagAdded {
            tag: "recorrente".into()
        })
    );
    assert_eq!(
        second.node("tag").unwrap().effect,
        Some(Effect::TagAlreadyPresent {
            tag: "recorrente".into()
        })
    );
}

#[tokio::test]
async fn test_entry_without_edges_has_no_side_effects() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(
        r#"
id: inert
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: oi } }
    - { id: orphan, type: message, data: { text: never } }
"#,
    )
    .unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.steps, 0);
    assert!(result.nodes.is_empty());
    assert!(ports.sender.sent().is_empty());
}

#[tokio::test]
async fn test_fan_out_isolates_failures() {
    let ports = leads();
    ports.sender.fail_on("first");
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(
        r#"
id: fanout
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: oi } }
    - { id: m1, type: message, data: { text: first } }
    - { id: m1-next, type: message, data: { text: after-first } }
    - { id: m2, type: message, data: { text: second } }
  edges:
    - { source: start, target: m1 }
    - { source: start, target: m2 }
    - { source: m1, target: m1-next }
"#,
    )
    .unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(ports.sender.sent_texts(), vec!["second"]);
    assert_eq!(result.failed_nodes(), 1);
    assert_eq!(result.errors[0].node_id, "m1");
    assert!(matches!(
        result.errors[0].cause,
        NodeFailure::Port(PortError::Rejected(_))
    ));
    assert_eq!(result.node("m1").unwrap().status, NodeStatus::Failed);
    assert!(result.node("m1-next").is_none());
}

#[tokio::test]
async fn test_cycle_terminates_run() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(
        r#"
id: loop
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: oi } }
    - { id: a, type: message, data: { text: A } }
    - { id: b, type: message, data: { text: B } }
  edges:
    - { source: start, target: a }
    - { source: a, target: b }
    - { source: b, target: a }
"#,
    )
    .unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;

    assert_eq!(
        result.status,
        RunStatus::CycleDetected {
            node_id: "a".into()
        }
    );
    assert!(result.status.is_guard_trip());
    assert_eq!(ports.sender.sent_texts(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_step_limit() {
    let ports = leads();
    let config = EngineConfig::default().with_max_steps(3);
    let runner = runner(&ports, &config);
    let flow = Flow::from_yaml(
        r#"
id: long
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: oi } }
    - { id: m1, type: message, data: { text: "1" } }
    - { id: m2, type: message, data: { text: "2" } }
    - { id: m3, type: message, data: { text: "3" } }
    - { id: m4, type: message, data: { text: "4" } }
  edges:
    - { source: start, target: m1 }
    - { source: m1, target: m2 }
    - { source: m2, target: m3 }
    - { source: m3, target: m4 }
"#,
    )
    .unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;

    assert_eq!(result.status, RunStatus::StepLimitExceeded { limit: 3 });
    assert_eq!(result.steps, 3);
    assert_eq!(ports.sender.sent_texts(), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_unbounded_step_setting_does_not_overflow() {
    let ports = leads();
    let config = EngineConfig::default().with_max_steps(usize::MAX);
    let runner = runner(&ports, &config);
    let flow = Flow::from_yaml(WELCOME_FLOW).unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(ports.sender.sent_texts(), vec!["Olá! Como posso ajudar?"]);
}

#[tokio::test]
async fn test_reconverging_branches_stop_at_shared_node() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(
        r#"
id: diamond
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: oi } }
    - { id: b, type: message, data: { text: B } }
    - { id: c, type: message, data: { text: C } }
    - { id: d, type: message, data: { text: D } }
  edges:
    - { source: start, target: b }
    - { source: start, target: c }
    - { source: b, target: d }
    - { source: c, target: d }
"#,
    )
    .unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;

    // The shared node runs once, via the first branch
    assert_eq!(
        result.status,
        RunStatus::CycleDetected {
            node_id: "d".into()
        }
    );
    assert_eq!(ports.sender.sent_texts(), vec!["B", "D", "C"]);
    assert_eq!(result.steps, 3);
}

#[tokio::test]
async fn test_condition_follows_at_most_one_branch() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(
        r#"
id: partial
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: oi } }
    - { id: check, type: condition, data: { field: status, equals: novo } }
    - { id: yes, type: message, data: { text: yes } }
    - { id: unlabelled, type: message, data: { text: unlabelled } }
  edges:
    - { source: start, target: check }
    - { source: check, target: yes, sourceHandle: "true" }
    - { source: check, target: unlabelled }
"#,
    )
    .unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;
    assert_eq!(ports.sender.sent_texts(), vec!["yes"]);
    assert_eq!(result.node("check").unwrap().branch, Some(true.into()));

    ports.sender.clear();
    let result = run(&runner, &flow, "lead-client", "oi").await;
    assert_eq!(result.status, RunStatus::Completed);
    assert!(ports.sender.sent().is_empty());
    assert_eq!(result.steps, 1);
}

#[tokio::test]
async fn test_unknown_nodes_pass_through() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(
        r#"
id: forward
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: oi } }
    - { id: ai, type: aiReply, data: { prompt: hello } }
    - { id: done, type: message, data: { text: done } }
  edges:
    - { source: start, target: ai }
    - { source: ai, target: done }
"#,
    )
    .unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;
    assert_eq!(result.node("ai").unwrap().status, NodeStatus::Skipped);
    assert_eq!(ports.sender.sent_texts(), vec!["done"]);
}

#[tokio::test]
async fn test_invalid_entry() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(WELCOME_FLOW).unwrap();

    let event = Arc::new(InboundMessage::new("acme", "wa-1", "lead-new", "oi"));
    let result = runner.run(&flow, "ghost", runner.context_for(event)).await;
    assert_eq!(
        result.status,
        RunStatus::InvalidEntry {
            node_id: "ghost".into()
        }
    );
    assert!(ports.sender.sent().is_empty());
}

#[tokio::test]
async fn test_run_events() {
    let ports = leads();
    let (tx, mut rx) = mpsc::channel(32);
    let runner = runner(&ports, &EngineConfig::default()).with_event_channel(tx);
    let flow = Flow::from_yaml(WELCOME_FLOW).unwrap();

    let result = run(&runner, &flow, "lead-new", "oi").await;
    drop(runner);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], RunEvent::Started { flow_id, .. } if flow_id == "welcome"));
    assert!(matches!(&events[1], RunEvent::NodeStarted { node_id, .. } if node_id == "greet"));
    assert!(matches!(&events[2], RunEvent::NodeCompleted { node_id, .. } if node_id == "greet"));
    assert!(matches!(
        &events[3],
        RunEvent::Completed { run_id, status: RunStatus::Completed, steps: 1 } if *run_id == result.run_id
    ));
}

#[tokio::test]
async fn test_run_result_serializes() {
    let ports = leads();
    let runner = runner(&ports, &EngineConfig::default());
    let flow = Flow::from_yaml(PROMO_FLOW).unwrap();

    let result = run(&runner, &flow, "lead-client", "promo").await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["status"], "completed");
    assert_eq!(json["flow_id"], "promo");
    assert_eq!(json["nodes"][0]["branch"], "false");
    assert_eq!(json["nodes"][1]["effect"]["effect"], "tag_added");
}
