mod common;

use std::sync::Arc;

use common::{connect_tools, text_response, tool_use_response, ScriptedLlm};
use serde_json::json;
use switchyard::agents::config::{AgentProfile, HistoryStrategy};
use switchyard::agents::core::CancelToken;
use switchyard::agents::domain::{AgentPort, Role, StreamEvent};
use switchyard::agents::error::{AgentError, LlmError};
use switchyard::agents::llm::ProviderEvent;
use switchyard::agents::memory::{FileHistoryStore, HistoryStore, InMemoryHistoryStore};
use switchyard::agents::AgentHandler;
use switchyard::dispatch::DispatchFacade;

fn handler(llm: Arc<ScriptedLlm>, store: Arc<dyn HistoryStore>) -> AgentHandler {
    let dispatch = Arc::new(DispatchFacade::new().unwrap());
    AgentHandler::new(dispatch, llm, store)
}

#[tokio::test]
async fn test_history_survives_handler_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()).unwrap());

    let llm = Arc::new(ScriptedLlm::new().with_response(text_response("Noted: Ada.")));
    let first = handler(llm, Arc::clone(&store));
    first.register_agent(AgentProfile::new("notes")).await;
    let result = first
        .execute("notes", json!({"prompt": "My name is Ada"}), Some("s1".to_string()))
        .await
        .unwrap();
    assert_eq!(result.session_id.as_deref(), Some("s1"));
    assert_eq!(result.conversation.len(), 2);

    // A fresh handler over the same directory sees the earlier exchange
    let reopened: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()).unwrap());
    let llm = Arc::new(ScriptedLlm::new().with_response(text_response("You are Ada.")));
    let second = handler(Arc::clone(&llm), reopened);
    second.register_agent(AgentProfile::new("notes")).await;
    let result = second
        .execute("notes", json!({"prompt": "Who am I?"}), Some("s1".to_string()))
        .await
        .unwrap();

    let requests = llm.requests.lock().unwrap();
    let sent: Vec<String> = requests[0].messages.iter().map(|m| m.text()).collect();
    assert_eq!(sent, vec!["My name is Ada", "Noted: Ada.", "Who am I?"]);
    assert_eq!(result.conversation.len(), 4);
}

#[tokio::test]
async fn test_aborted_run_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()).unwrap());
    let llm = Arc::new(ScriptedLlm::new().with_error(LlmError::Network("offline".to_string())));
    let handler = handler(llm, Arc::clone(&store));
    handler.register_agent(AgentProfile::new("notes")).await;

    let result = handler
        .execute("notes", json!("hello"), Some("s1".to_string()))
        .await
        .unwrap();

    assert!(result.error.is_some());
    assert!(store.load_history("notes", "s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_profile_strategy_trims_loaded_history() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()).unwrap());
    let llm = Arc::new(
        ScriptedLlm::new()
            .with_response(text_response("one"))
            .with_response(text_response("two"))
            .with_response(text_response("three")),
    );
    let handler = handler(Arc::clone(&llm), store).with_default_strategy(HistoryStrategy::Full);
    let mut profile = AgentProfile::new("short");
    profile.history = Some(HistoryStrategy::SlidingWindow { size: 2 });
    handler.register_agent(profile).await;

    for prompt in ["a", "b", "c"] {
        handler
            .execute("short", json!(prompt), Some("s1".to_string()))
            .await
            .unwrap();
    }

    let requests = llm.requests.lock().unwrap();
    let sent: Vec<String> = requests[2].messages.iter().map(|m| m.text()).collect();
    assert_eq!(sent, vec!["b", "two", "c"]);
}

#[tokio::test]
async fn test_streamed_turn_uses_agent_tools_and_leaves_history_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()).unwrap());
    let llm = Arc::new(ScriptedLlm::new().with_stream(vec![
        ProviderEvent::MessageStart,
        ProviderEvent::BlockStart { index: 0 },
        ProviderEvent::TextDelta {
            index: 0,
            text: "hi".to_string(),
        },
        ProviderEvent::TurnComplete,
    ]));
    let handler = handler(Arc::clone(&llm), Arc::clone(&store));
    connect_tools(handler.dispatch(), "A", &["search", "delete"]).await;
    handler
        .register_agent(AgentProfile::new("streamer").with_exclusions(vec!["delete".into()]))
        .await;

    let events = handler
        .execute_stream("streamer", json!("hello"), Some("s1".to_string()), CancelToken::new())
        .await
        .unwrap()
        .collect()
        .await;

    assert!(matches!(events.last(), Some(StreamEvent::TurnComplete { .. })));
    let offered: Vec<String> = llm.requests.lock().unwrap()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(offered, vec!["search"]);
    assert!(store.list_sessions(None, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tool_round_trip_is_persisted_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()).unwrap());
    let llm = Arc::new(
        ScriptedLlm::new()
            .with_response(tool_use_response(&[("tu_1", "search", json!({"q": "x"}))]))
            .with_response(text_response("found x")),
    );
    let handler = handler(llm, Arc::clone(&store));
    connect_tools(handler.dispatch(), "A", &["search"]).await;
    handler.register_agent(AgentProfile::new("finder")).await;

    handler
        .execute("finder", json!("find x"), Some("s1".to_string()))
        .await
        .unwrap();

    let stored = store.load_history("finder", "s1").await.unwrap();
    let roles: Vec<Role> = stored.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(stored[2].tool_result_ids(), vec!["tu_1"]);
}

#[tokio::test]
async fn test_unknown_agent_and_workflow() {
    let store: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::default());
    let handler = Arc::new(handler(Arc::new(ScriptedLlm::new()), store));

    let err = handler.execute("ghost", json!("hi"), None).await.unwrap_err();
    assert!(matches!(err, AgentError::NotFound(_)));

    let err = handler.run_workflow("missing", json!({})).await.unwrap_err();
    assert!(matches!(err, AgentError::WorkflowNotFound(_)));
}

#[tokio::test]
async fn test_agent_port_lists_registered_profiles() {
    let store: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::default());
    let llm = Arc::new(ScriptedLlm::new().with_response(text_response("hello back")));
    let handler = handler(llm, store);
    handler
        .register_agents(vec![
            AgentProfile::new("writer").with_max_iterations(3),
            AgentProfile::new("planner").with_allowed_clients(vec!["planning".into()]),
        ])
        .await;

    let port: &dyn AgentPort = &handler;
    let names: Vec<String> = port
        .list_agents()
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, vec!["planner", "writer"]);

    let planner = port.get_agent("planner").await.unwrap().unwrap();
    assert_eq!(planner.allowed_clients, Some(vec!["planning".to_string()]));
    assert!(port.get_agent("ghost").await.unwrap().is_none());

    let result = port.execute("writer", json!("hi"), None).await.unwrap();
    assert_eq!(result.final_text(), "hello back");
    assert!(result.session_id.is_some());

    let err = port.execute("ghost", json!("hi"), None).await.unwrap_err();
    assert!(err.to_string().contains("Agent not found: ghost"));
}
