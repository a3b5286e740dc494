//! Component-State Integration Tests
//!
//! Component-state handles created through `ThreadProvider`, reconciling
//! props, server-confirmed message state, and debounced remote writes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use threadline::{
    GenerationStage, MessageContext, SendMessageOptions, ThreadEvent, ThreadProvider,
    ThreadlineConfig, ToolRegistry,
};

use crate::support::{assistant, provider_with, response, ScriptedClient, THREAD};

// ============================================================================
// Helpers
// ============================================================================

/// Provider whose thread holds assistant message `m1` with `count = 5`.
async fn provider_after_reply(client: Arc<ScriptedClient>) -> ThreadProvider {
    let mut reply = assistant("m1", "Here is a counter");
    reply.component_state.insert("count".to_string(), json!(5));
    client.push_response(response(reply, GenerationStage::Complete));

    let provider = provider_with(client, ToolRegistry::new(), ThreadlineConfig::default());
    provider
        .send_message("Show a counter", SendMessageOptions::new().streamed(false))
        .await
        .unwrap();
    provider
}

fn ctx() -> MessageContext {
    MessageContext::new(THREAD, "m1")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_server_value_wins_over_props() {
    let client = Arc::new(ScriptedClient::new());
    let provider = provider_after_reply(client).await;

    let state = provider.component_state::<u32>(ctx(), "count", 0);
    assert_eq!(state.value(), 5);

    assert!(!state.set_from_prop(1));
    assert!(!state.set_from_prop(2));
    assert_eq!(state.value(), 5);
}

#[tokio::test]
async fn test_props_apply_until_server_value_exists() {
    let client = Arc::new(ScriptedClient::new());
    let provider = provider_after_reply(client).await;

    let state = provider.component_state::<String>(ctx(), "title", "Untitled".to_string());
    assert_eq!(state.value(), "Untitled");
    assert!(state.set_from_prop("Draft".to_string()));
    assert_eq!(state.value(), "Draft");
}

#[tokio::test]
async fn test_write_patches_local_message_and_remote_store() {
    let client = Arc::new(ScriptedClient::new());
    let provider = provider_after_reply(client.clone()).await;
    let mut rx = provider.subscribe();

    let state = provider.component_state::<u32>(ctx(), "count", 0);
    state.set_value(6).unwrap();

    let message = provider.thread(THREAD).unwrap().message("m1").cloned().unwrap();
    assert_eq!(message.component_state["count"], 6);
    match rx.try_recv().unwrap() {
        ThreadEvent::MessageUpdated { message, .. } => assert_eq!(message.id, "m1"),
        other => panic!("unexpected event {other:?}"),
    }

    state.flush().await;
    let writes = client.state_writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, THREAD);
    assert_eq!(writes[0].1, "m1");
    assert_eq!(writes[0].2["count"], 6);
}

#[tokio::test(start_paused = true)]
async fn test_remote_writes_are_debounced() {
    let client = Arc::new(ScriptedClient::new());
    let provider = provider_after_reply(client.clone()).await;
    let state = provider.component_state::<u32>(ctx(), "count", 0);

    state.set_value(1).unwrap();
    state.set_value(2).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    state.set_value(3).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(client.state_writes.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let writes = client.state_writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].2["count"], 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_sends_pending_write() {
    let client = Arc::new(ScriptedClient::new());
    let provider = provider_after_reply(client.clone()).await;

    let state = provider.component_state::<u32>(ctx(), "count", 0);
    state.set_value(9).unwrap();
    drop(state);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let writes = client.state_writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].2["count"], 9);
}

#[tokio::test]
async fn test_failed_remote_write_keeps_local_value() {
    let client = Arc::new(ScriptedClient::new().with_failing_state_writes());
    let provider = provider_after_reply(client.clone()).await;

    let state = provider.component_state::<u32>(ctx(), "count", 0);
    state.set_value(11).unwrap();
    state.shutdown().await;

    let message = provider.thread(THREAD).unwrap().message("m1").cloned().unwrap();
    assert_eq!(message.component_state["count"], 11);
    assert_eq!(client.state_writes.lock().unwrap().len(), 1);

    let state = provider.component_state::<u32>(ctx(), "count", 0);
    assert_eq!(state.value(), 11);
}

#[tokio::test]
async fn test_failed_write_is_reported_on_handle() {
    let client = Arc::new(ScriptedClient::new().with_failing_state_writes());
    let provider = provider_after_reply(client).await;

    let state = provider.component_state::<u32>(ctx(), "count", 0);
    state.set_value(4).unwrap();
    state.flush().await;

    assert_eq!(state.value(), 4);
    assert_eq!(state.last_error().as_deref(), Some("HTTP 503: unavailable"));
}
