//! Thread-Advance Integration Tests
//!
//! End-to-end runs of `ThreadProvider::send_message` against a scripted
//! client:
//! - Single-response tool loop and call budgets
//! - Streaming continuation after a tool call
//! - Streamed tool-call events and speculative previews
//! - Cancellation, admission control, errors
//! - Thread creation and auto-naming side effects

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;

use threadline::{
    GenerationStage, MessageRole, SendMessageOptions, ThreadEvent, ThreadlineConfig,
    ThreadlineError, ToolRegistry,
};
use threadline_client::StreamChunk;
use threadline_core::{FunctionTool, SchemaDescriptor, PLACEHOLDER_THREAD_ID};
use threadline_tools::ToolError;

use crate::support::{
    assistant, chunk, provider_with, response, with_tool_call, ScriptedClient, THREAD,
};

// ============================================================================
// Helpers
// ============================================================================

/// A tool that counts calls and records the arguments it saw.
fn counting_tool(
    name: &str,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Value>>>,
) -> FunctionTool {
    FunctionTool::new(
        name,
        "Looks things up",
        SchemaDescriptor::empty_object(),
        move |_ctx, args| {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(args.clone());
                Ok(json!({ "found": args }))
            })
        },
    )
}

fn stages(rx: &mut broadcast::Receiver<ThreadEvent>) -> Vec<GenerationStage> {
    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ThreadEvent::StageChanged { to, .. } = event {
            stages.push(to);
        }
    }
    stages
}

fn single_shot() -> SendMessageOptions {
    SendMessageOptions::new().streamed(false)
}

// ============================================================================
// Single-response path
// ============================================================================

#[tokio::test]
async fn test_single_response_tool_loop() {
    let client = Arc::new(ScriptedClient::new());
    client.push_response(response(
        with_tool_call(assistant("m1", ""), "call-1", "lookup", json!({"q": "rust"})),
        GenerationStage::FetchingContext,
    ));
    client.push_response(response(
        assistant("m2", "Rust is a language."),
        GenerationStage::Complete,
    ));

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let tools = ToolRegistry::new().with_tool(Arc::new(counting_tool("lookup", calls.clone(), seen.clone())));
    let provider = provider_with(client.clone(), tools, ThreadlineConfig::default());
    let mut rx = provider.subscribe();

    let message = provider.send_message("What is rust?", single_shot()).await.unwrap();

    assert_eq!(message.id, "m2");
    assert_eq!(message.text(), "Rust is a language.");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.lock().unwrap()[0], json!({"q": "rust"}));

    let thread = provider.current_thread();
    assert_eq!(thread.id, THREAD);
    assert_eq!(thread.generation_stage, GenerationStage::Complete);
    let tool_results: Vec<_> = thread
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .collect();
    assert_eq!(tool_results.len(), 1);
    assert_eq!(tool_results[0].tool_call_id.as_deref(), Some("call-1"));
    assert_eq!(tool_results[0].text(), r#"{"found":{"q":"rust"}}"#);

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].thread_id.is_none());
    assert_eq!(requests[1].thread_id.as_deref(), Some(THREAD));
    let resubmitted = &requests[1].params.message_to_append;
    assert_eq!(resubmitted.role, MessageRole::Tool);
    assert_eq!(resubmitted.tool_call_id.as_deref(), Some("call-1"));
    assert_eq!(requests[1].params.tool_call_counts["lookup"], 1);
    assert_eq!(requests[0].params.client_tools[0].name, "lookup");

    assert_eq!(
        stages(&mut rx),
        vec![
            GenerationStage::FetchingContext,
            GenerationStage::HydratingComponent,
            GenerationStage::Complete
        ]
    );
}

#[tokio::test]
async fn test_budget_exhaustion_returns_last_response() {
    let client = Arc::new(ScriptedClient::new());
    client.push_response(response(
        with_tool_call(assistant("m1", ""), "call-1", "lookup", json!({})),
        GenerationStage::FetchingContext,
    ));
    client.push_response(response(
        with_tool_call(assistant("m2", "again"), "call-2", "lookup", json!({})),
        GenerationStage::FetchingContext,
    ));
    client.push_response(response(assistant("m3", "never"), GenerationStage::Complete));

    let calls = Arc::new(AtomicUsize::new(0));
    let tool = counting_tool("lookup", calls.clone(), Arc::default()).with_max_calls(1);
    let provider = provider_with(
        client.clone(),
        ToolRegistry::new().with_tool(Arc::new(tool)),
        ThreadlineConfig::default(),
    );

    let message = provider.send_message("loop", single_shot()).await.unwrap();

    assert_eq!(message.id, "m2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.requests().len(), 2);
    assert_eq!(provider.current_thread().generation_stage, GenerationStage::Complete);
}

#[tokio::test]
async fn test_streamed_budget_exhaustion_returns_last_message() {
    let client = Arc::new(ScriptedClient::new());
    client.push_stream(vec![chunk(
        with_tool_call(assistant("m1", ""), "call-1", "lookup", json!({})),
        GenerationStage::FetchingContext,
    )]);
    client.push_stream(vec![
        chunk(
            with_tool_call(assistant("m2", "again"), "call-2", "lookup", json!({})),
            GenerationStage::FetchingContext,
        ),
        chunk(assistant("m2", "never"), GenerationStage::Complete),
    ]);

    let calls = Arc::new(AtomicUsize::new(0));
    let tool = counting_tool("lookup", calls.clone(), Arc::default()).with_max_calls(1);
    let provider = provider_with(
        client.clone(),
        ToolRegistry::new().with_tool(Arc::new(tool)),
        ThreadlineConfig::default(),
    );

    let message = provider
        .send_message("loop", SendMessageOptions::new().streamed(true))
        .await
        .unwrap();

    assert_eq!(message.id, "m2");
    assert_eq!(message.text(), "again");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.requests().len(), 2);
    assert_eq!(provider.current_thread().generation_stage, GenerationStage::Complete);
}

#[tokio::test]
async fn test_per_send_limit_overrides_tool_limit() {
    let client = Arc::new(ScriptedClient::new());
    client.push_response(response(
        with_tool_call(assistant("m1", ""), "call-1", "lookup", json!({})),
        GenerationStage::FetchingContext,
    ));

    let calls = Arc::new(AtomicUsize::new(0));
    let tool = counting_tool("lookup", calls.clone(), Arc::default()).with_max_calls(5);
    let provider = provider_with(
        client.clone(),
        ToolRegistry::new().with_tool(Arc::new(tool)),
        ThreadlineConfig::default(),
    );

    let message = provider
        .send_message("go", single_shot().with_tool_limit("lookup", 0))
        .await
        .unwrap();

    assert_eq!(message.id, "m1");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_server() {
    let client = Arc::new(ScriptedClient::new());
    client.push_response(response(
        with_tool_call(assistant("m1", ""), "call-1", "missing_tool", json!({})),
        GenerationStage::FetchingContext,
    ));
    client.push_response(response(
        assistant("m2", "Sorry, that failed."),
        GenerationStage::Complete,
    ));
    let provider = provider_with(client.clone(), ToolRegistry::new(), ThreadlineConfig::default());

    let message = provider.send_message("use it", single_shot()).await.unwrap();
    assert_eq!(message.id, "m2");

    let requests = client.requests();
    let resubmitted = &requests[1].params.message_to_append;
    assert!(resubmitted.is_error);
    assert_eq!(resubmitted.error.as_deref(), Some("Tool not found: missing_tool"));

    let thread = provider.current_thread();
    let tool_result = thread
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert_eq!(tool_result.error.as_deref(), Some("Tool not found: missing_tool"));
}

#[tokio::test]
async fn test_failing_tool_does_not_abort_exchange() {
    let client = Arc::new(ScriptedClient::new());
    client.push_response(response(
        with_tool_call(assistant("m1", ""), "call-1", "flaky", json!({})),
        GenerationStage::FetchingContext,
    ));
    client.push_response(response(assistant("m2", "Recovered"), GenerationStage::Complete));

    let tool = FunctionTool::new(
        "flaky",
        "Always fails",
        SchemaDescriptor::empty_object(),
        |_ctx, _args| Box::pin(async { Err(threadline_core::CoreError::tool("disk full")) }),
    );
    let provider = provider_with(
        client.clone(),
        ToolRegistry::new().with_tool(Arc::new(tool)),
        ThreadlineConfig::default(),
    );

    let message = provider.send_message("try", single_shot()).await.unwrap();
    assert_eq!(message.text(), "Recovered");
    let requests = client.requests();
    let resubmitted = &requests[1].params.message_to_append;
    assert!(resubmitted.is_error);
    assert!(resubmitted.error.as_deref().unwrap().contains("disk full"));
}

// ============================================================================
// Streaming path
// ============================================================================

#[tokio::test]
async fn test_stream_reopens_after_tool_call() {
    let client = Arc::new(ScriptedClient::new());
    client.push_stream(vec![
        chunk(assistant("m1", "Let me check"), GenerationStage::StreamingResponse),
        chunk(
            with_tool_call(assistant("m1", "Let me check"), "call-1", "lookup", json!({"q": "tides"})),
            GenerationStage::FetchingContext,
        ),
        chunk(assistant("m1", "stale tail"), GenerationStage::StreamingResponse),
    ]);
    client.push_stream(vec![
        chunk(assistant("m2", "High tide"), GenerationStage::StreamingResponse),
        chunk(assistant("m2", "High tide is at 6pm."), GenerationStage::Complete),
    ]);

    let calls = Arc::new(AtomicUsize::new(0));
    let tools = ToolRegistry::new().with_tool(Arc::new(counting_tool("lookup", calls.clone(), Arc::default())));
    let provider = provider_with(client.clone(), tools, ThreadlineConfig::default());
    let mut rx = provider.subscribe();

    let message = provider
        .send_message("When is high tide?", SendMessageOptions::new())
        .await
        .unwrap();

    assert_eq!(message.id, "m2");
    assert_eq!(message.text(), "High tide is at 6pm.");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.requests().len(), 2);

    let thread = provider.current_thread();
    let ids: Vec<&str> = thread.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[1], "m1");
    assert_eq!(ids[3], "m2");
    assert_eq!(thread.messages[1].text(), "Let me check");
    assert_eq!(thread.messages[2].role, MessageRole::Tool);

    assert_eq!(
        stages(&mut rx),
        vec![
            GenerationStage::FetchingContext,
            GenerationStage::StreamingResponse,
            GenerationStage::FetchingContext,
            GenerationStage::StreamingResponse,
            GenerationStage::Complete
        ]
    );
}

#[tokio::test]
async fn test_streamed_tool_call_events() {
    let client = Arc::new(ScriptedClient::new());
    client.push_stream(vec![
        chunk(assistant("m1", "Drafting"), GenerationStage::StreamingResponse),
        StreamChunk::ToolCallStart {
            tool_call_id: "call-1".to_string(),
            tool_name: "preview".to_string(),
        },
        StreamChunk::ToolCallArgs {
            tool_call_id: "call-1".to_string(),
            delta: r#"{"title": "Hel"#.to_string(),
        },
        StreamChunk::ToolCallArgs {
            tool_call_id: "call-1".to_string(),
            delta: r#"lo"}"#.to_string(),
        },
        StreamChunk::ToolCallEnd {
            tool_call_id: "call-1".to_string(),
        },
    ]);
    client.push_stream(vec![chunk(assistant("m2", "Done"), GenerationStage::Complete)]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let tool = counting_tool("preview", Arc::default(), seen.clone()).with_streamable(true);
    let provider = provider_with(
        client.clone(),
        ToolRegistry::new().with_tool(Arc::new(tool)),
        ThreadlineConfig::default(),
    );

    let message = provider.send_message("draft", SendMessageOptions::new()).await.unwrap();
    assert_eq!(message.id, "m2");

    let thread = provider.current_thread();
    let requested = thread.message("m1").unwrap().pending_tool_call().unwrap();
    assert_eq!(requested.arguments, json!({"title": "Hello"}));

    let result = thread
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert_eq!(result.text(), r#"{"found":{"title":"Hello"}}"#);

    // Speculative previews only ever see complete prefixes of the final arguments.
    tokio::time::sleep(Duration::from_millis(20)).await;
    for args in seen.lock().unwrap().iter() {
        let title = args["title"].as_str().unwrap_or_default();
        assert!("Hello".starts_with(title), "unexpected preview args {args}");
    }
}

#[tokio::test]
async fn test_malformed_streamed_arguments_are_fatal() {
    let client = Arc::new(ScriptedClient::new());
    client.push_stream(vec![
        chunk(assistant("m1", ""), GenerationStage::StreamingResponse),
        StreamChunk::ToolCallStart {
            tool_call_id: "call-1".to_string(),
            tool_name: "lookup".to_string(),
        },
        StreamChunk::ToolCallArgs {
            tool_call_id: "call-1".to_string(),
            delta: r#"{"q":"#.to_string(),
        },
        StreamChunk::ToolCallEnd {
            tool_call_id: "call-1".to_string(),
        },
    ]);

    let calls = Arc::new(AtomicUsize::new(0));
    let tools = ToolRegistry::new().with_tool(Arc::new(counting_tool("lookup", calls.clone(), Arc::default())));
    let provider = provider_with(client, tools, ThreadlineConfig::default());

    let err = provider
        .send_message("go", SendMessageOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ThreadlineError::Tool(ToolError::MalformedArguments { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let thread = provider.current_thread();
    assert_eq!(thread.generation_stage, GenerationStage::Error);
    assert!(thread.messages.last().unwrap().error.is_some());
}

// ============================================================================
// Cancellation and admission
// ============================================================================

#[tokio::test]
async fn test_cancel_between_chunks_skips_tool() {
    let client = Arc::new(ScriptedClient::new());
    let tx = client.push_channel();

    let calls = Arc::new(AtomicUsize::new(0));
    let tools = ToolRegistry::new().with_tool(Arc::new(counting_tool("lookup", calls.clone(), Arc::default())));
    let provider = provider_with(client.clone(), tools, ThreadlineConfig::default());
    let mut rx = provider.subscribe();

    let driver = async {
        tx.send(Ok(chunk(assistant("m1", "Thinking"), GenerationStage::StreamingResponse)))
            .await
            .unwrap();
        loop {
            if let ThreadEvent::MessageAppended { message, .. } = rx.recv().await.unwrap() {
                if message.id == "m1" {
                    break;
                }
            }
        }
        provider.cancel().await;
        tx.send(Ok(chunk(
            with_tool_call(assistant("m1", "Thinking"), "call-1", "lookup", json!({})),
            GenerationStage::FetchingContext,
        )))
        .await
        .unwrap();
    };

    let (result, ()) = tokio::join!(
        provider.send_message("Hi", SendMessageOptions::new()),
        driver
    );

    let message = result.unwrap();
    assert_ne!(message.id, "m1");
    assert!(message.content.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.requests().len(), 1);
    assert_eq!(*client.cancels.lock().unwrap(), vec![THREAD.to_string()]);
    assert_eq!(
        provider.current_thread().generation_stage,
        GenerationStage::Cancelled
    );
    assert!(provider.is_idle());
}

#[tokio::test]
async fn test_cancel_then_stream_end_returns_placeholder() {
    let client = Arc::new(ScriptedClient::new());
    let tx = client.push_channel();
    let provider = provider_with(client.clone(), ToolRegistry::new(), ThreadlineConfig::default());
    let mut rx = provider.subscribe();

    let driver = async {
        let tx = tx;
        tx.send(Ok(chunk(assistant("m1", "Thinking"), GenerationStage::StreamingResponse)))
            .await
            .unwrap();
        loop {
            if let ThreadEvent::MessageAppended { message, .. } = rx.recv().await.unwrap() {
                if message.id == "m1" {
                    break;
                }
            }
        }
        provider.cancel().await;
        drop(tx);
    };

    let (result, ()) = tokio::join!(
        provider.send_message("Hi", SendMessageOptions::new()),
        driver
    );

    let message = result.unwrap();
    assert_ne!(message.id, "m1");
    assert!(message.content.is_empty());
    assert_eq!(
        provider.current_thread().generation_stage,
        GenerationStage::Cancelled
    );
}

#[tokio::test]
async fn test_busy_thread_rejects_input() {
    let client = Arc::new(ScriptedClient::new());
    let provider = provider_with(client.clone(), ToolRegistry::new(), ThreadlineConfig::default());
    provider
        .store()
        .set_stage(PLACEHOLDER_THREAD_ID, GenerationStage::StreamingResponse);

    let err = provider
        .send_message("hello?", SendMessageOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ThreadlineError::Busy {
            stage: GenerationStage::StreamingResponse,
            ..
        }
    ));
    assert!(client.requests().is_empty());
}

// ============================================================================
// Side effects
// ============================================================================

#[tokio::test]
async fn test_thread_creation_rehomes_and_patches_cache() {
    let client = Arc::new(ScriptedClient::new());
    client.push_response(response(assistant("m1", "Hello!"), GenerationStage::Complete));
    let provider = provider_with(client.clone(), ToolRegistry::new(), ThreadlineConfig::default());

    assert!(provider.thread_list(None).await.unwrap().is_empty());
    let mut rx = provider.subscribe();

    provider.send_message("Hi", single_shot()).await.unwrap();

    let thread = provider.current_thread();
    assert_eq!(thread.id, THREAD);
    assert!(thread.messages.iter().all(|m| m.thread_id == THREAD));
    assert_eq!(thread.messages[0].role, MessageRole::User);
    assert!(provider.thread(PLACEHOLDER_THREAD_ID).unwrap().messages.is_empty());

    let cached = provider.cached_thread_list(None).unwrap();
    assert_eq!(cached[0].id, THREAD);

    // The patched entry is stale, so the next listing goes to the server.
    provider.thread_list(None).await.unwrap();
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 2);

    let mut created = false;
    while let Ok(event) = rx.try_recv() {
        if let ThreadEvent::ThreadCreated { previous_id, thread_id } = event {
            assert_eq!(previous_id, PLACEHOLDER_THREAD_ID);
            assert_eq!(thread_id, THREAD);
            created = true;
        }
    }
    assert!(created);
}

#[tokio::test]
async fn test_auto_naming_after_threshold() {
    let client = Arc::new(ScriptedClient::new().with_generated_name("Greetings"));
    client.push_response(response(assistant("m1", "Hello!"), GenerationStage::Complete));
    let config = ThreadlineConfig {
        auto_generate_name_threshold: 2,
        ..Default::default()
    };
    let provider = provider_with(client, ToolRegistry::new(), config);
    let mut rx = provider.subscribe();

    provider.send_message("Hi", single_shot()).await.unwrap();

    let renamed = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let ThreadEvent::ThreadRenamed { name, .. } = rx.recv().await.unwrap() {
                return name;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(renamed, "Greetings");
    assert_eq!(provider.current_thread().name.as_deref(), Some("Greetings"));
}

#[tokio::test]
async fn test_access_token_is_cached() {
    let client = Arc::new(ScriptedClient::new());
    let mut reply = response(assistant("m1", "ok"), GenerationStage::Complete);
    reply.access_token = Some("tok-123".to_string());
    client.push_response(reply);
    let provider = provider_with(client, ToolRegistry::new(), ThreadlineConfig::default());

    assert!(provider.access_token().is_none());
    provider.send_message("Hi", single_shot()).await.unwrap();
    assert_eq!(provider.access_token().as_deref(), Some("tok-123"));
}
