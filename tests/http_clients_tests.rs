//! HTTP clients against a local mock server: LLM failover, tool-call decoding,
//! platform request shapes, and media job deadlines.

mod common;

use rand::Rng;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{persona, start_time, Harness, HarnessOptions};
use persona_core::clients::{
    ComfyJobGenerator, HttpPlatformClient, HttpPlatformConnector, PlatformClient, PlatformConnector, VideoGenerator,
};
use persona_core::config::{MediaConfig, PlatformConfig};
use persona_core::constants::{PersonaRole, Tier};
use persona_core::error::{ClientErrorKind, LlmError, MediaError};
use persona_core::llm::{ChatMessage, CompletionRequest, LlmBackend, LlmClientPool, OllamaBackend, ToolDefinition};
use persona_core::utils::{shared_rng, Clock, ManualClock};

fn backend(label: &str, server: &MockServer) -> Arc<dyn LlmBackend> {
    Arc::new(OllamaBackend::new(label, &server.uri(), "llama3", Client::new(), 0.7, 256))
}

fn platform(server: &MockServer, key: Option<&str>) -> HttpPlatformClient {
    HttpPlatformClient::new(
        "alpha",
        key.map(str::to_string),
        &server.uri(),
        Client::new(),
        Duration::from_secs(30),
    )
}

/// A generator whose queue accepts `job-7` and never finishes it
async fn stalled_generator(server: &MockServer, clock: Arc<ManualClock>) -> ComfyJobGenerator {
    Mock::given(method("GET"))
        .and(path("/system_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "system": {} })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prompt_id": "job-7" })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/history/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;

    let config = MediaConfig {
        generator_url: Some(format!("{}/", server.uri())),
        poll_interval_secs: 5,
        deadline_secs: 60,
        ..MediaConfig::default()
    };
    ComfyJobGenerator::new(&config, Client::new(), clock, shared_rng(Some(3)))
}

#[tokio::test]
async fn completion_fails_over_to_the_next_backend() {
    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .expect(1)
        .mount(&broken)
        .await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "llama3", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Love the pacing here.  " } }]
        })))
        .expect(1)
        .mount(&healthy)
        .await;

    let pool = LlmClientPool::with_backends(vec![backend("primary", &broken), backend("fallback", &healthy)]);
    let text = pool
        .complete(&CompletionRequest::new("You are a viewer.", "Say something.", 80))
        .await;

    assert_eq!(text.as_deref(), Some("Love the pacing here."));
}

#[tokio::test]
async fn completion_is_none_when_every_backend_fails() {
    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&broken)
        .await;

    let pool = LlmClientPool::with_backends(vec![backend("only", &broken)]);

    assert!(pool
        .complete(&CompletionRequest::new("system", "prompt", 20))
        .await
        .is_none());
}

#[tokio::test]
async fn tool_turns_decode_string_encoded_arguments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    { "function": { "name": "watch_video", "arguments": "{\"video_id\": \"K9pQ2xL\"}" } }
                ]
            }
        })))
        .mount(&server)
        .await;

    let pool = LlmClientPool::with_backends(vec![backend("local", &server)]);
    let tools = vec![ToolDefinition::new(
        "watch_video",
        "Watch a video",
        json!({ "type": "object", "properties": { "video_id": { "type": "string" } } }),
    )];
    let reply = pool
        .call_tools(&[ChatMessage::user("What now?")], &tools)
        .await
        .unwrap();

    assert_eq!(reply.backend, "local");
    assert_eq!(reply.message.tool_calls.len(), 1);
    assert_eq!(reply.message.tool_calls[0].name, "watch_video");
    assert_eq!(reply.message.tool_calls[0].arguments, json!({ "video_id": "K9pQ2xL" }));
}

#[tokio::test]
async fn tool_turns_report_exhaustion_across_all_backends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let pool = LlmClientPool::with_backends(vec![backend("a", &server), backend("b", &server)]);
    let err = pool.call_tools(&[ChatMessage::user("hi")], &[]).await.unwrap_err();

    assert!(matches!(err, LlmError::AllBackendsFailed { attempted: 2, .. }));
}

#[tokio::test]
async fn feed_decodes_wrapped_lists_and_aliased_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/feed"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [
                { "id": "K9pQ2xL", "title": "Tide pools", "creator": "bob", "views": 12 },
                { "video_id": "Zz99999", "title": "Night bus", "agent_name": "carol" }
            ],
            "page": 1
        })))
        .mount(&server)
        .await;

    let videos = platform(&server, None).feed(1).await.unwrap();

    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0].video_id, "K9pQ2xL");
    assert_eq!(videos[0].agent_name, "bob");
    assert_eq!(videos[0].views, 12);
    assert_eq!(videos[1].agent_name, "carol");
}

#[tokio::test]
async fn comments_carry_the_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/K9pQ2xL/comment"))
        .and(header("X-API-Key", "key-alpha"))
        .and(body_partial_json(json!({ "content": "Lovely light." })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    platform(&server, Some("key-alpha"))
        .comment("K9pQ2xL", "Lovely light.")
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_credentials_map_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/K9pQ2xL/vote"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = platform(&server, Some("stale")).like("K9pQ2xL").await.unwrap_err();

    assert_eq!(err.kind, ClientErrorKind::Unauthorized);
    assert_eq!(err.status, Some(401));
}

#[tokio::test]
async fn registration_returns_the_issued_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register"))
        .and(body_partial_json(json!({ "agent_name": "ghost" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "api_key": "issued-ghost" })))
        .mount(&server)
        .await;
    let connector = HttpPlatformConnector::from_config(&PlatformConfig {
        base_url: server.uri(),
        ..PlatformConfig::default()
    })
    .unwrap();

    let key = connector.register("ghost", "Ghost").await.unwrap();

    assert_eq!(key, "issued-ghost");
}

#[tokio::test]
async fn media_jobs_past_the_deadline_are_abandoned() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::new(start_time()));
    let generator = stalled_generator(&server, clock.clone()).await;

    let err = generator.generate("a lighthouse at dusk", "alpha").await.unwrap_err();

    match err {
        MediaError::DeadlineExceeded { job_id, deadline } => {
            assert_eq!(job_id, "job-7");
            assert_eq!(deadline, Duration::from_secs(60));
        }
        other => panic!("expected a deadline error, got {other:?}"),
    }
    assert_eq!((clock.now() - start_time()).num_seconds(), 60);
    let requests = server.received_requests().await.unwrap();
    let polls = requests
        .iter()
        .filter(|request| request.url.path() == "/history/job-7")
        .count();
    assert_eq!(polls, 12);

    // the workflow seed comes from the injected rng
    let submitted: serde_json::Value = requests
        .iter()
        .find(|request| request.url.path() == "/prompt")
        .unwrap()
        .body_json()
        .unwrap();
    let expected: u32 = shared_rng(Some(3)).lock().gen();
    assert_eq!(submitted["prompt"]["3"]["inputs"]["seed"], json!(expected));
}

#[tokio::test]
async fn an_abandoned_media_job_falls_back_to_the_compositor() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::new(start_time()));
    let generator = stalled_generator(&server, clock.clone()).await;
    let harness = Harness::with_clock(
        HarnessOptions {
            personas: vec![persona("alpha", Tier::Standard, PersonaRole::General)],
            generator: Arc::new(generator),
            ..HarnessOptions::default()
        },
        clock,
    )
    .await;
    let brain = harness.brain("alpha").await;
    let client = harness.client("alpha");

    let uploaded = harness.engine.generate_video(&brain, &client).await.unwrap();

    assert_eq!(uploaded.as_deref(), Some("up0001"));
    assert_eq!(harness.compositor.cards.lock().len(), 1);
    assert_eq!(harness.platform.uploads().len(), 1);
    assert_eq!(brain.videos_uploaded(), 1);
}
