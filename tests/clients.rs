//! HTTP client integration tests
//!
//! Runs the Watcher, LOR and Ollama clients against local mock servers

use std::time::Duration;

use second_gateway::health::{HealthCheck, ServiceState};
use second_gateway::{
    Assistant, ChatModel, Config, EpisodicStore, Error, Exchange, LorClient, ModelOptions,
    OllamaClient, PromptMessage, SearchSource, SourceTag, WatcherClient,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn watcher_search_filters_weak_and_empty_episodes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/search"))
        .and(body_partial_json(json!({"query": "deploy", "limit": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"content": "Deployed v2 on Monday.", "score": 0.82},
            {"content": "Unrelated chatter.", "score": 0.12},
            {"content": "   ", "score": 0.95},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = WatcherClient::new(&server.uri());
    let items = client.search("deploy").await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "Deployed v2 on Monday.");
    assert_eq!(items[0].tag, SourceTag::Episodic);
}

#[tokio::test]
async fn watcher_error_status_is_source_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = WatcherClient::new(&server.uri())
        .search("anything")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SourceUnavailable { name: "watcher", .. }));
}

#[tokio::test]
async fn watcher_stores_exchange_as_conversation_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(body_partial_json(json!({
            "source": "second",
            "event_type": "conversation",
            "content": "Q: hi\nA: hello",
            "metadata": {"context_sources": "none", "decay_policy": "standard"},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = WatcherClient::new(&server.uri());
    client
        .store_exchange(&Exchange::new("chat-1", "hi", "hello", "none"))
        .await
        .unwrap();
}

#[tokio::test]
async fn watcher_note_failure_is_persistence_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(body_partial_json(json!({"event_type": "note", "content": "buy milk"})))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = WatcherClient::new(&server.uri())
        .store_note("buy milk")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Persistence(_)));
}

#[tokio::test]
async fn watcher_write_without_ok_status_is_not_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let client = WatcherClient::new(&server.uri());
    let note = client.store_note("buy milk").await.unwrap_err();
    let exchange = client
        .store_exchange(&Exchange::new("chat-1", "hi", "hello", "none"))
        .await
        .unwrap_err();

    assert!(matches!(note, Error::Persistence(msg) if msg.contains("204")));
    assert!(matches!(exchange, Error::Persistence(_)));
}

#[tokio::test]
async fn lor_search_tags_collections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_partial_json(json!({"query": "ownership", "top_k": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"text": "Each value has a single owner.", "score": 0.9, "collection": "books"},
                {"text": "Borrowing rules.", "score": 0.6},
                {"text": "Off topic.", "score": 0.3, "collection": "docs"},
            ]
        })))
        .mount(&server)
        .await;

    let items = LorClient::new(&server.uri()).search("ownership").await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].tag, SourceTag::KnowledgeBooks);
    assert_eq!(items[1].tag, SourceTag::KnowledgeDocs);
}

#[tokio::test]
async fn lor_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = LorClient::new(&server.uri())
        .with_timeout(Duration::from_millis(100))
        .search("anything")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SourceUnavailable { name: "lor", .. }));
}

#[tokio::test]
async fn ollama_sends_options_and_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "qwen3:14b",
            "stream": false,
            "options": {"num_predict": 512, "num_ctx": 2560},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "Hello there."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), "qwen3:14b");
    let reply = client
        .complete(&[PromptMessage::user("hi")], &ModelOptions::default())
        .await
        .unwrap();

    assert_eq!(reply, "Hello there.");
}

#[tokio::test]
async fn ollama_missing_content_is_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let reply = OllamaClient::new(&server.uri(), "qwen3:14b")
        .complete(&[PromptMessage::user("hi")], &ModelOptions::default())
        .await
        .unwrap();

    assert_eq!(reply, "No response.");
}

#[tokio::test]
async fn ollama_error_status_is_model_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not found"))
        .mount(&server)
        .await;

    let err = OllamaClient::new(&server.uri(), "missing:1b")
        .complete(&[PromptMessage::user("hi")], &ModelOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::Model(msg) if msg.contains("500") && msg.contains("model not found")));
    assert!(err.is_user_visible());
}

#[tokio::test]
async fn ollama_slow_reply_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = OllamaClient::new(&server.uri(), "qwen3:14b")
        .with_timeout(Duration::from_millis(100))
        .complete(&[PromptMessage::user("hi")], &ModelOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ModelTimeout));
}

#[tokio::test]
async fn ollama_unreachable_is_reported() {
    // Nothing listens on the discard port in test environments
    let err = OllamaClient::new("http://127.0.0.1:9", "qwen3:14b")
        .complete(&[PromptMessage::user("hi")], &ModelOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ModelUnreachable));
}

#[tokio::test]
async fn health_probes_map_status_codes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert_eq!(WatcherClient::new(&server.uri()).health().await, ServiceState::Up);
    assert_eq!(LorClient::new(&server.uri()).health().await, ServiceState::Up);
    assert_eq!(
        OllamaClient::new(&server.uri(), "qwen3:14b").health().await,
        ServiceState::Degraded
    );
}

#[tokio::test]
async fn assistant_over_http_services() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"content": "You prefer short answers.", "score": 0.7}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"content": "Short answer."}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(body_partial_json(json!({"event_type": "conversation"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        ollama_url: server.uri(),
        watcher_url: server.uri(),
        lor_url: server.uri(),
        ..Config::default()
    };
    let assistant = Assistant::from_config(&config);

    let reply = assistant.handle_query("chat-1", "How should you answer?").await;
    assistant.drain().await;

    assert!(!reply.is_error());
    assert!(!reply.degraded);
    assert_eq!(reply.text, "Short answer.");
    assert_eq!(reply.sources, "episodic:1");
}
