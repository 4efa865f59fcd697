use anyhow::{anyhow, Result as AnyResult};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use cortex_agent::{AgentConfig, Projector, TurnExecutor};
use cortex_api::auth::HeaderAuthenticator;
use cortex_api::config::Config;
use cortex_api::limits::{RateDecision, RateLimiter, Unlimited};
use cortex_api::routes;
use cortex_api::state::AppState;
use cortex_llm::{ChatClient, ChatRequest, ChatResponse, EventStream, StreamEvent, TokenUsage};
use cortex_store::{EntityKind, MemoryStore, MessageContent, MessageStore, NewMessage};
use cortex_tools::ToolRegistry;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

struct CannedClient;

#[async_trait]
impl ChatClient for CannedClient {
    async fn chat(&self, _request: ChatRequest) -> AnyResult<ChatResponse> {
        Err(anyhow!("not used"))
    }

    async fn chat_stream(&self, _request: ChatRequest) -> AnyResult<EventStream> {
        Ok(Box::pin(futures::stream::iter(vec![
            Ok(StreamEvent::TextDelta {
                content: "ok".to_string(),
            }),
            Ok(StreamEvent::Usage {
                usage: TokenUsage::default(),
            }),
            Ok(StreamEvent::Done {
                finish_reason: Some("stop".to_string()),
            }),
        ])))
    }
}

struct AlwaysLimited;

#[async_trait]
impl RateLimiter for AlwaysLimited {
    async fn check(&self, _user_id: &str) -> RateDecision {
        RateDecision::Limited {
            limit: 10,
            remaining: 0,
            reset_secs: 30,
        }
    }
}

fn test_config() -> Config {
    let toml = r#"
        [server]
        host = "127.0.0.1"
        port = 0

        [cors]
        enabled = false
        origins = []

        [mongodb]
        database = "cortex_test"

        [agent]
        model = "gpt-4o-mini"

        [logging]
        level = "debug"
        format = "pretty"
    "#;
    toml::from_str(toml).unwrap()
}

fn build_app(limiter: Arc<dyn RateLimiter>) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(ToolRegistry::new());
    let executor = TurnExecutor::new(
        Arc::new(CannedClient),
        store.clone(),
        registry,
        AgentConfig::default(),
    );
    let projector = Projector::new(store.clone());

    let state = Arc::new(AppState {
        config: Arc::new(test_config()),
        store: store.clone(),
        executor,
        projector,
        authenticator: Arc::new(HeaderAuthenticator),
        limiter,
    });

    (routes::router(state), store)
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_identity_is_terminal_401() {
    let (app, _) = build_app(Arc::new(Unlimited));

    let response = app
        .oneshot(request(Method::GET, "/threads", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn thread_crud_roundtrip() {
    let (app, _) = build_app(Arc::new(Unlimited));

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/threads",
            Some("alice"),
            Some(serde_json::json!({"title": "Experiments"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let thread_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["title"], "Experiments");

    // visible to its owner
    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/threads/{}", thread_id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // other users see not-found, never forbidden
    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/threads/{}", thread_id),
            Some("bob"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/threads/{}", thread_id),
            Some("alice"),
            Some(serde_json::json!({"title": "Renamed"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["title"], "Renamed");

    let response = app
        .clone()
        .oneshot(request(
            Method::DELETE,
            &format!("/threads/{}", thread_id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/threads/{}", thread_id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messages_endpoint_serves_client_format() {
    let (app, store) = build_app(Arc::new(Unlimited));

    let thread = store
        .create_thread(cortex_store::Thread::new("alice", None, None, None))
        .await
        .unwrap();
    store
        .append_message(NewMessage::new(
            &thread.id,
            EntityKind::User,
            MessageContent::text("hello"),
        ))
        .await
        .unwrap();
    store
        .append_message(NewMessage::new(
            &thread.id,
            EntityKind::AiMessage,
            MessageContent::text("hi there"),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            Method::GET,
            &format!(
                "/threads/{}/messages?vercel_format=true&page_size=10",
                thread.id
            ),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["has_more"], false);
    assert_eq!(body["page_size"], 10);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // newest first
    assert_eq!(results[0]["role"], "assistant");
    assert_eq!(results[1]["role"], "user");
}

#[tokio::test]
async fn rate_limited_turn_gets_429_with_headers() {
    let (app, store) = build_app(Arc::new(AlwaysLimited));

    let thread = store
        .create_thread(cortex_store::Thread::new("alice", None, None, None))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/threads/{}/turn", thread.id),
            Some("alice"),
            Some(serde_json::json!({"content": "hi"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get("x-ratelimit-limit").unwrap(),
        "10"
    );
    assert_eq!(
        response.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );
    assert_eq!(response.headers().get("x-ratelimit-reset").unwrap(), "30");
}

#[tokio::test]
async fn scoped_thread_requires_matching_group() {
    let (app, _) = build_app(Arc::new(Unlimited));

    // no groups at all: creation into a scoped project is forbidden
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/threads",
            Some("alice"),
            Some(serde_json::json!({"vlab_id": "lab-1", "project_id": "proj-9"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // a group carrying both ids as exact segments passes
    let req = Request::builder()
        .method(Method::POST)
        .uri("/threads")
        .header("x-user-id", "alice")
        .header("x-user-groups", "/vlab/lab-1/project/proj-9/admin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({"vlab_id": "lab-1", "project_id": "proj-9"}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}
