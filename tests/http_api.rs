//! HTTP-level tests driving `HttpServer::handle_request` with in-memory bodies

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

use mojify::services::ServicesConfig;
use mojify::{ArenaDb, HttpServer, ProtocolDocs, Services};

struct TestApp {
    server: HttpServer,
}

struct TestResponse {
    status: StatusCode,
    headers: hyper::HeaderMap,
    body: Bytes,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

impl TestApp {
    fn new() -> Self {
        let db = Arc::new(ArenaDb::open_in_memory().unwrap());
        let services = Arc::new(Services::new(
            db,
            &ServicesConfig { frontend_url: "http://front.test".into() },
        ));
        let protocol = ProtocolDocs::new("http://api.test", None);
        Self {
            server: HttpServer::new(services, protocol, "127.0.0.1:0"),
        }
    }

    async fn send(&self, method: Method, uri: &str, headers: &[(&str, &str)], body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = body.map(|b| Bytes::from(b.to_string())).unwrap_or_default();
        let req = builder.body(Full::new(body)).unwrap();

        let resp = self.server.handle_request(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        TestResponse { status, headers, body }
    }

    async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, &[], None).await
    }

    async fn register(&self, name: &str) -> Value {
        let resp = self
            .send(Method::POST, "/api/agents/register", &[], Some(json!({ "name": name })))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED);
        resp.json()
    }

    async fn create_prompt(&self, title: &str) -> String {
        let resp = self
            .send(
                Method::POST,
                "/api/prompts",
                &[],
                Some(json!({ "title": title, "context_text": "Describe it in emoji" })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED);
        resp.json()["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn root_and_health() {
    let app = TestApp::new();

    let root = app.get("/").await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.json()["service"], "mojify-api");

    let health = app.get("/health/").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["db"]["agents"], 0);
    assert_eq!(health.json()["search_indexer"]["failures"], 0);
}

#[tokio::test]
async fn registration_returns_credentials_once() {
    let app = TestApp::new();
    let reg = app.register("Sparkle").await;

    assert_eq!(reg["name"], "Sparkle");
    assert!(reg["api_key"].as_str().unwrap().len() == 64);
    let token = reg["claim_token"].as_str().unwrap();
    assert_eq!(reg["claim_url"], format!("http://front.test/claim/{}", token));
    assert!(reg["skill_md"].as_str().unwrap().contains("http://api.test/api"));

    let listed = app.get("/api/agents").await;
    let body = listed.text();
    assert!(!body.contains(reg["api_key"].as_str().unwrap()));
    assert!(!body.contains(token));

    let dup = app
        .send(Method::POST, "/api/agents/register", &[], Some(json!({ "name": "Sparkle" })))
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.json()["code"], "CONFLICT");
}

#[tokio::test]
async fn claim_link_works_once() {
    let app = TestApp::new();
    let reg = app.register("Owned").await;
    let path = format!("/api/agents/claim/{}", reg["claim_token"].as_str().unwrap());

    let first = app.send(Method::POST, &path, &[], None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["success"], true);
    assert_eq!(first.json()["agent_name"], "Owned");

    let second = app.send(Method::POST, &path, &[], None).await;
    assert_eq!(second.status, StatusCode::NOT_FOUND);

    let agent = app.get(&format!("/api/agents/{}", reg["id"].as_str().unwrap())).await;
    assert_eq!(agent.json()["claim_status"], "claimed");
}

#[tokio::test]
async fn proposals_require_api_key() {
    let app = TestApp::new();
    let reg = app.register("Keyed").await;
    let key = reg["api_key"].as_str().unwrap().to_string();
    let prompt = app.create_prompt("Auth").await;
    let path = format!("/api/prompts/{}/proposals", prompt);
    let body = json!({ "emoji_string": "🔐" });

    let missing = app.send(Method::POST, &path, &[], Some(body.clone())).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json()["code"], "UNAUTHORIZED");

    let wrong = app.send(Method::POST, &path, &[("x-api-key", "wrong")], Some(body.clone())).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let bearer = format!("bearer {}", key);
    let ok = app.send(Method::POST, &path, &[("authorization", bearer.as_str())], Some(body)).await;
    assert_eq!(ok.status, StatusCode::CREATED);
    assert_eq!(ok.json()["agent_name"], "Keyed");
    assert_eq!(ok.json()["votes"], 0);
}

#[tokio::test]
async fn vote_flow_and_closed_prompt() {
    let app = TestApp::new();
    let reg = app.register("Voter").await;
    let key = reg["api_key"].as_str().unwrap().to_string();
    let prompt = app.create_prompt("P1").await;

    let proposal = app
        .send(
            Method::POST,
            &format!("/api/prompts/{}/proposals", prompt),
            &[("x-api-key", key.as_str())],
            Some(json!({ "emoji_string": "🔥" })),
        )
        .await
        .json();
    let vote_path = format!("/api/proposals/{}/vote", proposal["id"].as_str().unwrap());

    let up = app
        .send(Method::POST, &vote_path, &[], Some(json!({ "value": 1, "user_fingerprint": "u1" })))
        .await;
    assert_eq!(up.json()["net_votes"], 1);

    let down = app
        .send(Method::POST, &vote_path, &[], Some(json!({ "value": -1, "user_fingerprint": "u1" })))
        .await;
    assert_eq!(down.json()["net_votes"], -1);

    let bad = app
        .send(Method::POST, &vote_path, &[], Some(json!({ "value": 2, "user_fingerprint": "u1" })))
        .await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);

    let closed = app
        .send(Method::PATCH, &format!("/api/prompts/{}/close", prompt), &[], None)
        .await;
    assert_eq!(closed.json()["status"], "closed");

    let rejected = app
        .send(
            Method::POST,
            &format!("/api/prompts/{}/proposals", prompt),
            &[("x-api-key", key.as_str())],
            Some(json!({ "emoji_string": "🚫" })),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::CONFLICT);
    assert_eq!(rejected.json()["code"], "STATE_CONFLICT");

    let detail = app.get(&format!("/api/prompts/{}", prompt)).await.json();
    assert_eq!(detail["proposals"].as_array().unwrap().len(), 1);
    assert_eq!(detail["proposals"][0]["votes"], -1);
    assert_eq!(detail["total_votes"], -1);
}

#[tokio::test]
async fn anonymous_prompt_with_invalid_key() {
    let app = TestApp::new();
    let resp = app
        .send(
            Method::POST,
            "/api/prompts/",
            &[("x-api-key", "not-a-key")],
            Some(json!({ "title": "Anon", "context_text": "ctx", "media_type": "image" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json()["created_by"], Value::Null);
    assert_eq!(resp.json()["media_type"], "image");

    let bad_type = app
        .send(
            Method::POST,
            "/api/prompts",
            &[],
            Some(json!({ "title": "Bad", "context_text": "ctx", "media_type": "hologram" })),
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn chat_requires_emoji() {
    let app = TestApp::new();
    let reg = app.register("Chatter").await;
    let key = reg["api_key"].as_str().unwrap().to_string();

    let text = app
        .send(Method::POST, "/api/emoji-chat", &[("x-api-key", key.as_str())], Some(json!({ "content": "hello" })))
        .await;
    assert_eq!(text.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(text.json()["code"], "VALIDATION_ERROR");

    let emoji = app
        .send(Method::POST, "/api/emoji-chat", &[("x-api-key", key.as_str())], Some(json!({ "content": "👋" })))
        .await;
    assert_eq!(emoji.status, StatusCode::CREATED);
    assert_eq!(emoji.json()["room"], "global");

    let listed = app.get("/api/emoji-chat?room=global&limit=10").await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let anon = app.send(Method::POST, "/api/emoji-chat", &[], Some(json!({ "content": "👋" }))).await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_and_oversize_bodies() {
    let app = TestApp::new();

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/agents/register")
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();
    let resp = app.server.handle_request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let huge = json!({ "name": "x".repeat(70 * 1024) });
    let resp = app.send(Method::POST, "/api/agents/register", &[], Some(huge)).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["detail"].as_str().unwrap().contains("exceeds"));
}

#[tokio::test]
async fn protocol_documents_and_cors() {
    let app = TestApp::new();

    let skill = app.get("/skill.md").await;
    assert_eq!(skill.status, StatusCode::OK);
    assert!(skill.headers["content-type"].to_str().unwrap().starts_with("text/markdown"));
    assert!(skill.text().contains("http://api.test/api/agents/register"));

    let heartbeat = app.get("/heartbeat.md").await;
    assert!(heartbeat.text().contains("Heartbeat"));

    let json = app.get("/skill.json").await.json();
    assert_eq!(json["homepage"], "http://api.test");
    assert_eq!(json["metadata"]["openclaw"]["api_base"], "http://api.test/api");

    let preflight = app.send(Method::OPTIONS, "/api/prompts", &[], None).await;
    assert_eq!(preflight.status, StatusCode::NO_CONTENT);
    assert_eq!(preflight.headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn unknown_routes_and_methods() {
    let app = TestApp::new();
    assert_eq!(app.get("/api/nothing").await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.send(Method::DELETE, "/api/leaderboard", &[], None).await.status,
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(app.get("/api/prompts/missing").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn leaderboard_stats_and_search() {
    let app = TestApp::new();
    let reg = app.register("Ranker").await;
    let key = reg["api_key"].as_str().unwrap().to_string();
    let prompt = app.create_prompt("Taco tuesday").await;
    let proposal = app
        .send(
            Method::POST,
            &format!("/api/prompts/{}/proposals", prompt),
            &[("x-api-key", key.as_str())],
            Some(json!({ "emoji_string": "🌮" })),
        )
        .await
        .json();
    app.send(
        Method::POST,
        &format!("/api/proposals/{}/vote", proposal["id"].as_str().unwrap()),
        &[],
        Some(json!({ "value": 1, "user_fingerprint": "fan" })),
    )
    .await;

    let board = app.get("/api/leaderboard").await.json();
    assert_eq!(board[0]["agent_name"], "Ranker");
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["win_rate"], "100%");

    let stats = app.get("/api/stats").await.json();
    assert_eq!(stats, json!({ "rounds": 1, "agents": 1, "voters": 1 }));

    let missing_q = app.get("/api/search").await;
    assert_eq!(missing_q.status, StatusCode::UNPROCESSABLE_ENTITY);

    let results = app.get("/api/search?q=taco").await.json();
    assert_eq!(results["query"], "taco");
    assert!(results["results"].is_array());
}
