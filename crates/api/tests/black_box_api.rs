use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use roster_api::app::{build_app, AppServices};
use roster_auth::{Claims, TokenService};
use roster_infra::{seed, SeedAdmin, Stores};

const SECRET: &str = "black-box-test-secret-0123456789abcdef";
const PREFIX: &str = "/api/v1";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let stores = Stores::in_memory();
        let admin = SeedAdmin {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "admin-password".to_string(),
        };
        seed(&stores, Some(&admin)).await.expect("seed failed");

        let tokens = TokenService::new(SECRET.as_bytes(), ChronoDuration::minutes(30));
        let app = build_app(Arc::new(AppServices::new(stores, tokens, PREFIX)));

        // Same router as prod, bound to an ephemeral port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, PREFIX, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: &str, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        iat: issued_at.timestamp(),
        exp: (issued_at + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Every response is HTTP 200; return the envelope.
async fn envelope(res: reqwest::Response) -> Value {
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn login(client: &reqwest::Client, srv: &TestServer, username: &str, password: &str) -> Value {
    let res = client
        .post(srv.url("/auth/token"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    envelope(res).await
}

async fn admin_token(client: &reqwest::Client, srv: &TestServer) -> String {
    let body = login(client, srv, "admin", "admin-password").await;
    assert_eq!(body["code"], 200, "admin login failed: {body}");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

async fn create_user(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    username: &str,
    role: &str,
) -> Value {
    let res = client
        .post(srv.url("/users/create"))
        .bearer_auth(token)
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "secret-pw",
            "role": role,
        }))
        .send()
        .await
        .unwrap();
    let body = envelope(res).await;
    assert_eq!(body["code"], 201, "create user failed: {body}");
    body["data"].clone()
}

#[tokio::test]
async fn health_and_welcome() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(format!("{}/", srv.base_url)).send().await.unwrap();
    let body = envelope(res).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["docs"], PREFIX);
}

#[tokio::test]
async fn missing_token_is_rejected_in_the_envelope() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/attendance")).send().await.unwrap();
    let body = envelope(res).await;
    assert_eq!(body["code"], 401);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/nowhere")).send().await.unwrap();
    assert_eq!(envelope(res).await["code"], 404);
}

#[tokio::test]
async fn wrong_method_is_rendered_in_the_envelope() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/auth/token")).send().await.unwrap();
    let body = envelope(res).await;
    assert_eq!(body["code"], 405);
    assert!(body["data"].is_null());

    // Guarded routes behave the same before any token check.
    let res = client.patch(srv.url("/attendance")).send().await.unwrap();
    assert_eq!(envelope(res).await["code"], 405);
}

#[tokio::test]
async fn wrong_password_yields_no_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body = login(&client, &srv, "admin", "not-the-password").await;
    assert_eq!(body["code"], 401);
    assert!(body["data"]["access_token"].is_null());

    let body = login(&client, &srv, "nobody", "whatever").await;
    assert_eq!(body["code"], 401);
}

#[tokio::test]
async fn plain_user_can_view_but_not_manage_attendance() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &srv).await;

    for i in 0..5 {
        create_user(&client, &srv, &admin, &format!("filler{i}"), "user").await;
    }
    let target = create_user(&client, &srv, &admin, "worker", "user").await;
    assert_eq!(target["id"], 7);
    assert_eq!(target["role"], "user");

    let body = login(&client, &srv, "worker", "secret-pw").await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/attendance"))
        .bearer_auth(&token)
        .json(&json!({ "year": 2024, "month": 5, "real_day": 20.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 403);

    let res = client
        .get(srv.url("/attendance"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = envelope(res).await;
    assert_eq!(body["code"], 200);
    assert!(body["data"].is_array());

    let res = client
        .post(srv.url("/auth/currentUser"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = envelope(res).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["userid"], 7);
    assert_eq!(body["data"]["permissions"], json!(["attendance:view"]));
}

#[tokio::test]
async fn users_may_read_themselves_but_not_others() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &srv).await;

    let alice = create_user(&client, &srv, &admin, "alice", "user").await;
    let bob = create_user(&client, &srv, &admin, "bob", "user").await;

    let body = login(&client, &srv, "alice", "secret-pw").await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/users/get"))
        .bearer_auth(&token)
        .json(&json!({ "user_id": alice["id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["data"]["username"], "alice");

    let res = client
        .post(srv.url("/users/get"))
        .bearer_auth(&token)
        .json(&json!({ "user_id": bob["id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 403);

    // Profile fields are bounded by their columns.
    let res = client
        .post(srv.url("/users/update"))
        .bearer_auth(&token)
        .json(&json!({ "user_id": alice["id"], "phone": "5".repeat(5000) }))
        .send()
        .await
        .unwrap();
    let body = envelope(res).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["data"]["errors"][0]["field"], "phone");

    // Self-service may not escalate.
    let res = client
        .post(srv.url("/users/update"))
        .bearer_auth(&token)
        .json(&json!({ "user_id": alice["id"], "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 403);
}

#[tokio::test]
async fn role_resolves_to_exactly_its_attached_permissions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &srv).await;

    let mut codes = Vec::new();
    for code in ["report:view", "report:export"] {
        let res = client
            .post(srv.url("/security/permissions"))
            .bearer_auth(&admin)
            .json(&json!({ "code": code, "name": code }))
            .send()
            .await
            .unwrap();
        let body = envelope(res).await;
        assert_eq!(body["code"], 201, "create permission failed: {body}");
        codes.push(body["data"]["id"].as_i64().unwrap());
    }

    let res = client
        .post(srv.url("/security/roles"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "auditor" }))
        .send()
        .await
        .unwrap();
    let role_id = envelope(res).await["data"]["id"].as_i64().unwrap();

    // Attach in reverse creation order.
    for permission_id in codes.iter().rev() {
        let res = client
            .post(srv.url(&format!("/security/roles/{role_id}/permissions/{permission_id}")))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        let body = envelope(res).await;
        assert_eq!(body["code"], 200);
        assert_eq!(body["msg"], "permission attached");
    }

    // A second attach of the same pair conflicts.
    let res = client
        .post(srv.url(&format!("/security/roles/{role_id}/permissions/{}", codes[0])))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 409);

    let res = client
        .get(srv.url(&format!("/security/roles/{role_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body = envelope(res).await;
    let mut attached: Vec<String> = body["data"]["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["code"].as_str().unwrap().to_string())
        .collect();
    attached.sort();
    assert_eq!(attached, vec!["report:export", "report:view"]);
}

#[tokio::test]
async fn attendance_lifecycle_and_recent_window() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &srv).await;

    for month in 1..=3 {
        let res = client
            .post(srv.url("/attendance"))
            .bearer_auth(&admin)
            .json(&json!({ "year": 2024, "month": month, "full_attendance_day": 21.04, "real_day": 20 }))
            .send()
            .await
            .unwrap();
        let body = envelope(res).await;
        assert_eq!(body["code"], 201, "create attendance failed: {body}");
        assert_eq!(body["data"]["full_attendance_day"], 21.0);
    }

    let res = client
        .get(srv.url("/attendance/recent/2024/2"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body = envelope(res).await;
    assert_eq!(body["data"]["total"], 2);
    let months: Vec<i64> = body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["month"].as_i64().unwrap())
        .collect();
    assert_eq!(months, vec![2, 1]);

    // `current` skips records inside the window.
    let res = client
        .get(srv.url("/attendance/recent/2024/3?current=1&pageSize=1"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body = envelope(res).await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["data"][0]["month"], 2);

    let res = client
        .get(srv.url("/attendance/month/2024/13"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 400);

    let res = client
        .delete(srv.url("/attendance/1"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 200);

    let res = client
        .get(srv.url("/attendance/1"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 404);
}

#[tokio::test]
async fn tokens_for_unknown_users_or_expired_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let ghost = mint_jwt("999", Utc::now(), ChronoDuration::minutes(10));
    let res = client
        .post(srv.url("/auth/currentUser"))
        .bearer_auth(ghost)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 401);

    let expired = mint_jwt("1", Utc::now() - ChronoDuration::hours(2), ChronoDuration::minutes(5));
    let res = client
        .post(srv.url("/auth/currentUser"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 401);

    let valid = mint_jwt("1", Utc::now(), ChronoDuration::minutes(10));
    let res = client
        .post(srv.url("/auth/currentUser"))
        .bearer_auth(valid)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 200);
}

#[tokio::test]
async fn deactivated_user_is_locked_out() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &srv).await;

    let carol = create_user(&client, &srv, &admin, "carol", "user").await;
    let body = login(&client, &srv, "carol", "secret-pw").await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/users/update"))
        .bearer_auth(&admin)
        .json(&json!({ "user_id": carol["id"], "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["data"]["is_active"], false);

    let res = client
        .get(srv.url("/attendance"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(res).await["code"], 403);

    assert_eq!(login(&client, &srv, "carol", "secret-pw").await["code"], 403);
}
