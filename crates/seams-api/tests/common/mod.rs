#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use futures_util::future::{BoxFuture, FutureExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use seams_api::mailer::Mailer;
use seams_api::photos::ImageStore;
use seams_api::{AppState, AppStateInner};
use seams_db::Database;

pub const SECRET: &str = "integration-test-secret";

/// Keeps every reset code instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl Mailer for RecordingMailer {
    fn send_reset_code(&self, to: &str, _name: &str, code: &str) -> BoxFuture<'static, anyhow::Result<()>> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        futures_util::future::ready(Ok(())).boxed()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mail: Arc<RecordingMailer>,
    pub images: TempDir,
}

pub struct User {
    pub token: String,
    pub id: i64,
}

impl TestApp {
    pub fn new() -> Self {
        let images = tempfile::tempdir().unwrap();
        let store = ImageStore::new(images.path(), "http://localhost:3000");
        store.ensure_default().unwrap();

        let mail = Arc::new(RecordingMailer::default());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.to_string(),
            images: store,
            mailer: mail.clone(),
            http: reqwest::Client::new(),
        });

        Self {
            router: seams_api::router(state.clone()),
            state,
            mail,
            images,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), Some(body)).await
    }

    pub async fn register(&self, email: &str, name_first: &str, name_last: &str) -> User {
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/register/v2",
                None,
                Some(json!({
                    "email": email,
                    "password": "password",
                    "name_first": name_first,
                    "name_last": name_last,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        User {
            token: body["token"].as_str().unwrap().to_string(),
            id: body["auth_user_id"].as_i64().unwrap(),
        }
    }

    pub async fn create_channel(&self, user: &User, name: &str, is_public: bool) -> i64 {
        let (status, body) = self
            .post(
                "/channels/create/v2",
                &user.token,
                json!({ "name": name, "is_public": is_public }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "channel create failed: {body}");
        body["channel_id"].as_i64().unwrap()
    }

    pub async fn send(&self, user: &User, channel_id: i64, message: &str) -> i64 {
        let (status, body) = self
            .post(
                "/message/send/v1",
                &user.token,
                json!({ "channel_id": channel_id, "message": message }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "send failed: {body}");
        body["message_id"].as_i64().unwrap()
    }

    /// Run the scheduler as if the clock read `now`.
    pub fn flush_at(&self, now: i64) -> usize {
        self.state
            .db
            .transaction(|conn| seams_api::scheduler::flush_due(conn, now))
            .unwrap()
    }
}
