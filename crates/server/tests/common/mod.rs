//! Shared helpers for driving the router in-process against an in-memory database.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use taskboard_server::{
    build_router,
    config::{Config, DemoAccount},
    db::Database,
    AppState,
};
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_demo(None).await
    }

    pub async fn with_demo(demo: Option<DemoAccount>) -> Self {
        let db = Database::in_memory().await.unwrap();
        let config = Config {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            session_secret: "integration-test-secret".to_string(),
            demo_account: demo,
        };
        let state = AppState::initialize(config, db.clone()).await.unwrap();
        Self {
            app: build_router(state),
            db,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Registers a fresh account and returns `(user id, session token)`.
    pub async fn signed_in_user(&self, email: &str) -> (String, String) {
        let registered = self.register(email, "demo123").await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);

        let login = self.login(email, "demo123").await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);

        (
            registered.body["user"]["id"].as_str().unwrap().to_string(),
            login.body["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_project(&self, token: &str, name: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/api/projects",
            Some(token),
            Some(serde_json::json!({ "name": name })),
        )
        .await
    }
}
