#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rolodex_api::auth::{AppState, AppStateInner, create_token};
use rolodex_cache::{DEFAULT_USER_TTL, MemoryUserCache, UserDirectory, UserStore};
use rolodex_db::Database;
use rolodex_types::api::TokenScope;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub cache: Arc<MemoryUserCache>,
}

/// Fresh in-memory database and cache per test.
pub fn app() -> TestApp {
    app_with_store(|db| db)
}

/// Like `app`, with the user directory reading through a wrapped store.
pub fn app_with_store(store: impl FnOnce(Arc<Database>) -> Arc<dyn UserStore>) -> TestApp {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    let cache = Arc::new(MemoryUserCache::new());
    let users = UserDirectory::new(store(db.clone()), cache.clone(), DEFAULT_USER_TTL);
    let state: AppState = Arc::new(AppStateInner {
        db,
        users,
        jwt_secret: SECRET.to_string(),
    });
    TestApp {
        router: rolodex_api::router(state.clone()),
        state,
        cache,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn signup(&self, email: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/users",
                None,
                Some(json!({ "email": email, "username": "tester", "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    pub async fn confirm(&self, email: &str) {
        let token = create_token(SECRET, email, TokenScope::EmailToken).unwrap();
        let (status, _) = self
            .send(Method::GET, &format!("/auth/confirmed_email/{}", token), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    pub async fn login(&self, email: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/auth/access_token",
            None,
            Some(json!({ "email": email, "password": "correct horse" })),
        )
        .await
    }

    /// Sign up, confirm and log in; returns the access token.
    pub async fn user(&self, email: &str) -> String {
        self.signup(email).await;
        self.confirm(email).await;
        let (status, body) = self.login(email).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn channel(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .send(Method::POST, "/channels", Some(token), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }
}
