// tests/common/mod.rs

use std::sync::Arc;

use quizzes::{
    config::Config, mail::MemoryMailer, routes, state::AppState, utils::hash::hash_password,
};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use sqlx::{PgPool, postgres::PgPoolOptions};

pub const PASSWORD: &str = "password123";

#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: reqwest::Client,
    pub mailer: Arc<MemoryMailer>,
}

/// Spawns the app on a random port against a freshly created database.
/// Returns `None` (and the test should return early) when `DATABASE_URL`
/// is not set.
pub async fn spawn_app() -> Option<TestApp> {
    dotenvy::dotenv().ok();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping database test");
        return None;
    };

    let pool = configure_database(&database_url).await;

    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        admin_email: None,
        admin_password: None,
    };

    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState {
        pool: pool.clone(),
        config,
        mailer: mailer.clone(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
        mailer,
    })
}

/// Creates a database named `test_<uuid>` and runs the migrations on it.
async fn configure_database(database_url: &str) -> PgPool {
    let options = database_url
        .parse::<sqlx::postgres::PgConnectOptions>()
        .expect("Failed to parse DATABASE_URL");

    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone().database("postgres"))
        .await
        .expect("Failed to connect to Postgres");

    let database_name = format!("test_{}", uuid::Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE DATABASE \"{}\"", database_name))
        .execute(&admin)
        .await
        .expect("Failed to create database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options.database(&database_name))
        .await
        .expect("Failed to connect to new database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    pool
}

#[allow(dead_code)]
impl TestApp {
    /// Sends a JSON request and returns the status with the parsed body
    /// (`Value::Null` for empty bodies).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.address, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.expect("Failed to execute request");
        let status = response.status();
        let text = response.text().await.expect("Failed to read body");
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, Some(token), None).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().expect("Token not found").to_string()
    }

    /// Registers a quiz owner and returns a token for it.
    pub async fn register_owner(&self, email: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        self.login(email, PASSWORD).await
    }

    /// Inserts a superuser directly and returns a token for it.
    pub async fn create_superuser(&self, email: &str) -> String {
        let hashed = hash_password(PASSWORD).unwrap();
        sqlx::query("INSERT INTO users (email, password, is_superuser) VALUES ($1, $2, TRUE)")
            .bind(email)
            .bind(hashed)
            .execute(&self.pool)
            .await
            .unwrap();
        self.login(email, PASSWORD).await
    }

    pub async fn me(&self, token: &str) -> Value {
        let (status, body) = self.get("/api/auth/me", token).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    /// Invite code mailed to `email` most recently.
    pub fn invite_code_for(&self, email: &str) -> String {
        let message = self
            .mailer
            .sent()
            .into_iter()
            .rev()
            .find(|m| m.to.iter().any(|to| to == email))
            .expect("No invite mailed to this address");
        message
            .body
            .split_whitespace()
            .last()
            .expect("Empty invite body")
            .trim_end_matches('.')
            .to_string()
    }

    /// Accepts the invite mailed to `email`, sets the password and logs in.
    pub async fn accept_and_login(&self, email: &str) -> String {
        let code = self.invite_code_for(email);
        let (status, body) = self
            .request(
                Method::POST,
                &format!("/api/invites/{}/accept", code),
                None,
                Some(serde_json::json!({ "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "accept failed: {}", body);
        self.login(email, PASSWORD).await
    }
}
