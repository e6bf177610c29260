//! Shared harness: one server and one fresh database per test

#![allow(dead_code)]

use pcash::configuration::{get_configuration, DatabaseSettings};
use pcash::startup::run;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;

pub const PASSWORD: &str = "Passw0rd!";

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub client: reqwest::Client,
}

/// A registered store owner with a live session
pub struct Session {
    pub user_id: i64,
    pub store_id: i64,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    // Lowest bcrypt cost, to keep the suite fast
    configuration.security.bcrypt_cost = 4;
    let db_pool = configure_database(&configuration.database).await;

    let server = run(listener, db_pool.clone(), &configuration).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool,
        client: reqwest::Client::new(),
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn patch_auth(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Register a new store owner and return their session
    pub async fn register(&self, name: &str, email: &str) -> Session {
        let response = self
            .post(
                "/auth/register",
                &json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "passwordConfirm": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "registration failed");
        session_from(response.json().await.expect("Failed to parse response"))
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Response {
        self.post(
            "/auth/login",
            &json!({ "identifier": identifier, "password": password }),
        )
        .await
    }

    /// Create a user in the admin's store and log them in
    pub async fn create_member(&self, admin: &Session, email: &str, role: &str) -> Session {
        let response = self
            .post_auth(
                "/users",
                &admin.access_token,
                &json!({
                    "name": "Store Member",
                    "email": email,
                    "password": PASSWORD,
                    "role": role,
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "user creation failed");

        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK, "member login failed");
        session_from(response.json().await.expect("Failed to parse response"))
    }

    pub async fn refresh_token_count(&self, user_id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await
            .expect("Failed to count refresh tokens")
    }
}

pub fn session_from(body: Value) -> Session {
    Session {
        user_id: body["user"]["id"].as_i64().expect("user id"),
        store_id: body["user"]["storeId"].as_i64().expect("store id"),
        access_token: body["token"]["accessToken"]
            .as_str()
            .expect("access token")
            .to_string(),
        refresh_token: body["token"]["refreshToken"]
            .as_str()
            .expect("refresh token")
            .to_string(),
    }
}
