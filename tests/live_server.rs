//! Live end-to-end test for the auth and CSRF flow.
//!
//! This test drives a real server over HTTP against a real Postgres
//! instance. It only runs when `TRADELOG_TEST_DSN` points at a database the
//! test may wipe; without it the test is skipped so `cargo test` stays green
//! on machines without infrastructure.

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::time::Duration;
use tokio::time::sleep;
use tradelog::api::{self, AuthConfig};

const CSRF_HEADER: &str = "x-csrf-token";

/// One browser-like session: cookie jar plus the latest rotated CSRF token.
struct Session {
    client: reqwest::Client,
    base: String,
    bearer: Option<String>,
    csrf: Option<String>,
}

impl Session {
    fn new(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("failed to build client")?;
        Ok(Self {
            client,
            base: base.to_string(),
            bearer: None,
            csrf: None,
        })
    }

    /// Send a JSON request, attaching bearer and CSRF header when present,
    /// and capture the rotated CSRF token from the response.
    async fn send(
        &mut self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let mut request = self.client.request(method, format!("{}{path}", self.base));
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer);
        }
        if let Some(csrf) = &self.csrf {
            request = request.header(CSRF_HEADER, csrf);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.context("request failed")?;
        if let Some(token) = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            self.csrf = Some(token.to_string());
        }
        Ok(response)
    }
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to bind probe socket")?;
    Ok(listener.local_addr()?.port())
}

async fn wait_for_health(base: &str) -> Result<()> {
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(response) = client.get(format!("{base}/health")).send().await {
            if response.status() == StatusCode::OK {
                return Ok(());
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    bail!("server did not become healthy");
}

#[tokio::test]
async fn first_user_admin_and_csrf_flow() -> Result<()> {
    let Ok(dsn) = std::env::var("TRADELOG_TEST_DSN") else {
        eprintln!("Skipping live server test: TRADELOG_TEST_DSN is not set");
        return Ok(());
    };

    // Start from a clean slate; the server recreates the schema on boot.
    {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&dsn)
            .await
            .context("failed to connect for cleanup")?;
        sqlx::raw_sql("DROP TABLE IF EXISTS trades, portfolios, users CASCADE")
            .execute(&pool)
            .await
            .context("failed to drop tables")?;
    }

    let port = free_port()?;
    let config = AuthConfig::new(
        SecretString::from("integration-test-secret".to_string()),
        "http://localhost:3000".to_string(),
    )
    .with_csrf_cookie_secure(false);
    tokio::spawn(api::new(port, dsn, config));

    let base = format!("http://127.0.0.1:{port}");
    wait_for_health(&base).await?;

    // Register the first account: it becomes the administrator, and the
    // exempt registration POST still seeds a CSRF pair.
    let mut alice = Session::new(&base)?;
    let response = alice
        .send(
            reqwest::Method::POST,
            "/api/auth/register",
            Some(json!({
                "email": "alice@example.com",
                "username": "alice",
                "password": "correct horse battery staple",
            })),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await?;
    assert_eq!(body["is_admin"], Value::Bool(true));
    assert!(alice.csrf.is_some(), "registration must seed a CSRF token");

    // Login and call an admin-only endpoint.
    let response = alice
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            Some(json!({
                "username": "alice",
                "password": "correct horse battery staple",
            })),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    alice.bearer = Some(
        body["access_token"]
            .as_str()
            .context("missing access token")?
            .to_string(),
    );

    let response = alice
        .send(reqwest::Method::GET, "/api/users", None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // A second account is not an administrator.
    let mut bob = Session::new(&base)?;
    let response = bob
        .send(
            reqwest::Method::POST,
            "/api/auth/register",
            Some(json!({
                "email": "bob@example.com",
                "username": "bob",
                "password": "a different passphrase",
            })),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await?;
    assert_eq!(body["is_admin"], Value::Bool(false));

    let response = bob
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            Some(json!({
                "username": "bob@example.com",
                "password": "a different passphrase",
            })),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    bob.bearer = Some(
        body["access_token"]
            .as_str()
            .context("missing access token")?
            .to_string(),
    );

    let response = bob.send(reqwest::Method::GET, "/api/users", None).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await?;
    assert_eq!(body["detail"], json!("Not enough permissions"));

    // A protected mutation with a matching double-submit pair succeeds, and
    // the response rotates the token.
    let submitted = bob.csrf.clone().context("bob has a CSRF token")?;
    let response = bob
        .send(
            reqwest::Method::POST,
            "/api/portfolios",
            Some(json!({ "name": "Swing", "initial_balance": 1000.0 })),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_ne!(bob.csrf.as_deref(), Some(submitted.as_str()));

    // A header token copied from another session's pair mismatches the
    // cookie and is refused.
    let alice_token = alice.csrf.clone().context("alice has a CSRF token")?;
    bob.csrf = Some(alice_token);
    let response = bob
        .send(
            reqwest::Method::POST,
            "/api/portfolios",
            Some(json!({ "name": "Hijack attempt" })),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await?;
    assert_eq!(body["detail"], json!("CSRF token mismatch"));

    // No cookie and no header at all: missing, not mismatch.
    let bare = reqwest::Client::new();
    let response = bare
        .post(format!("{base}/api/portfolios"))
        .bearer_auth(bob.bearer.clone().context("bob is logged in")?)
        .json(&json!({ "name": "No tokens" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await?;
    assert_eq!(body["detail"], json!("CSRF token missing"));

    // Bearer-less requests to a protected read are unauthenticated.
    let response = bare.get(format!("{base}/api/auth/me")).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}
