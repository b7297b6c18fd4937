//! Integration test helpers for StockMirror.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and the API
//! smctl migrate
//! cargo run -p stockmirror-api
//!
//! # Run the server-backed tests
//! STOCKMIRROR_TEST_ADMIN_PASSWORD=... cargo test -p stockmirror-integration-tests -- --ignored
//! ```
//!
//! Server-backed tests are `#[ignore]`d; they expect an admin account whose
//! username is `STOCKMIRROR_TEST_ADMIN` (default `admin`).

use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("STOCKMIRROR_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Errors from the test client.
#[derive(Debug)]
pub enum TestError {
    Http(reqwest::Error),
    Status(reqwest::StatusCode, String),
    MissingEnv(&'static str),
}

impl From<reqwest::Error> for TestError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

#[derive(Deserialize)]
struct LoginBody {
    token: String,
}

/// HTTP client carrying a bearer token.
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl ApiClient {
    /// Log in with `identifier` and `password`.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Status` if the API refuses the login.
    pub async fn login(identifier: &str, password: &str) -> Result<Self, TestError> {
        let http = Client::new();
        let base_url = api_base_url();
        let resp = http
            .post(format!("{base_url}/api/auth/login"))
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(TestError::Status(status, resp.text().await.unwrap_or_default()));
        }
        let body: LoginBody = resp.json().await?;
        Ok(Self {
            http,
            base_url,
            token: SecretString::from(body.token),
        })
    }

    /// Log in as the test admin from the environment.
    ///
    /// # Errors
    ///
    /// Returns `TestError::MissingEnv` without `STOCKMIRROR_TEST_ADMIN_PASSWORD`.
    pub async fn admin() -> Result<Self, TestError> {
        let username =
            std::env::var("STOCKMIRROR_TEST_ADMIN").unwrap_or_else(|_| "admin".to_string());
        let password = std::env::var("STOCKMIRROR_TEST_ADMIN_PASSWORD")
            .map_err(|_| TestError::MissingEnv("STOCKMIRROR_TEST_ADMIN_PASSWORD"))?;
        Self::login(&username, &password).await
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.token.expose_secret())
    }

    /// `GET {base}{path}`.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Http` on transport failure.
    pub async fn get(&self, path: &str) -> Result<Response, TestError> {
        let url = format!("{}{path}", self.base_url);
        Ok(self.authed(self.http.get(url)).send().await?)
    }

    /// `POST {base}{path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Http` on transport failure.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Response, TestError> {
        let url = format!("{}{path}", self.base_url);
        Ok(self.authed(self.http.post(url)).json(body).send().await?)
    }

    /// `DELETE {base}{path}`.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Http` on transport failure.
    pub async fn delete(&self, path: &str) -> Result<Response, TestError> {
        let url = format!("{}{path}", self.base_url);
        Ok(self.authed(self.http.delete(url)).send().await?)
    }
}

/// A SKU nobody else will use.
#[must_use]
pub fn unique_sku(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id.get(..8).unwrap_or(&id))
}

/// A username nobody else will use.
#[must_use]
pub fn unique_username(prefix: &str) -> String {
    unique_sku(prefix).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_sku_shape() {
        let a = unique_sku("IT");
        let b = unique_sku("IT");
        assert!(a.starts_with("IT-"));
        assert_eq!(a.len(), 11);
        assert_ne!(a, b);
    }
}
