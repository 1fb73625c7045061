pub mod refresh;

use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::warn;

use tasklist_types::api::{
    AuthRequest, CreateTodoRequest, MessageResponse, ProfileResponse, TodoListResponse,
    TodoResponse, UpdateTodoRequest,
};

use crate::refresh::RefreshGate;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("session expired")]
    SessionExpired,
    #[error("api error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Cookie-carrying API client. Every authenticated call runs through the
/// refresh gate: a 401 triggers at most one coalesced `/auth/refresh`, then
/// the original request is retried exactly once. No other retry policy.
pub struct ApiClient {
    http: Client,
    base_url: String,
    gate: RefreshGate,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            gate: RefreshGate::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -- Auth --

    pub async fn register(&self, email: &str, password: &str) -> Result<MessageResponse, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(&AuthRequest {
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await?;
        Ok(Self::expect_ok(resp).await?.json().await?)
    }

    /// On success the server's Set-Cookie headers land in the cookie store;
    /// subsequent calls carry both tokens automatically.
    pub async fn login(&self, email: &str, password: &str) -> Result<MessageResponse, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&AuthRequest {
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await?;
        Ok(Self::expect_ok(resp).await?.json().await?)
    }

    // -- Protected endpoints --

    pub async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        let url = self.url("/api/profile");
        let resp = self.send_authed(|http| http.get(&url)).await?;
        Ok(resp.json().await?)
    }

    pub async fn todos(&self) -> Result<TodoListResponse, ClientError> {
        let url = self.url("/api/todos");
        let resp = self.send_authed(|http| http.get(&url)).await?;
        Ok(resp.json().await?)
    }

    pub async fn create_todo(&self, task: &str) -> Result<TodoResponse, ClientError> {
        let url = self.url("/api/todos");
        let body = CreateTodoRequest { task: task.into() };
        let resp = self.send_authed(|http| http.post(&url).json(&body)).await?;
        Ok(resp.json().await?)
    }

    pub async fn update_todo(
        &self,
        id: &str,
        changes: &UpdateTodoRequest,
    ) -> Result<TodoResponse, ClientError> {
        let url = self.url(&format!("/api/todos/{}", id));
        let resp = self.send_authed(|http| http.patch(&url).json(changes)).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_todo(&self, id: &str) -> Result<MessageResponse, ClientError> {
        let url = self.url(&format!("/api/todos/{}", id));
        let resp = self.send_authed(|http| http.delete(&url)).await?;
        Ok(resp.json().await?)
    }

    // -- Plumbing --

    /// Send a request; on 401, join the coalesced refresh and replay the
    /// original request once. A failed refresh rejects every queued caller
    /// and nobody retries further.
    async fn send_authed<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn(&Client) -> reqwest::RequestBuilder,
    {
        let resp = build(&self.http).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Self::expect_ok(resp).await;
        }

        let refreshed = self.gate.coalesce(|| self.refresh_once()).await;
        if !refreshed {
            return Err(ClientError::SessionExpired);
        }

        Self::expect_ok(build(&self.http).send().await?).await
    }

    async fn refresh_once(&self) -> bool {
        match self.http.post(self.url("/auth/refresh")).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("token refresh rejected: {}", resp.status());
                false
            }
            Err(e) => {
                warn!("token refresh failed: {}", e);
                false
            }
        }
    }

    async fn expect_ok(resp: Response) -> Result<Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .json::<MessageResponse>()
            .await
            .map(|m| m.message)
            .unwrap_or_default();
        Err(ClientError::Api { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.url("/api/todos"), "http://localhost:3000/api/todos");
    }
}
