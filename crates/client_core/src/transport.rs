use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    error::ApiError,
    protocol::{
        AnswerRequest, AnswerResult, GameRequest, JoinRequest, JoinResponse, LeaderboardSnapshot,
        QuestionCard,
    },
};

use crate::GameRpc;

/// [`GameRpc`] over unary JSON POSTs, one route per operation.
pub struct HttpGameRpc {
    http: Client,
    server_url: String,
}

impl HttpGameRpc {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{path}", self.server_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("failed to reach game service at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiError>(&body) {
                Ok(envelope) => anyhow!("game service rejected {path}: {envelope}"),
                Err(_) => anyhow!("game service returned {status} for {path}"),
            });
        }

        response
            .json()
            .await
            .with_context(|| format!("invalid response payload from {url}"))
    }
}

#[async_trait]
impl GameRpc for HttpGameRpc {
    async fn join_game(&self, request: JoinRequest) -> Result<JoinResponse> {
        self.call("/game/join", &request).await
    }

    async fn next_question(&self, request: GameRequest) -> Result<QuestionCard> {
        self.call("/game/next_question", &request).await
    }

    async fn submit_answer(&self, request: AnswerRequest) -> Result<AnswerResult> {
        self.call("/game/submit_answer", &request).await
    }

    async fn leaderboard(&self, request: GameRequest) -> Result<LeaderboardSnapshot> {
        self.call("/game/leaderboard", &request).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
