//! Typed wrapper over the tutor backend's REST endpoints.

use crate::config::ClientConfig;
use async_trait::async_trait;
use ndtutor_core::{
    ApplyError, ApplyRuleParams, CreateExerciseRequest, CreateTreeRequest, DerivationRule,
    Exercise, ExerciseId, Feedback, Formula, ParseParams, RuleApplier, Statement, Tipp,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("backend is rate limiting requests")]
    RateLimited,
    /// Non-success status; `message` is the response body as sent by the
    /// backend, suitable for showing to the user.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
}

pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL of an endpoint below the configured base.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.config
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ClientError::InvalidEndpoint(path.to_string()))
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    pub async fn parse(&self, formula: &str) -> Result<Formula, ClientError> {
        let body = ParseParams {
            formula: formula.to_string(),
        };
        self.post_json("api/parse", &body).await
    }

    /// Whether the backend considers `statement` still provable.
    pub async fn check(&self, statement: &Statement) -> Result<bool, ClientError> {
        self.post_json("api/check", statement).await
    }

    pub async fn apply(&self, params: &ApplyRuleParams) -> Result<Vec<Statement>, ClientError> {
        self.post_json("api/apply", params).await
    }

    pub async fn rules(&self) -> Result<Vec<DerivationRule>, ClientError> {
        self.get_json("api/rules").await
    }

    pub async fn exercises(&self) -> Result<Vec<Exercise>, ClientError> {
        self.get_json("api/exercise").await
    }

    pub async fn exercise(&self, id: ExerciseId) -> Result<Statement, ClientError> {
        self.get_json(&format!("api/exercise/{id}")).await
    }

    pub async fn create_exercise(&self, request: &CreateExerciseRequest) -> Result<bool, ClientError> {
        self.post_json("api/exercise", request).await
    }

    pub async fn feedback(&self, id: ExerciseId, feedback: &Feedback) -> Result<(), ClientError> {
        let path = format!("api/exercise/{id}/feedback");
        self.send(self.request(Method::POST, &path)?.json(feedback), &path)
            .await
            .map(drop)
    }

    /// Completion telemetry.
    pub async fn add_tree(&self, request: &CreateTreeRequest) -> Result<(), ClientError> {
        let path = "api/add_tree";
        self.send(self.request(Method::POST, path)?.json(request), path)
            .await
            .map(drop)
    }

    pub async fn hint(&self, statement: &Statement) -> Result<Vec<Tipp>, ClientError> {
        self.post_json("api/statement/hint", statement).await
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.client.request(method, self.endpoint(path)?))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send(self.request(Method::GET, path)?, path).await?;
        decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::POST, path)?.json(body), path)
            .await?;
        decode(response).await
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let status = response.status();
        tracing::info!(endpoint = path, status = %status, "backend call");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ClientError::Network(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl RuleApplier for ApiClient {
    async fn apply_rule(&self, params: &ApplyRuleParams) -> Result<Vec<Statement>, ApplyError> {
        self.apply(params).await.map_err(|err| match err {
            ClientError::Api { message, .. } => ApplyError::Rejected(message),
            other => ApplyError::Transport(other.to_string()),
        })
    }
}
