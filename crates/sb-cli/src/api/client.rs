//! `reqwest` implementation of the bridge REST API

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use sb_core::config::BridgeConfig;
use sb_core::types::{decode_groups, decode_servers};
use sb_core::{GroupDescriptor, NetworkError, ServerDescriptor, SessionContext};

use super::types::ErrorBody;
use super::{
    ApiError, BridgeApi, ChangePasswordRequest, CreateSessionRequest, CreateSessionResponse,
    LoginRequest, LoginResponse, UserProfile,
};

/// HTTP client for the bridge REST API
///
/// The bearer token is read from the [`SessionContext`] for every request,
/// so a token replaced by a re-login is used by the next call.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    context: SessionContext,
}

impl HttpApi {
    /// Create a client from the bridge configuration
    pub fn new(config: &BridgeConfig, context: SessionContext) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("sshbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            context,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    fn authorized(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.request(method, path);
        match self.context.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Error bodies are best effort; a non-JSON body still yields the status
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .text()
            .map(str::to_string)
            .unwrap_or_else(|| status_text(status));

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(mfa_required = body.mfa_required, "Request unauthorized");
            return Err(ApiError::Unauthorized {
                mfa_required: body.mfa_required,
                message,
            });
        }

        Err(NetworkError::Rejected {
            status: status.as_u16(),
            message,
        }
        .into())
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::Decode(e.to_string()).into())
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string())
}

fn transport_error(err: reqwest::Error) -> ApiError {
    let message = err.to_string();
    let network = if err.is_timeout() {
        NetworkError::Timeout(message)
    } else if err.is_connect() {
        NetworkError::Connect(message)
    } else if err.is_decode() {
        NetworkError::Decode(message)
    } else {
        NetworkError::Transport(message)
    };
    network.into()
}

#[async_trait]
impl BridgeApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let response = Self::send(
            self.request(Method::POST, "/api/auth/login")
                .json(request),
        )
        .await?;
        Self::json(response).await
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ApiError> {
        Self::send(
            self.authorized(Method::POST, "/api/auth/change-password")
                .json(request),
        )
        .await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let response = Self::send(self.authorized(Method::GET, "/api/auth/me")).await?;
        Self::json(response).await
    }

    async fn list_servers(&self) -> Result<Vec<ServerDescriptor>, ApiError> {
        let response = Self::send(self.authorized(Method::GET, "/api/servers")).await?;
        let body: Value = Self::json(response).await?;
        let servers = decode_servers(&body)?;
        tracing::debug!("Fetched {} servers", servers.len());
        Ok(servers)
    }

    async fn list_groups(&self) -> Result<Vec<GroupDescriptor>, ApiError> {
        let response = Self::send(self.authorized(Method::GET, "/api/servers/groups")).await?;
        let body: Value = Self::json(response).await?;
        Ok(decode_groups(&body))
    }

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ApiError> {
        let response = Self::send(
            self.authorized(Method::POST, "/api/ssh-session")
                .json(request),
        )
        .await?;
        Self::json(response).await
    }
}
