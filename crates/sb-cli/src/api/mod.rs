//! REST boundary of the bridge server
//!
//! Everything the client asks of the REST API goes through [`BridgeApi`].
//! [`HttpApi`] is the `reqwest` implementation; tests substitute their own.

mod client;
mod types;

pub use client::HttpApi;
pub use types::{
    ChangePasswordRequest, CreateSessionRequest, CreateSessionResponse, LoginRequest,
    LoginResponse, UserProfile,
};

use async_trait::async_trait;
use thiserror::Error;

use sb_core::{AuthError, BridgeError, GroupDescriptor, NetworkError, ServerDescriptor};

/// Failure of a single REST call
#[derive(Error, Debug)]
pub enum ApiError {
    /// `401`; `mfa_required` is set when the server asks for a second factor
    #[error("Unauthorized: {message}")]
    Unauthorized { mfa_required: bool, message: String },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// `401` carrying an MFA challenge
    pub fn is_mfa_challenge(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized {
                mfa_required: true,
                ..
            }
        )
    }
}

impl From<ApiError> for BridgeError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized { message, .. } => AuthError::Unauthorized(message).into(),
            ApiError::Network(e) => e.into(),
        }
    }
}

/// Operations offered by the bridge REST API
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Exchange credentials for a bearer token
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ApiError>;

    /// Profile of the token's owner
    async fn current_user(&self) -> Result<UserProfile, ApiError>;

    async fn list_servers(&self) -> Result<Vec<ServerDescriptor>, ApiError>;

    async fn list_groups(&self) -> Result<Vec<GroupDescriptor>, ApiError>;

    /// Create the server-side bridge session record for a target host
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ApiError>;
}
