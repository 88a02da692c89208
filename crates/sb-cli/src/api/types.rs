//! REST request and response bodies

use serde::{Deserialize, Serialize};

use sb_core::ServerDescriptor;

/// `POST /api/auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_token: Option<String>,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            mfa_token: None,
        }
    }

    /// Same credentials plus a second-factor code
    pub fn with_mfa(&self, code: impl Into<String>) -> Self {
        Self {
            mfa_token: Some(code.into()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// `POST /api/auth/change-password`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// `GET /api/auth/me`, shown to the user and otherwise unused
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// `POST /api/ssh-session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub server_id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    /// Login name on the target host
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
}

impl From<&ServerDescriptor> for CreateSessionRequest {
    fn from(server: &ServerDescriptor) -> Self {
        Self {
            server_id: server.id.clone(),
            name: server.name.clone(),
            ip: server.ip.clone(),
            port: server.port,
            username: server.login_name.clone(),
            password: String::new(),
            private_key_path: server.private_key_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub mfa_required: bool,
}

impl ErrorBody {
    pub(crate) fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
