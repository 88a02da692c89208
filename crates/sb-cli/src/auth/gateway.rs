//! Token lifecycle: login, step-up verification, password change

use std::sync::Arc;

use async_trait::async_trait;

use sb_core::{AuthError, BridgeError, SessionContext};

use super::prompt::Prompter;
use super::retry::{Reauthenticate, RetryPolicy};
use crate::api::{ApiError, BridgeApi, ChangePasswordRequest, LoginRequest, UserProfile};

/// Owns every write of the bearer token
#[derive(Clone)]
pub struct AuthGateway {
    api: Arc<dyn BridgeApi>,
    context: SessionContext,
    prompter: Arc<dyn Prompter>,
}

impl AuthGateway {
    pub fn new(
        api: Arc<dyn BridgeApi>,
        context: SessionContext,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            api,
            context,
            prompter,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    /// Retry policy that re-authenticates through this gateway
    pub fn retry(&self) -> RetryPolicy<'_> {
        RetryPolicy::new(self)
    }

    /// Log in and persist the token and username.
    ///
    /// Makes one login call, or two when the server answers with an MFA
    /// challenge (the second carrying the code read from the prompter).
    pub async fn login(&self, username: &str, password: &str) -> Result<String, BridgeError> {
        let token = self.authenticate(username, password).await?;
        self.context.set_login(&token, username)?;
        tracing::info!(username, "Logged in");
        Ok(token)
    }

    /// Prompt for username and password, then [`login`](Self::login)
    pub async fn login_interactive(&self) -> Result<String, BridgeError> {
        let username = self.prompter.input("Username:")?;
        let password = self.prompter.password("Password:")?;
        self.login(username.trim(), &password).await
    }

    /// Re-verify the stored user's password before a sensitive action.
    ///
    /// On success the token is refreshed and the username left untouched.
    /// Without a stored username there is nobody to verify, so this fails.
    pub async fn verify_step_up(&self) -> Result<(), BridgeError> {
        let username = self.context.username().ok_or(AuthError::NotLoggedIn)?;
        let password = self.prompter.password(&format!(
            "PRODUCTION ACCESS: Enter password for {}:",
            username
        ))?;

        match self.authenticate(&username, &password).await {
            Ok(token) => {
                self.context.set_token(&token)?;
                tracing::info!(%username, "Step-up verification passed");
                Ok(())
            }
            Err(BridgeError::Auth(e)) => {
                tracing::warn!(%username, "Step-up verification failed: {}", e);
                Err(AuthError::StepUpDenied.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Change the password under the current token
    pub async fn change_password(&self, old: &str, new: &str) -> Result<(), BridgeError> {
        let request = ChangePasswordRequest {
            old_password: old.to_string(),
            new_password: new.to_string(),
        };
        self.retry()
            .run(|| self.api.change_password(&request))
            .await
    }

    /// Forget the stored token
    pub fn logout(&self) -> Result<(), BridgeError> {
        self.context.clear_token()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Profile of the logged-in user; display only, never retried
    pub async fn current_user(&self) -> Result<UserProfile, BridgeError> {
        Ok(self.api.current_user().await?)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<String, BridgeError> {
        let request = LoginRequest::new(username, password);

        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(err) if err.is_mfa_challenge() => {
                tracing::info!("MFA required");
                let code = self.prompter.input("Enter MFA Code:")?;
                self.api
                    .login(&request.with_mfa(code.trim()))
                    .await
                    .map_err(|err| match err {
                        ApiError::Unauthorized { .. } => {
                            BridgeError::from(AuthError::MfaRequired)
                        }
                        other => other.into(),
                    })?
            }
            Err(err) => return Err(err.into()),
        };

        response
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::MissingToken.into())
    }
}

#[async_trait]
impl Reauthenticate for AuthGateway {
    async fn reauthenticate(&self) -> Result<(), BridgeError> {
        self.login_interactive().await.map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::{CreateSessionRequest, CreateSessionResponse, LoginResponse};
    use crate::auth::ScriptedPrompter;
    use sb_core::{
        Credential, GroupDescriptor, MemoryCredentialStore, NetworkError, ServerDescriptor,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Bridge API double answering login and change-password from scripts
    #[derive(Default)]
    pub(crate) struct ScriptedApi {
        logins: Mutex<VecDeque<Result<LoginResponse, ApiError>>>,
        login_requests: Mutex<Vec<LoginRequest>>,
        password_changes: Mutex<VecDeque<Result<(), ApiError>>>,
        password_calls: Mutex<usize>,
        sessions: Mutex<VecDeque<Result<CreateSessionResponse, ApiError>>>,
        session_requests: Mutex<Vec<CreateSessionRequest>>,
    }

    impl ScriptedApi {
        pub(crate) fn with_logins(logins: Vec<Result<LoginResponse, ApiError>>) -> Self {
            Self {
                logins: Mutex::new(logins.into()),
                ..Self::default()
            }
        }

        pub(crate) fn login_requests(&self) -> Vec<LoginRequest> {
            self.login_requests.lock().unwrap().clone()
        }

        pub(crate) fn push_session(&self, result: Result<CreateSessionResponse, ApiError>) {
            self.sessions.lock().unwrap().push_back(result);
        }

        pub(crate) fn session_requests(&self) -> Vec<CreateSessionRequest> {
            self.session_requests.lock().unwrap().clone()
        }
    }

    pub(crate) fn token(value: &str) -> Result<LoginResponse, ApiError> {
        Ok(LoginResponse {
            token: Some(value.to_string()),
        })
    }

    pub(crate) fn unauthorized(mfa_required: bool) -> ApiError {
        ApiError::Unauthorized {
            mfa_required,
            message: "Unauthorized".to_string(),
        }
    }

    #[async_trait]
    impl BridgeApi for ScriptedApi {
        async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
            self.login_requests.lock().unwrap().push(request.clone());
            self.logins
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(unauthorized(false)))
        }

        async fn change_password(&self, _: &ChangePasswordRequest) -> Result<(), ApiError> {
            *self.password_calls.lock().unwrap() += 1;
            self.password_changes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn current_user(&self) -> Result<UserProfile, ApiError> {
            Err(NetworkError::Connect("offline".to_string()).into())
        }

        async fn list_servers(&self) -> Result<Vec<ServerDescriptor>, ApiError> {
            Ok(Vec::new())
        }

        async fn list_groups(&self) -> Result<Vec<GroupDescriptor>, ApiError> {
            Ok(Vec::new())
        }

        async fn create_session(
            &self,
            request: &CreateSessionRequest,
        ) -> Result<CreateSessionResponse, ApiError> {
            self.session_requests.lock().unwrap().push(request.clone());
            self.sessions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(unauthorized(false)))
        }
    }

    fn gateway(
        api: Arc<ScriptedApi>,
        store: MemoryCredentialStore,
        answers: &[&str],
    ) -> (AuthGateway, Arc<ScriptedPrompter>) {
        let prompter = Arc::new(ScriptedPrompter::new(answers.iter().copied()));
        let gateway = AuthGateway::new(
            api,
            SessionContext::new(Arc::new(store)),
            prompter.clone(),
        );
        (gateway, prompter)
    }

    #[tokio::test]
    async fn test_login_without_mfa_makes_one_call() {
        let api = Arc::new(ScriptedApi::with_logins(vec![token("abc")]));
        let (gateway, prompter) = gateway(api.clone(), MemoryCredentialStore::new(), &[]);

        let token = gateway.login("alice", "x").await.unwrap();

        assert_eq!(token, "abc");
        assert_eq!(api.login_requests().len(), 1);
        assert!(prompter.asked().is_empty());
        assert_eq!(gateway.context().token().as_deref(), Some("abc"));
        assert_eq!(gateway.context().username().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_login_with_mfa_makes_two_calls() {
        let api = Arc::new(ScriptedApi::with_logins(vec![
            Err(unauthorized(true)),
            token("abc"),
        ]));
        let (gateway, _) = gateway(api.clone(), MemoryCredentialStore::new(), &["123456"]);

        let token = gateway.login("alice", "x").await.unwrap();

        let requests = api.login_requests();
        assert_eq!(token, "abc");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].mfa_token, None);
        assert_eq!(requests[1].mfa_token.as_deref(), Some("123456"));
        assert_eq!(requests[1].username, "alice");
        assert_eq!(gateway.context().token().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_rejected_mfa_code() {
        let api = Arc::new(ScriptedApi::with_logins(vec![
            Err(unauthorized(true)),
            Err(unauthorized(false)),
        ]));
        let (gateway, _) = gateway(api.clone(), MemoryCredentialStore::new(), &["000000"]);

        let err = gateway.login("alice", "x").await.unwrap_err();

        assert!(matches!(err, BridgeError::Auth(AuthError::MfaRequired)));
        assert_eq!(api.login_requests().len(), 2);
        assert!(!gateway.context().is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_token_is_an_error() {
        let api = Arc::new(ScriptedApi::with_logins(vec![Ok(LoginResponse::default())]));
        let (gateway, _) = gateway(api, MemoryCredentialStore::new(), &[]);

        let err = gateway.login("alice", "x").await.unwrap_err();
        assert!(matches!(err, BridgeError::Auth(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn test_step_up_refreshes_token_only() {
        let api = Arc::new(ScriptedApi::with_logins(vec![token("fresh")]));
        let store = MemoryCredentialStore::with_credential(Credential {
            token: Some("old".to_string()),
            username: Some("alice".to_string()),
        });
        let (gateway, prompter) = gateway(api.clone(), store, &["x"]);

        gateway.verify_step_up().await.unwrap();

        assert_eq!(gateway.context().token().as_deref(), Some("fresh"));
        assert_eq!(gateway.context().username().as_deref(), Some("alice"));
        assert_eq!(api.login_requests()[0].username, "alice");
        assert!(prompter.asked()[0].contains("PRODUCTION ACCESS"));
    }

    #[tokio::test]
    async fn test_step_up_fails_closed_without_username() {
        let api = Arc::new(ScriptedApi::default());
        let (gateway, prompter) = gateway(api.clone(), MemoryCredentialStore::new(), &["x"]);

        let err = gateway.verify_step_up().await.unwrap_err();

        assert!(matches!(err, BridgeError::Auth(AuthError::NotLoggedIn)));
        assert!(api.login_requests().is_empty());
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_step_up_wrong_password_is_denied() {
        let api = Arc::new(ScriptedApi::with_logins(vec![Err(unauthorized(false))]));
        let store = MemoryCredentialStore::with_credential(Credential {
            token: Some("old".to_string()),
            username: Some("alice".to_string()),
        });
        let (gateway, _) = gateway(api, store, &["wrong"]);

        let err = gateway.verify_step_up().await.unwrap_err();

        assert!(matches!(err, BridgeError::Auth(AuthError::StepUpDenied)));
        assert_eq!(gateway.context().token().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_change_password_relogs_once() {
        let api = Arc::new(ScriptedApi::with_logins(vec![token("new-token")]));
        api.password_changes
            .lock()
            .unwrap()
            .extend([Err(unauthorized(false)), Ok(())]);
        let (gateway, _) = gateway(api.clone(), MemoryCredentialStore::new(), &["alice", "x"]);

        gateway.change_password("old", "new").await.unwrap();

        assert_eq!(*api.password_calls.lock().unwrap(), 2);
        assert_eq!(api.login_requests().len(), 1);
        assert_eq!(gateway.context().token().as_deref(), Some("new-token"));
    }

    #[tokio::test]
    async fn test_logout_keeps_username() {
        let store = MemoryCredentialStore::with_credential(Credential {
            token: Some("abc".to_string()),
            username: Some("alice".to_string()),
        });
        let (gateway, _) = gateway(Arc::new(ScriptedApi::default()), store, &[]);

        gateway.logout().unwrap();

        assert!(!gateway.context().is_authenticated());
        assert_eq!(gateway.context().username().as_deref(), Some("alice"));
    }
}
