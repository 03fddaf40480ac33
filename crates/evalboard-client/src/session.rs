//! Auth session store.
//!
//! Two states: unauthenticated (no user or no access token) and
//! authenticated (user plus token pair). Tokens are mirrored into a
//! [`TokenStore`] and are only read back from it at construction.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use evalboard_types::{
    AuthResponse, LoginRequest, PasswordChange, ProfileUpdate, RegisterRequest, TokenPair, User,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::auth::AuthService;
use crate::client::TokenProvider;
use crate::error::ClientError;
use crate::storage::TokenStore;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }
}

pub struct AuthSession {
    service: AuthService,
    storage: Arc<dyn TokenStore>,
    state: RwLock<SessionState>,
    // Serialises refreshes so concurrent 401s share one rotation.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl AuthSession {
    pub fn new(service: AuthService, storage: Arc<dyn TokenStore>) -> Self {
        let mut state = SessionState::default();
        match storage.load() {
            Ok(Some(tokens)) => {
                state.access_token = Some(tokens.access_token);
                state.refresh_token = Some(tokens.refresh_token);
            }
            Ok(None) => {}
            Err(e) => warn!("failed to load stored tokens: {e}"),
        }
        Self {
            service,
            storage,
            state: RwLock::new(state),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().refresh_token.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    fn begin(&self) {
        let mut state = self.state.write();
        state.is_loading = true;
        state.error = None;
    }

    fn finish(&self) {
        self.state.write().is_loading = false;
    }

    fn store_tokens(&self, tokens: &TokenPair) {
        {
            let mut state = self.state.write();
            state.access_token = Some(tokens.access_token.clone());
            state.refresh_token = Some(tokens.refresh_token.clone());
        }
        if let Err(e) = self.storage.save(tokens) {
            warn!("failed to persist tokens: {e}");
        }
    }

    fn clear_local(&self) {
        {
            let mut state = self.state.write();
            state.user = None;
            state.access_token = None;
            state.refresh_token = None;
        }
        if let Err(e) = self.storage.clear() {
            warn!("failed to clear stored tokens: {e}");
        }
    }

    fn record_error(&self, err: &ClientError, fallback: &str) {
        let message = match err.to_string() {
            m if m.is_empty() => fallback.to_string(),
            m => m,
        };
        self.state.write().error = Some(message);
    }

    fn establish(&self, response: &AuthResponse) {
        self.store_tokens(&response.tokens());
        self.state.write().user = Some(response.user.clone());
    }

    pub async fn login(&self, form: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.begin();
        let result = self.service.login(form).await;
        match &result {
            Ok(response) => {
                self.establish(response);
                info!("logged in as {}", response.user.email);
            }
            Err(e) => self.record_error(e, "Login failed"),
        }
        self.finish();
        result
    }

    pub async fn register(&self, form: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.begin();
        let result = self.service.register(form).await;
        match &result {
            Ok(response) => {
                self.establish(response);
                info!("registered {}", response.user.email);
            }
            Err(e) => self.record_error(e, "Registration failed"),
        }
        self.finish();
        result
    }

    /// Clears the session locally. The server is told first, but its answer
    /// does not matter; this never fails.
    pub async fn logout(&self) {
        let accessToken = self.state.read().access_token.clone();
        if let Some(token) = accessToken {
            if let Err(e) = self.service.logout(&token).await {
                warn!("logout request failed: {e}");
            }
        }
        self.clear_local();
        debug!("session cleared");
    }

    /// Rotates both tokens. Any failure, including a missing refresh token,
    /// ends the session before the error is returned.
    pub async fn refresh_tokens(&self) -> Result<TokenPair, ClientError> {
        let _guard = self.refresh_lock.lock().await;
        self.rotate().await
    }

    // Callers must hold `refresh_lock`.
    async fn rotate(&self) -> Result<TokenPair, ClientError> {
        let refreshToken = self.state.read().refresh_token.clone();
        let result = match refreshToken {
            Some(token) => self.service.refresh(&token).await.map(|r| r.tokens()),
            None => Err(ClientError::NoRefreshToken),
        };
        match result {
            Ok(tokens) => {
                self.store_tokens(&tokens);
                debug!("tokens rotated");
                Ok(tokens)
            }
            Err(e) => {
                warn!("refresh failed, logging out: {e}");
                self.logout().await;
                Err(e)
            }
        }
    }

    /// Restores the user behind a stored access token. A 401 with a refresh
    /// token gets one refresh and one more attempt; anything else that
    /// fails ends the session.
    pub async fn check_status(&self) {
        let Some(accessToken) = self.state.read().access_token.clone() else {
            return;
        };

        self.state.write().is_loading = true;
        match self.service.current_user(&accessToken).await {
            Ok(user) => self.state.write().user = Some(user),
            Err(e) if e.is_unauthorized() && self.refresh_token().is_some() => {
                if let Err(e) = self.restore_after_refresh(&accessToken).await {
                    warn!("session restore failed: {e}");
                    self.logout().await;
                }
            }
            Err(e) => {
                warn!("session restore failed: {e}");
                self.logout().await;
            }
        }
        self.finish();
    }

    async fn restore_after_refresh(&self, stale: &str) -> Result<(), ClientError> {
        let fresh = self.refresh_access_token(Some(stale)).await?;
        let user = self.service.current_user(&fresh).await?;
        self.state.write().user = Some(user);
        Ok(())
    }

    /// Runs an authenticated auth-endpoint call, refreshing once on 401.
    async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, ClientError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let token = self
            .state
            .read()
            .access_token
            .clone()
            .ok_or(ClientError::NotAuthenticated)?;
        match call(token.clone()).await {
            Err(e) if e.is_unauthorized() => {
                let fresh = self.refresh_access_token(Some(&token)).await?;
                call(fresh).await
            }
            other => other,
        }
    }

    pub async fn update_profile(&self, profile: &ProfileUpdate) -> Result<User, ClientError> {
        self.begin();
        let result = self
            .authorized(|token| async move { self.service.update_profile(&token, profile).await })
            .await;
        match &result {
            Ok(user) => self.state.write().user = Some(user.clone()),
            Err(e) => self.record_error(e, "Profile update failed"),
        }
        self.finish();
        result
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ClientError> {
        self.begin();
        let result = self
            .authorized(|token| async move { self.service.change_password(&token, change).await })
            .await;
        if let Err(e) = &result {
            self.record_error(e, "Password change failed");
        }
        self.finish();
        result
    }

    pub async fn resend_verification(&self) -> Result<(), ClientError> {
        self.authorized(|token| async move { self.service.resend_verification(&token).await })
            .await
    }

    pub fn service(&self) -> &AuthService {
        &self.service
    }
}

#[async_trait]
impl TokenProvider for AuthSession {
    fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String, ClientError> {
        let _guard = self.refresh_lock.lock().await;
        match (self.access_token(), stale) {
            (Some(current), Some(stale)) if current != stale => {
                debug!("token already rotated by a concurrent refresh");
                Ok(current)
            }
            // A concurrent failure already ended the session the request belonged to.
            (None, Some(_)) => Err(ClientError::SessionExpired),
            _ => self.rotate().await.map(|t| t.access_token),
        }
    }

    async fn invalidate(&self) {
        self.logout().await;
    }
}
