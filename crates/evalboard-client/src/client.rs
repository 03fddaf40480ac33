//! HTTP client wrapper: bearer injection, refresh-on-401 and
//! transport-level error notifications.

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::notifications::{NotificationStore, NotifyOptions};
use crate::router::Navigator;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Refreshes allowed per call before a 401 is returned to the caller.
pub const MAX_AUTH_RETRIES: u32 = 1;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again later.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please wait and try again.";
pub const TIMEOUT_MESSAGE: &str = "Request timeout. Please check your connection and try again.";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// Source of the bearer credential for outgoing requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;

    /// Obtains a fresh access token. `stale` is the token the rejected
    /// request carried, so a provider can tell whether someone else already
    /// rotated it.
    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String, ClientError>;

    /// Drops the session after an unrecoverable refresh failure.
    async fn invalidate(&self);
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<dyn TokenProvider>>,
    notifications: NotificationStore,
    navigator: Option<Navigator>,
}

impl ApiClient {
    /// A client without credentials. Requests carry only explicit bearers.
    pub fn new(transport: Arc<dyn Transport>, notifications: NotificationStore) -> Self {
        Self {
            transport,
            tokens: None,
            notifications,
            navigator: None,
        }
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    /// Sends a request, refreshing the session and retrying once on 401.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let mut attempt = 0;
        loop {
            let mut outgoing = request.clone();
            if outgoing.bearer.is_none() {
                outgoing.bearer = self.tokens.as_ref().and_then(|t| t.access_token());
            }

            let response = match self.transport.send(&outgoing).await {
                Ok(r) => r,
                Err(e) => {
                    let err = ClientError::from(e);
                    self.report(&err);
                    return Err(err);
                }
            };

            if response.status.is_success() {
                return Ok(response);
            }

            if response.status == StatusCode::UNAUTHORIZED && attempt < MAX_AUTH_RETRIES {
                if let Some(tokens) = &self.tokens {
                    attempt += 1;
                    debug!("{} {} returned 401, refreshing session", outgoing.method, outgoing.path);
                    match tokens.refresh_access_token(outgoing.bearer.as_deref()).await {
                        Ok(_) => continue,
                        // Whoever ended the session has already notified and redirected.
                        Err(ClientError::SessionExpired) => return Err(ClientError::SessionExpired),
                        Err(e) => {
                            warn!("token refresh failed: {e}");
                            self.expire_session(tokens.as_ref()).await;
                            return Err(ClientError::SessionExpired);
                        }
                    }
                }
            }

            let err = ClientError::from_status(response.status, &response.body);
            self.report(&err);
            return Err(err);
        }
    }

    async fn expire_session(&self, tokens: &dyn TokenProvider) {
        tokens.invalidate().await;
        self.notifications
            .error(SESSION_EXPIRED_MESSAGE, NotifyOptions::default());
        if let Some(navigator) = &self.navigator {
            navigator.redirect_to_login();
        }
    }

    /// Turns transport-level failures into notifications. Business errors
    /// are left for the calling store to record.
    fn report(&self, err: &ClientError) {
        let message = match err {
            ClientError::Http { status, .. } if status.is_server_error() => SERVER_ERROR_MESSAGE,
            ClientError::Http { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS => {
                RATE_LIMITED_MESSAGE
            }
            ClientError::Timeout => TIMEOUT_MESSAGE,
            ClientError::Network(_) => NETWORK_ERROR_MESSAGE,
            _ => return,
        };
        self.notifications.error(message, NotifyOptions::default());
    }

    /// Sends a request whose response body is irrelevant.
    pub async fn call(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.execute(request).await.map(|_| ())
    }

    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.execute(request).await?;
        Ok(response.decode()?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ClientError> {
        self.request(ApiRequest::get(path).with_query(query)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(ApiRequest::post(path)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send_json(Method::PATCH, path, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(ApiRequest::new(Method::DELETE, path)).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        self.request(ApiRequest::new(method, path).with_body(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{json, status, ScriptedTransport, StaticTokens};
    use crate::transport::TransportError;
    use evalboard_types::NotificationKind;

    fn client_with(transport: &Arc<ScriptedTransport>, tokens: &Arc<StaticTokens>) -> ApiClient {
        ApiClient::new(transport.clone(), NotificationStore::new()).with_tokens(tokens.clone())
    }

    #[tokio::test]
    async fn bearer_is_injected_when_a_token_is_present() {
        let transport = ScriptedTransport::new();
        transport.push(json(200, serde_json::json!({"ok": true})));
        let tokens = StaticTokens::new(Some("access-1"));
        let client = client_with(&transport, &tokens);

        let _: serde_json::Value = client.get("/tasks").await.unwrap();
        assert_eq!(transport.requests()[0].bearer.as_deref(), Some("access-1"));
    }

    #[tokio::test]
    async fn no_token_means_no_header() {
        let transport = ScriptedTransport::new();
        transport.push(json(200, serde_json::json!(null)));
        let client = ApiClient::new(transport.clone(), NotificationStore::new());

        let _: () = client.post_empty("/auth/logout").await.unwrap();
        assert_eq!(transport.requests()[0].bearer, None);
    }

    #[tokio::test]
    async fn unauthorized_refreshes_once_and_retries_with_new_token() {
        let transport = ScriptedTransport::new();
        transport.push(status(401));
        transport.push(json(200, serde_json::json!({"id": 7})));
        let tokens = StaticTokens::new(Some("old"));
        tokens.refresh_to("new");
        let client = client_with(&transport, &tokens);

        let body: serde_json::Value = client.get("/auth/me").await.unwrap();
        assert_eq!(body["id"], 7);
        assert_eq!(tokens.refresh_calls(), 1);
        let bearers: Vec<Option<String>> =
            transport.requests().into_iter().map(|r| r.bearer).collect();
        assert_eq!(bearers, vec![Some("old".into()), Some("new".into())]);
    }

    #[tokio::test]
    async fn second_unauthorized_is_returned_without_another_refresh() {
        let transport = ScriptedTransport::new();
        transport.push(status(401));
        transport.push(status(401));
        let tokens = StaticTokens::new(Some("old"));
        tokens.refresh_to("new");
        let client = client_with(&transport, &tokens);

        let err = client.get::<serde_json::Value>("/auth/me").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(tokens.refresh_calls(), 1);
        assert_eq!(transport.requests().len(), 2);
        assert!(client.notifications().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_expires_session_and_redirects() {
        let transport = ScriptedTransport::new();
        transport.push(status(401));
        let tokens = StaticTokens::new(Some("old"));
        let navigator = Navigator::default();
        navigator.navigate("/datasets", true);
        let client = client_with(&transport, &tokens).with_navigator(navigator.clone());

        let err = client.get::<serde_json::Value>("/datasets").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(tokens.invalidations(), 1);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(navigator.current().path, crate::router::LOGIN_PATH);

        let notes = client.notifications().list();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Error);
        assert_eq!(notes[0].message, SESSION_EXPIRED_MESSAGE);
    }

    #[tokio::test]
    async fn session_ended_elsewhere_is_not_announced_again() {
        let transport = ScriptedTransport::new();
        transport.push(status(401));
        let tokens = StaticTokens::new(Some("old"));
        tokens.end_elsewhere();
        let navigator = Navigator::default();
        navigator.navigate("/datasets", true);
        let client = client_with(&transport, &tokens).with_navigator(navigator.clone());

        let err = client.get::<serde_json::Value>("/datasets").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(tokens.invalidations(), 0);
        assert!(client.notifications().is_empty());
        assert_eq!(navigator.current().path, "/datasets");
    }

    #[tokio::test]
    async fn put_patch_and_delete_send_method_and_body() {
        let transport = ScriptedTransport::new();
        transport.push(json(200, serde_json::json!({"id": "u-1"})));
        transport.push(json(200, serde_json::json!({"id": "d-1"})));
        transport.push(status(204));
        let tokens = StaticTokens::new(Some("access-1"));
        let client = client_with(&transport, &tokens);

        let user: serde_json::Value = client
            .put("/auth/profile", &serde_json::json!({"full_name": "Ada"}))
            .await
            .unwrap();
        assert_eq!(user["id"], "u-1");
        let _: serde_json::Value = client
            .patch("/datasets/d-1", &serde_json::json!({"name": "stance"}))
            .await
            .unwrap();
        let deleted: serde_json::Value = client.delete("/datasets/d-1").await.unwrap();
        assert_eq!(deleted, serde_json::Value::Null);

        let sent = transport.requests();
        let methods: Vec<Method> = sent.iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec![Method::PUT, Method::PATCH, Method::DELETE]);
        assert_eq!(sent[0].body, Some(serde_json::json!({"full_name": "Ada"})));
        assert_eq!(sent[1].body, Some(serde_json::json!({"name": "stance"})));
        assert_eq!(sent[2].body, None);
        assert!(sent.iter().all(|r| r.bearer.as_deref() == Some("access-1")));
    }

    #[tokio::test]
    async fn unauthenticated_client_does_not_refresh() {
        let transport = ScriptedTransport::new();
        transport.push(json(401, serde_json::json!({"detail": "Incorrect email or password"})));
        let client = ApiClient::new(transport.clone(), NotificationStore::new());

        let err = client
            .post::<_, serde_json::Value>("/auth/login", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Incorrect email or password");
        assert!(client.notifications().is_empty());
    }

    #[tokio::test]
    async fn transport_failures_become_notifications() {
        let transport = ScriptedTransport::new();
        transport.push(status(503));
        transport.push(status(429));
        transport.push_error(TransportError::Timeout);
        transport.push_error(TransportError::Connect("refused".into()));
        transport.push(status(404));
        let client = ApiClient::new(transport.clone(), NotificationStore::new());

        for _ in 0..5 {
            let _ = client.get::<serde_json::Value>("/anything").await;
        }

        let messages: Vec<String> = client
            .notifications()
            .list()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                SERVER_ERROR_MESSAGE,
                RATE_LIMITED_MESSAGE,
                TIMEOUT_MESSAGE,
                NETWORK_ERROR_MESSAGE,
            ]
        );
    }
}
