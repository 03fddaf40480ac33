//! Typed calls against the `/auth` endpoints.

use evalboard_types::{
    AuthResponse, EmailVerification, LoginRequest, PasswordChange, PasswordReset,
    PasswordResetRequest, ProfileUpdate, RefreshRequest, RefreshResponse, RegisterRequest, User,
};
use http::Method;
use serde::Serialize;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::transport::ApiRequest;

/// Auth endpoints. Calls that need a session take the bearer explicitly so
/// this service never depends on the session store it serves.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn login(&self, form: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.api.post("/auth/login", form).await
    }

    pub async fn register(&self, form: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.api.post("/auth/register", form).await
    }

    pub async fn refresh(&self, refreshToken: &str) -> Result<RefreshResponse, ClientError> {
        let body = RefreshRequest {
            refresh_token: refreshToken.to_string(),
        };
        self.api.post("/auth/refresh", &body).await
    }

    pub async fn logout(&self, accessToken: &str) -> Result<(), ClientError> {
        self.api
            .call(ApiRequest::post("/auth/logout").with_bearer(accessToken))
            .await
    }

    pub async fn current_user(&self, accessToken: &str) -> Result<User, ClientError> {
        self.api
            .request(ApiRequest::get("/auth/me").with_bearer(accessToken))
            .await
    }

    pub async fn update_profile(
        &self,
        accessToken: &str,
        profile: &ProfileUpdate,
    ) -> Result<User, ClientError> {
        let request = ApiRequest::new(Method::PUT, "/auth/profile")
            .with_body(serde_json::to_value(profile)?)
            .with_bearer(accessToken);
        self.api.request(request).await
    }

    pub async fn change_password(
        &self,
        accessToken: &str,
        change: &PasswordChange,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/change-password")
            .with_body(serde_json::to_value(change)?)
            .with_bearer(accessToken);
        self.api.call(request).await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ClientError> {
        let body = PasswordResetRequest {
            email: email.to_string(),
        };
        self.post_unit("/auth/forgot-password", &body).await
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<(), ClientError> {
        self.post_unit("/auth/reset-password", reset).await
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), ClientError> {
        let body = EmailVerification {
            token: token.to_string(),
        };
        self.post_unit("/auth/verify-email", &body).await
    }

    pub async fn resend_verification(&self, accessToken: &str) -> Result<(), ClientError> {
        self.api
            .call(ApiRequest::post("/auth/resend-verification").with_bearer(accessToken))
            .await
    }

    async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ClientError> {
        let request = ApiRequest::post(path).with_body(serde_json::to_value(body)?);
        self.api.call(request).await
    }
}
